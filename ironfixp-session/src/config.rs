/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! Static per-deployment configuration for accepted FIXP sessions: timeout
//! deadlines, the supported keep-alive bound, and the gap-fill template set.

use ironfixp_core::types::TemplateId;
use std::collections::HashSet;
use std::time::Duration;

/// Configuration for accepted FIXP sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lowest accepted keep-alive interval.
    pub keep_alive_min: Duration,
    /// Highest accepted keep-alive interval.
    pub keep_alive_max: Duration,
    /// How long a fresh connection may sit without a Negotiate before it is
    /// unilaterally disconnected.
    pub no_logon_timeout: Duration,
    /// How long a negotiated connection may sit without an Establish.
    pub no_establish_timeout: Duration,
    /// Template ids that are never re-sent verbatim during replay; they are
    /// substituted by an administrative Sequence message instead.
    pub gapfill_template_ids: HashSet<TemplateId>,
}

impl SessionConfig {
    /// Creates a configuration with default timeouts and an empty gap-fill
    /// set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keep_alive_min: Duration::from_millis(100),
            keep_alive_max: Duration::from_secs(60),
            no_logon_timeout: Duration::from_secs(10),
            no_establish_timeout: Duration::from_secs(10),
            gapfill_template_ids: HashSet::new(),
        }
    }

    /// Sets the accepted keep-alive interval bound.
    #[must_use]
    pub fn with_keep_alive_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.keep_alive_min = min;
        self.keep_alive_max = max;
        self
    }

    /// Sets the no-logon disconnect timeout.
    #[must_use]
    pub fn with_no_logon_timeout(mut self, timeout: Duration) -> Self {
        self.no_logon_timeout = timeout;
        self
    }

    /// Sets the no-establish disconnect timeout.
    #[must_use]
    pub fn with_no_establish_timeout(mut self, timeout: Duration) -> Self {
        self.no_establish_timeout = timeout;
        self
    }

    /// Adds a template id to the gap-fill set.
    #[must_use]
    pub fn with_gapfill_template(mut self, template_id: TemplateId) -> Self {
        self.gapfill_template_ids.insert(template_id);
        self
    }

    /// Returns true if the requested keep-alive interval is supported.
    ///
    /// # Arguments
    /// * `interval_ms` - The requested interval in milliseconds
    #[must_use]
    pub fn keep_alive_supported(&self, interval_ms: u64) -> bool {
        let min = self.keep_alive_min.as_millis() as u64;
        let max = self.keep_alive_max.as_millis() as u64;
        (min..=max).contains(&interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::new();
        assert_eq!(config.no_logon_timeout, Duration::from_secs(10));
        assert!(config.gapfill_template_ids.is_empty());
    }

    #[test]
    fn test_keep_alive_bound() {
        let config = SessionConfig::new()
            .with_keep_alive_bounds(Duration::from_secs(1), Duration::from_secs(30));

        assert!(config.keep_alive_supported(1_000));
        assert!(config.keep_alive_supported(30_000));
        assert!(!config.keep_alive_supported(999));
        assert!(!config.keep_alive_supported(u64::MAX));
    }

    #[test]
    fn test_gapfill_template_set() {
        let config = SessionConfig::new()
            .with_gapfill_template(TemplateId::new(10))
            .with_gapfill_template(TemplateId::new(11));

        assert!(config.gapfill_template_ids.contains(&TemplateId::new(10)));
        assert!(!config.gapfill_template_ids.contains(&TemplateId::new(12)));
    }
}
