/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Retransmit observation hook.
//!
//! Deployment-specific bookkeeping (audit, metrics) observes every replayed
//! business message through this trait, exactly once per persisted record in
//! the requested range, including records suppressed as gap-fills.

use ironfixp_core::frame::BusinessFrame;
use ironfixp_core::types::TemplateId;

/// Observer of business messages passing through a retransmit replay.
pub trait RetransmitHandler: Send + Sync {
    /// Called once per persisted record in the replayed range, before the
    /// record is published or suppressed.
    ///
    /// # Arguments
    /// * `template_id` - The record's message-type identifier
    /// * `frame` - The raw persisted record
    fn on_replayed_business_message(&self, template_id: TemplateId, frame: &BusinessFrame);
}

/// Handler that observes nothing. The default.
#[derive(Debug, Default)]
pub struct NoOpRetransmitHandler;

impl RetransmitHandler for NoOpRetransmitHandler {
    fn on_replayed_business_message(&self, _template_id: TemplateId, _frame: &BusinessFrame) {}
}
