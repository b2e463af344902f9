/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Business message frame with a fixed session-layer header.
//!
//! The body encoding of a business message is opaque to the session layer;
//! only the header fields below are read or rewritten here:
//!
//! | offset | field         | type |
//! |--------|---------------|------|
//! | 0      | template_id   | u16  |
//! | 2      | session_id    | u64  |
//! | 10     | connection_id | u64  |
//! | 18     | seq_no        | u64  |
//! | 26     | body          | ...  |
//!
//! The connection binding is rewritten in place during replay, since a
//! persisted record may originate from a previous connection of the same
//! logical session.

use crate::error::FrameError;
use crate::types::{SeqNum, SessionId, TemplateId};
use bytes::{BufMut, Bytes, BytesMut};

/// Byte length of the fixed frame header.
pub const FRAME_HEADER_LEN: usize = 26;

const TEMPLATE_ID_OFFSET: usize = 0;
const SESSION_ID_OFFSET: usize = 2;
const CONNECTION_ID_OFFSET: usize = 10;
const SEQ_NO_OFFSET: usize = 18;

/// A framed business message: fixed header plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessFrame {
    buf: BytesMut,
}

impl BusinessFrame {
    /// Encodes a new frame from its header fields and body.
    ///
    /// # Arguments
    /// * `template_id` - The message-type identifier
    /// * `session_id` - The owning session
    /// * `connection_id` - The transport connection binding
    /// * `seq_no` - The outbound sequence number
    /// * `body` - Opaque message body bytes
    #[must_use]
    pub fn encode(
        template_id: TemplateId,
        session_id: SessionId,
        connection_id: u64,
        seq_no: SeqNum,
        body: &[u8],
    ) -> Self {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
        buf.put_u16(template_id.value());
        buf.put_u64(session_id.value());
        buf.put_u64(connection_id);
        buf.put_u64(seq_no.value());
        buf.put_slice(body);
        Self { buf }
    }

    /// Wraps raw frame bytes.
    ///
    /// # Arguments
    /// * `bytes` - Raw frame bytes including the fixed header
    ///
    /// # Errors
    /// Returns [`FrameError::Truncated`] if the buffer is shorter than the
    /// fixed header.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(FrameError::Truncated {
                length: bytes.len(),
                needed: FRAME_HEADER_LEN,
            });
        }
        Ok(Self {
            buf: BytesMut::from(bytes),
        })
    }

    /// Returns the message-type identifier.
    #[inline]
    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        TemplateId::new(read_u16(&self.buf, TEMPLATE_ID_OFFSET))
    }

    /// Returns the owning session identifier.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::new(read_u64(&self.buf, SESSION_ID_OFFSET))
    }

    /// Returns the transport connection binding.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        read_u64(&self.buf, CONNECTION_ID_OFFSET)
    }

    /// Returns the sequence number.
    #[inline]
    #[must_use]
    pub fn seq_no(&self) -> SeqNum {
        SeqNum::new(read_u64(&self.buf, SEQ_NO_OFFSET))
    }

    /// Rewrites the connection binding in place.
    ///
    /// # Arguments
    /// * `connection_id` - The live connection the frame is re-bound to
    pub fn set_connection_id(&mut self, connection_id: u64) {
        self.buf[CONNECTION_ID_OFFSET..CONNECTION_ID_OFFSET + 8]
            .copy_from_slice(&connection_id.to_be_bytes());
    }

    /// Returns the opaque message body.
    #[inline]
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.buf[FRAME_HEADER_LEN..]
    }

    /// Returns the full frame as a byte slice.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns an owned copy of the full frame.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    /// Returns the total frame length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if the frame carries no body.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == FRAME_HEADER_LEN
    }
}

#[inline]
fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> BusinessFrame {
        BusinessFrame::encode(
            TemplateId::new(77),
            SessionId::new(123),
            9,
            SeqNum::new(4),
            b"order-body",
        )
    }

    #[test]
    fn test_encode_and_read_header() {
        let frame = sample_frame();
        assert_eq!(frame.template_id(), TemplateId::new(77));
        assert_eq!(frame.session_id(), SessionId::new(123));
        assert_eq!(frame.connection_id(), 9);
        assert_eq!(frame.seq_no(), SeqNum::new(4));
        assert_eq!(frame.body(), b"order-body");
        assert_eq!(frame.len(), FRAME_HEADER_LEN + 10);
    }

    #[test]
    fn test_parse_round_trip() {
        let frame = sample_frame();
        let parsed = BusinessFrame::parse(frame.as_bytes()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_parse_truncated() {
        let err = BusinessFrame::parse(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { length: 10, .. }));
    }

    #[test]
    fn test_rewrite_connection_binding() {
        let mut frame = sample_frame();
        frame.set_connection_id(42);
        assert_eq!(frame.connection_id(), 42);
        // Everything else is untouched.
        assert_eq!(frame.seq_no(), SeqNum::new(4));
        assert_eq!(frame.body(), b"order-body");
    }
}
