//! Frame encoding and the receive state machine
//!
//! Frame format:
//! - 1 byte: start marker (0xFE)
//! - 1 byte: type id
//! - 2 bytes: instance (little-endian)
//! - 1 byte: body length N
//! - N bytes: body
//! - 2 bytes: CRC-16 (little-endian) of every preceding byte of the frame

use byteorder::{ByteOrder, LittleEndian};

use super::crc::{crc16, CRC_INITIAL};
use super::{EncodingError, MAX_BODY_LEN};

/// Start-of-frame marker
pub const START_BYTE: u8 = 0xFE;

/// Start marker, type id, instance and body length
pub const HEADER_LEN: usize = 5;

/// Trailing checksum
pub const CRC_LEN: usize = 2;

/// Largest possible frame on the wire
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_BODY_LEN + CRC_LEN;

/// Build a complete frame around `body`
pub fn encode_frame(
    type_id: u8,
    instance: u16,
    body: &[u8],
    crc_initial: u16,
) -> Result<Vec<u8>, EncodingError> {
    if body.len() > MAX_BODY_LEN {
        return Err(EncodingError::BodyTooLarge(body.len()));
    }

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len() + CRC_LEN);
    bytes.push(START_BYTE);
    bytes.push(type_id);
    let mut instance_bytes = [0u8; 2];
    LittleEndian::write_u16(&mut instance_bytes, instance);
    bytes.extend_from_slice(&instance_bytes);
    bytes.push(body.len() as u8);
    bytes.extend_from_slice(body);

    let crc = crc16(&bytes, bytes.len(), crc_initial);
    let mut crc_bytes = [0u8; 2];
    LittleEndian::write_u16(&mut crc_bytes, crc);
    bytes.extend_from_slice(&crc_bytes);

    Ok(bytes)
}

/// A CRC-verified frame, before body decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Wire type id
    pub type_id: u8,
    /// Instance the frame is addressed to or came from
    pub instance: u16,
    /// Body bytes, not yet decoded
    pub body: Vec<u8>,
}

impl RawFrame {
    /// Re-encode with the frame seed
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        encode_frame(self.type_id, self.instance, &self.body, CRC_INITIAL)
    }
}

/// Header byte expected next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    /// Type id byte
    TypeId,
    /// Instance, low byte
    InstanceLow,
    /// Instance, high byte
    InstanceHigh,
    /// Body length byte
    Length,
}

/// CRC byte expected next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcHalf {
    /// Waiting for the low CRC byte
    Low,
    /// Waiting for the high CRC byte
    High { low: u8 },
}

/// Receive state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Hunting for the start byte
    WaitForStart,
    /// Reading a header field
    ReadHeader(HeaderField),
    /// Reading body bytes
    ReadBody { remaining: u8 },
    /// Reading the trailing CRC
    ReadCrc(CrcHalf),
}

/// What the parser should do with the byte that produced a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteAction {
    /// Not part of a frame
    Discard,
    /// First byte of a new frame
    Begin,
    /// Header or body byte
    Store,
    /// Low CRC byte, carried in the state
    Hold,
    /// Frame complete with the received CRC
    Finish { received_crc: u16 },
    /// Inconsistent state; drop the partial frame
    Abort,
}

/// Advance the state machine by one byte.
///
/// Pure; the caller owns the buffer.
pub fn step(state: ParseState, byte: u8) -> (ParseState, ByteAction) {
    use ParseState::*;

    match state {
        WaitForStart if byte == START_BYTE => {
            (ReadHeader(HeaderField::TypeId), ByteAction::Begin)
        }
        WaitForStart => (WaitForStart, ByteAction::Discard),
        ReadHeader(HeaderField::TypeId) => {
            (ReadHeader(HeaderField::InstanceLow), ByteAction::Store)
        }
        ReadHeader(HeaderField::InstanceLow) => {
            (ReadHeader(HeaderField::InstanceHigh), ByteAction::Store)
        }
        ReadHeader(HeaderField::InstanceHigh) => {
            (ReadHeader(HeaderField::Length), ByteAction::Store)
        }
        ReadHeader(HeaderField::Length) if byte == 0 => (ReadCrc(CrcHalf::Low), ByteAction::Store),
        ReadHeader(HeaderField::Length) => (ReadBody { remaining: byte }, ByteAction::Store),
        ReadBody { remaining: 0 } => (WaitForStart, ByteAction::Abort),
        ReadBody { remaining: 1 } => (ReadCrc(CrcHalf::Low), ByteAction::Store),
        ReadBody { remaining } => (
            ReadBody {
                remaining: remaining - 1,
            },
            ByteAction::Store,
        ),
        ReadCrc(CrcHalf::Low) => (ReadCrc(CrcHalf::High { low: byte }), ByteAction::Hold),
        ReadCrc(CrcHalf::High { low }) => (
            /// Hunting for the start byte
            WaitForStart,
            ByteAction::Finish {
                received_crc: u16::from_le_bytes([low, byte]),
            },
        ),
    }
}

/// Outcome of a completed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// CRC matched
    Frame(RawFrame),
    /// CRC mismatch; the frame is discarded
    BadCrc {
        type_id: u8,
        instance: u16,
        expected: u16,
        received: u16,
    },
}

/// Byte-at-a-time frame extractor.
///
/// Holds at most one frame's worth of bytes and keeps its state across
/// calls, so the input may be split at any point.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buf: Vec<u8>,
    crc_initial: u16,
}

impl FrameParser {
    /// Parser using the frame CRC seed
    pub fn new() -> Self {
        Self::with_crc_initial(CRC_INITIAL)
    }

    /// Parser using a custom CRC seed
    pub fn with_crc_initial(crc_initial: u16) -> Self {
        Self {
            state: ParseState::WaitForStart,
            buf: Vec::with_capacity(HEADER_LEN + MAX_BODY_LEN),
            crc_initial,
        }
    }

    /// Current state
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// True between frames
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitForStart
    }

    /// Abandon any partial frame
    pub fn reset(&mut self) {
        self.state = ParseState::WaitForStart;
        self.buf.clear();
    }

    /// Feed one byte
    pub fn push(&mut self, byte: u8) -> Option<ParseEvent> {
        let (next, action) = step(self.state, byte);
        self.state = next;

        match action {
            ByteAction::Discard | ByteAction::Hold => None,
            ByteAction::Begin => {
                self.buf.clear();
                self.buf.push(byte);
                None
            }
            ByteAction::Store => {
                self.buf.push(byte);
                None
            }
            ByteAction::Abort => {
                self.buf.clear();
                None
            }
            ByteAction::Finish { received_crc } => {
                let event = self.finish(received_crc);
                self.buf.clear();
                event
            }
        }
    }

    /// Feed a chunk, returning every frame it completes in order
    pub fn feed(&mut self, data: &[u8]) -> Vec<ParseEvent> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }

    fn finish(&self, received: u16) -> Option<ParseEvent> {
        if self.buf.len() < HEADER_LEN {
            return None;
        }
        let type_id = self.buf[1];
        let instance = LittleEndian::read_u16(&self.buf[2..4]);
        let expected = crc16(&self.buf, self.buf.len(), self.crc_initial);

        if expected != received {
            return Some(ParseEvent::BadCrc {
                type_id,
                instance,
                expected,
                received,
            });
        }

        Some(ParseEvent::Frame(RawFrame {
            type_id,
            instance,
            body: self.buf[HEADER_LEN..].to_vec(),
        }))
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(type_id: u8, instance: u16, body: &[u8]) -> Vec<u8> {
        encode_frame(type_id, instance, body, CRC_INITIAL).expect("encode")
    }

    #[test]
    fn test_encode_layout() {
        let bytes = frame(15, 1, &[0]);
        assert_eq!(&bytes[..6], &[0xFE, 0x0F, 0x01, 0x00, 0x01, 0x00]);
        let crc = crc16(&bytes[..6], 6, CRC_INITIAL);
        assert_eq!(&bytes[6..], &crc.to_le_bytes());
    }

    #[test]
    fn test_body_too_large() {
        let body = vec![0u8; 256];
        assert_eq!(
            encode_frame(1, 1, &body, CRC_INITIAL).unwrap_err(),
            EncodingError::BodyTooLarge(256)
        );
        assert!(encode_frame(1, 1, &body[..255], CRC_INITIAL).is_ok());
    }

    #[test]
    fn test_step_header_sequence() {
        let mut state = ParseState::WaitForStart;
        let mut actions = Vec::new();
        for byte in [0x00, START_BYTE, 5, 2, 0, 1, 0xAA] {
            let (next, action) = step(state, byte);
            state = next;
            actions.push(action);
        }
        assert_eq!(
            actions,
            vec![
                ByteAction::Discard,
                ByteAction::Begin,
                ByteAction::Store,
                ByteAction::Store,
                ByteAction::Store,
                ByteAction::Store,
                ByteAction::Store,
            ]
        );
        assert_eq!(state, ParseState::ReadCrc(CrcHalf::Low));
    }

    #[test]
    fn test_step_zero_length_skips_body() {
        let (next, _) = step(ParseState::ReadHeader(HeaderField::Length), 0);
        assert_eq!(next, ParseState::ReadCrc(CrcHalf::Low));
    }

    #[test]
    fn test_step_corrupt_state_resets() {
        let (next, action) = step(ParseState::ReadBody { remaining: 0 }, 0x42);
        assert_eq!(next, ParseState::WaitForStart);
        assert_eq!(action, ByteAction::Abort);
    }

    #[test]
    fn test_step_crc_bytes_little_endian() {
        let (next, action) = step(ParseState::ReadCrc(CrcHalf::Low), 0x34);
        assert_eq!(action, ByteAction::Hold);
        let (next, action) = step(next, 0x12);
        assert_eq!(next, ParseState::WaitForStart);
        assert_eq!(
            action,
            ByteAction::Finish {
                received_crc: 0x1234
            }
        );
    }

    #[test]
    fn test_parse_single_frame() {
        let mut parser = FrameParser::new();
        let events = parser.feed(&frame(18, 3, &[1, 2, 3, 4]));
        assert_eq!(
            events,
            vec![ParseEvent::Frame(RawFrame {
                type_id: 18,
                instance: 3,
                body: vec![1, 2, 3, 4],
            })]
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_parse_zero_length_body() {
        let mut parser = FrameParser::new();
        let events = parser.feed(&frame(7, 0x0102, &[]));
        assert_eq!(
            events,
            vec![ParseEvent::Frame(RawFrame {
                type_id: 7,
                instance: 0x0102,
                body: vec![],
            })]
        );
    }

    #[test]
    fn test_start_byte_inside_body_is_data() {
        let mut parser = FrameParser::new();
        let body = [START_BYTE, START_BYTE, 0x00];
        let events = parser.feed(&frame(2, 1, &body));
        assert!(matches!(&events[..], [ParseEvent::Frame(f)] if f.body == body));
    }

    #[test]
    fn test_bad_crc_reported_and_parser_recovers() {
        let mut parser = FrameParser::new();
        let mut bad = frame(5, 1, &[9, 9]);
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        let good = frame(5, 1, &[8, 8]);

        let mut stream = bad.clone();
        stream.extend_from_slice(&good);
        let events = parser.feed(&stream);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ParseEvent::BadCrc { type_id: 5, instance: 1, .. }));
        assert!(matches!(&events[1], ParseEvent::Frame(f) if f.body == vec![8, 8]));
    }

    #[test]
    fn test_reset_abandons_partial_frame() {
        let mut parser = FrameParser::new();
        let bytes = frame(2, 1, &[1, 2, 3, 4, 5, 6]);
        assert!(parser.feed(&bytes[..7]).is_empty());
        assert!(!parser.is_idle());
        parser.reset();
        assert!(parser.is_idle());
        assert_eq!(parser.feed(&bytes).len(), 1);
    }

    #[test]
    fn test_custom_seed_must_match() {
        let bytes = encode_frame(1, 1, &[1], 0x1D0F).unwrap();
        let mut default_parser = FrameParser::new();
        assert!(matches!(
            &default_parser.feed(&bytes)[..],
            [ParseEvent::BadCrc { .. }]
        ));
        let mut seeded = FrameParser::with_crc_initial(0x1D0F);
        assert!(matches!(&seeded.feed(&bytes)[..], [ParseEvent::Frame(_)]));
    }

    #[test]
    fn test_raw_frame_to_bytes() {
        let raw = RawFrame {
            type_id: 14,
            instance: 1,
            body: vec![1, 0, 0],
        };
        let mut parser = FrameParser::new();
        assert_eq!(
            parser.feed(&raw.to_bytes().unwrap()),
            vec![ParseEvent::Frame(raw)]
        );
    }
}
