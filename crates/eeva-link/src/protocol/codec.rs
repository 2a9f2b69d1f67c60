//! Body codecs and the type id registry
//!
//! Every Glob type has a fixed, little-endian, unpadded body layout. Types
//! implement [`GlobBody`] against a [`BodyWriter`]/[`BodyReader`] pair, and
//! the [`CodecRegistry`] maps each type id to the encoder and decoder for
//! that layout.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::messages::{
    AssertMessage, CaptureCommand, CaptureData, DebugMessage, DrivingCommand, Glob, Modes,
    PidParams, Request, RobotCommand, StatusData, TaskTimingResult, Wave,
};
use super::{DecodingError, EncodingError, MAX_BODY_LEN};

/// Which way a Glob type travels over the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Sent by the host and by the robot
    Both,
    /// Only ever sent by the host
    SendOnly,
}

/// A typed message body with a fixed binary layout
pub trait GlobBody: Sized {
    /// Wire type id
    const TYPE_ID: u8;
    /// Human readable type name
    const NAME: &'static str;
    /// Exact body size in bytes
    const BODY_LEN: usize;
    /// Direction the type is allowed to travel
    const DIRECTION: Direction = Direction::Both;

    /// Pack the fields in layout order
    fn write_body(&self, w: &mut BodyWriter) -> Result<(), EncodingError>;

    /// Unpack the fields in layout order
    fn read_body(r: &mut BodyReader<'_>) -> Result<Self, DecodingError>;

    /// Encode to a body of exactly `BODY_LEN` bytes
    fn encode_body(&self) -> Result<Vec<u8>, EncodingError> {
        let mut w = BodyWriter::with_capacity(Self::BODY_LEN);
        self.write_body(&mut w)?;
        let body = w.finish();
        debug_assert_eq!(body.len(), Self::BODY_LEN, "{} layout size", Self::NAME);
        Ok(body)
    }

    /// Decode a body, which must be exactly `BODY_LEN` bytes
    fn decode_body(body: &[u8]) -> Result<Self, DecodingError> {
        let mut r = BodyReader::new(Self::TYPE_ID, body, Self::BODY_LEN)?;
        Self::read_body(&mut r)
    }
}

/// A [`GlobBody`] that is one variant of [`Glob`]
pub trait GlobVariant: GlobBody + Into<Glob> {
    /// Borrow the body if `glob` holds this type
    fn from_glob(glob: &Glob) -> Option<&Self>;
}

/// Sequential little-endian writer for a message body
#[derive(Debug, Default)]
pub struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    /// Create a writer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append a byte
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Append a 16-bit value
    pub fn u16(&mut self, value: u16) -> &mut Self {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Append a 32-bit value
    pub fn u32(&mut self, value: u32) -> &mut Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Append a 32-bit float
    pub fn f32(&mut self, value: f32) -> &mut Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_f32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Append a boolean as a single byte
    pub fn flag(&mut self, value: bool) -> &mut Self {
        self.u8(value as u8)
    }

    /// Append a `char[capacity]` field, NUL padded.
    ///
    /// Text that does not fit is rejected rather than cut mid-frame.
    pub fn text(
        &mut self,
        field: &'static str,
        text: &str,
        capacity: usize,
    ) -> Result<&mut Self, EncodingError> {
        let bytes = text.as_bytes();
        if bytes.len() > capacity {
            return Err(EncodingError::TextTooLong {
                field,
                len: bytes.len(),
                capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        self.buf.resize(self.buf.len() + capacity - bytes.len(), 0);
        Ok(self)
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the encoded body
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked little-endian reader over a message body
#[derive(Debug)]
pub struct BodyReader<'a> {
    type_id: u8,
    body: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    /// Start reading `body`, which must be exactly `expected` bytes long
    pub fn new(type_id: u8, body: &'a [u8], expected: usize) -> Result<Self, DecodingError> {
        if body.len() != expected {
            return Err(DecodingError::BodyLength {
                type_id,
                expected,
                actual: body.len(),
            });
        }
        Ok(Self {
            type_id,
            body,
            pos: 0,
        })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodingError> {
        let end = self.pos + n;
        if end > self.body.len() {
            return Err(DecodingError::BodyLength {
                type_id: self.type_id,
                expected: end,
                actual: self.body.len(),
            });
        }
        let bytes = &self.body[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read a byte
    pub fn u8(&mut self) -> Result<u8, DecodingError> {
        Ok(self.take(1)?[0])
    }

    /// Read a 16-bit value
    pub fn u16(&mut self) -> Result<u16, DecodingError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    /// Read a 32-bit value
    pub fn u32(&mut self) -> Result<u32, DecodingError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Read a 32-bit float
    pub fn f32(&mut self) -> Result<f32, DecodingError> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// Read a single-byte boolean (any non-zero value is true)
    pub fn flag(&mut self) -> Result<bool, DecodingError> {
        Ok(self.u8()? != 0)
    }

    /// Read a `char[capacity]` field up to its first NUL
    pub fn text(&mut self, capacity: usize) -> Result<String, DecodingError> {
        let raw = self.take(capacity)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.body.len() - self.pos
    }
}

/// Decoder signature stored in the registry
pub type DecodeFn = fn(&[u8]) -> Result<Glob, DecodingError>;

/// Encoder signature stored in the registry
pub type EncodeFn = fn(&Glob) -> Result<Vec<u8>, EncodingError>;

/// Registry entry describing one type id
#[derive(Debug, Clone, Copy)]
pub struct CodecEntry {
    /// Wire type id
    pub type_id: u8,
    /// Type name for logs
    pub name: &'static str,
    /// Exact body size
    pub body_len: usize,
    /// Allowed direction
    pub direction: Direction,
    /// Body encoder
    pub encode: EncodeFn,
    /// Body decoder
    pub decode: DecodeFn,
}

impl CodecEntry {
    /// Build the entry for a [`GlobBody`] type
    pub fn of<T: GlobVariant>() -> Self {
        Self {
            type_id: T::TYPE_ID,
            name: T::NAME,
            body_len: T::BODY_LEN,
            direction: T::DIRECTION,
            encode: encode_as::<T>,
            decode: decode_as::<T>,
        }
    }
}

fn encode_as<T: GlobVariant>(glob: &Glob) -> Result<Vec<u8>, EncodingError> {
    match T::from_glob(glob) {
        Some(body) => body.encode_body(),
        None => Err(EncodingError::CodecMismatch {
            type_id: glob.type_id(),
            codec: T::NAME,
            glob: glob.name(),
        }),
    }
}

fn decode_as<T: GlobVariant>(body: &[u8]) -> Result<Glob, DecodingError> {
    T::decode_body(body).map(Into::into)
}

/// Table mapping type ids to codecs
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    entries: [Option<CodecEntry>; 256],
}

impl CodecRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            entries: [None; 256],
        }
    }

    /// The canonical id table for this protocol revision
    pub fn canonical() -> Self {
        let mut registry = Self::empty();
        registry.register(CodecEntry::of::<AssertMessage>());
        registry.register(CodecEntry::of::<DebugMessage>());
        registry.register(CodecEntry::of::<CaptureData>());
        registry.register(CodecEntry::of::<DrivingCommand>());
        registry.register(CodecEntry::of::<CaptureCommand>());
        registry.register(CodecEntry::of::<StatusData>());
        registry.register(CodecEntry::of::<Modes>());
        registry.register(CodecEntry::of::<RobotCommand>());
        registry.register(CodecEntry::of::<Wave>());
        registry.register(CodecEntry::of::<PidParams>());
        registry.register(CodecEntry::of::<Request>());
        registry.register(CodecEntry::of::<TaskTimingResult>());
        registry
    }

    /// Add or replace the entry for `entry.type_id`, returning the previous one
    pub fn register(&mut self, entry: CodecEntry) -> Option<CodecEntry> {
        self.entries[entry.type_id as usize].replace(entry)
    }

    /// Look up a type id
    pub fn entry(&self, type_id: u8) -> Option<&CodecEntry> {
        self.entries[type_id as usize].as_ref()
    }

    /// All registered entries in id order
    pub fn entries(&self) -> impl Iterator<Item = &CodecEntry> {
        self.entries.iter().flatten()
    }

    /// Decode a received body with the registered decoder.
    ///
    /// The body must be exactly the registered length.
    pub fn decode(&self, type_id: u8, body: &[u8]) -> Result<Glob, DecodingError> {
        let entry = self
            .entry(type_id)
            .ok_or(DecodingError::UnknownType(type_id))?;
        if entry.direction == Direction::SendOnly {
            return Err(DecodingError::SendOnly(type_id));
        }
        if body.len() != entry.body_len {
            return Err(DecodingError::BodyLength {
                type_id,
                expected: entry.body_len,
                actual: body.len(),
            });
        }
        (entry.decode)(body)
    }

    /// Encode an outgoing Glob body with the registered encoder
    pub fn encode(&self, glob: &Glob) -> Result<Vec<u8>, EncodingError> {
        let type_id = glob.type_id();
        let entry = self
            .entry(type_id)
            .ok_or(EncodingError::UnknownType(type_id))?;
        let body = (entry.encode)(glob)?;
        if body.len() > MAX_BODY_LEN {
            return Err(EncodingError::BodyTooLarge(body.len()));
        }
        if body.len() != entry.body_len {
            return Err(EncodingError::BodyLength {
                type_id,
                expected: entry.body_len,
                actual: body.len(),
            });
        }
        Ok(body)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{GlobId, RobotCommandKind};

    #[test]
    fn test_writer_little_endian() {
        let mut w = BodyWriter::default();
        w.u8(0x01).u16(0x0302).u32(0x0706_0504);
        assert_eq!(w.finish(), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_text_is_nul_padded() {
        let mut w = BodyWriter::default();
        w.text("message", "hi", 4).unwrap();
        assert_eq!(w.finish(), b"hi\0\0".to_vec());
    }

    #[test]
    fn test_text_too_long() {
        let mut w = BodyWriter::default();
        let err = w.text("message", "hello", 4).unwrap_err();
        assert_eq!(
            err,
            EncodingError::TextTooLong {
                field: "message",
                len: 5,
                capacity: 4
            }
        );
    }

    #[test]
    fn test_reader_exact_length() {
        let body = [0u8; 3];
        assert!(BodyReader::new(7, &body, 4).is_err());
        assert!(BodyReader::new(7, &body, 2).is_err());
        assert!(BodyReader::new(7, &body, 3).is_ok());
    }

    #[test]
    fn test_reader_never_reads_past_body() {
        let body = [1u8, 2];
        let mut r = BodyReader::new(9, &body, 2).unwrap();
        assert_eq!(r.u16().unwrap(), 0x0201);
        assert_eq!(r.remaining(), 0);
        assert!(matches!(r.u8(), Err(DecodingError::BodyLength { .. })));
    }

    #[test]
    fn test_reader_text_stops_at_nul() {
        let body = *b"ok\0garbage";
        let mut r = BodyReader::new(1, &body, body.len()).unwrap();
        assert_eq!(r.text(body.len()).unwrap(), "ok");
    }

    #[test]
    fn test_canonical_table() {
        let registry = CodecRegistry::canonical();
        let ids: Vec<u8> = registry.entries().map(|e| e.type_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 14, 15, 17, 18, 19, 20]);
        assert!(registry.entry(16).is_none());
        assert_eq!(registry.entry(GlobId::STATUS_DATA).unwrap().body_len, 44);
    }

    #[test]
    fn test_decode_unknown_type() {
        let registry = CodecRegistry::canonical();
        assert_eq!(
            registry.decode(16, &[]).unwrap_err(),
            DecodingError::UnknownType(16)
        );
    }

    #[test]
    fn test_request_is_send_only() {
        let registry = CodecRegistry::canonical();
        let body = registry
            .encode(&Glob::Request(Request::new(GlobId::PID_PARAMS)))
            .unwrap();
        assert_eq!(body, vec![GlobId::PID_PARAMS]);
        assert_eq!(
            registry.decode(GlobId::REQUEST, &body).unwrap_err(),
            DecodingError::SendOnly(GlobId::REQUEST)
        );
    }

    #[test]
    fn test_encode_rejects_unregistered_type() {
        let mut registry = CodecRegistry::empty();
        registry.register(CodecEntry::of::<Modes>());
        let glob = Glob::RobotCommand(RobotCommand::new(RobotCommandKind::Start));
        assert_eq!(
            registry.encode(&glob).unwrap_err(),
            EncodingError::UnknownType(GlobId::ROBOT_COMMAND)
        );
    }

    #[test]
    fn test_register_replaces_entry() {
        let mut registry = CodecRegistry::canonical();
        let previous = registry.register(CodecEntry {
            name: "Modes (v3)",
            ..CodecEntry::of::<Modes>()
        });
        assert_eq!(previous.unwrap().name, "Modes");
        assert_eq!(registry.entry(GlobId::MODES).unwrap().name, "Modes (v3)");
    }

    #[test]
    fn test_registered_length_is_enforced() {
        let mut registry = CodecRegistry::canonical();
        registry.register(CodecEntry {
            body_len: 7,
            ..CodecEntry::of::<Modes>()
        });

        let glob = Glob::Modes(Modes::default());
        assert_eq!(
            registry.encode(&glob).unwrap_err(),
            EncodingError::BodyLength {
                type_id: GlobId::MODES,
                expected: 7,
                actual: 3
            }
        );
        assert_eq!(
            registry.decode(GlobId::MODES, &[0, 0, 0]).unwrap_err(),
            DecodingError::BodyLength {
                type_id: GlobId::MODES,
                expected: 7,
                actual: 3
            }
        );
    }

    // Modes with a trailing reserved byte
    fn encode_modes_padded(glob: &Glob) -> Result<Vec<u8>, EncodingError> {
        let mut body = (CodecEntry::of::<Modes>().encode)(glob)?;
        body.push(0xAA);
        Ok(body)
    }

    fn decode_modes_padded(body: &[u8]) -> Result<Glob, DecodingError> {
        Modes::decode_body(&body[..Modes::BODY_LEN]).map(Glob::Modes)
    }

    #[test]
    fn test_registered_codec_drives_both_directions() {
        let mut registry = CodecRegistry::canonical();
        registry.register(CodecEntry {
            name: "Modes (padded)",
            body_len: 4,
            encode: encode_modes_padded,
            decode: decode_modes_padded,
            ..CodecEntry::of::<Modes>()
        });

        let glob = Glob::Modes(Modes {
            main_mode: 1,
            sub_mode: 2,
            state: 3,
        });
        let body = registry.encode(&glob).unwrap();
        assert_eq!(body, vec![1, 2, 3, 0xAA]);
        assert_eq!(registry.decode(GlobId::MODES, &body).unwrap(), glob);
    }

    #[test]
    fn test_entry_for_wrong_type_is_mismatch() {
        let mut registry = CodecRegistry::empty();
        registry.register(CodecEntry {
            type_id: GlobId::ROBOT_COMMAND,
            ..CodecEntry::of::<Modes>()
        });
        let glob = Glob::RobotCommand(RobotCommand::new(RobotCommandKind::Start));
        assert_eq!(
            registry.encode(&glob).unwrap_err(),
            EncodingError::CodecMismatch {
                type_id: GlobId::ROBOT_COMMAND,
                codec: "Modes",
                glob: "RobotCommand"
            }
        );
    }
}
