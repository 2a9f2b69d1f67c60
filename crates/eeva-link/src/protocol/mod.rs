//! Glob serial protocol
//!
//! Framing, checksums and body layouts for the messages ("Globs") exchanged
//! with the robot firmware.
//!
//! Uses the revision 2 id table. Frames from earlier revisions (different
//! header widths and ids) are not understood.

pub mod codec;
pub mod crc;
mod error;
pub mod frame;
pub mod messages;
pub mod version;

pub use codec::{
    BodyReader, BodyWriter, CodecEntry, CodecRegistry, DecodeFn, Direction, EncodeFn, GlobBody,
    GlobVariant,
};
pub use crc::{crc16, CRC_INITIAL};
pub use error::{DecodingError, EncodingError, LinkError};
pub use frame::{encode_frame, FrameParser, ParseEvent, ParseState, RawFrame, START_BYTE};
pub use messages::{
    AssertAction, AssertMessage, CaptureCommand, CaptureData, DebugMessage, DrivingCommand,
    Envelope, Glob, GlobId, Modes, Movement, PidParams, Request, RobotCommand, RobotCommandKind,
    StatusData, StatusDerived, TaskTimingResult, Wave, WaveType,
};
pub use version::PROTOCOL_VERSION;

/// Default baud rate for the robot link
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Largest body a frame can carry (one length byte)
pub const MAX_BODY_LEN: usize = 255;
