//! Protocol errors

use thiserror::Error;

/// Errors raised while packing an outgoing Glob body
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    /// Text does not fit its fixed-size field
    #[error("Text field '{field}' is {len} bytes, capacity is {capacity}")]
    TextTooLong {
        field: &'static str,
        len: usize,
        capacity: usize,
    },

    /// Numeric value out of range for its field
    #[error("Value {value} does not fit field '{field}'")]
    FieldOverflow { field: &'static str, value: f64 },

    /// Value not allowed in an enum or flag field
    #[error("Invalid value {value:#x} for field '{field}'")]
    InvalidField { field: &'static str, value: u32 },

    /// Body longer than one length byte can describe
    #[error("Body of {0} bytes exceeds the 255 byte frame limit")]
    BodyTooLarge(usize),

    /// Type id has no registered codec
    #[error("No codec registered for type id {0}")]
    UnknownType(u8),

    /// Body size differs from the registered layout
    #[error("Type {type_id} expects a {expected} byte body, encoder produced {actual}")]
    BodyLength {
        type_id: u8,
        expected: usize,
        actual: usize,
    },

    /// Registered codec belongs to a different type
    #[error("Codec '{codec}' registered for type id {type_id} cannot encode {glob}")]
    CodecMismatch {
        type_id: u8,
        codec: &'static str,
        glob: &'static str,
    },
}

/// Errors raised while unpacking a received Glob body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodingError {
    /// Body size differs from the registered layout
    #[error("Type {type_id} expects a {expected} byte body, got {actual}")]
    BodyLength {
        type_id: u8,
        expected: usize,
        actual: usize,
    },

    /// Type id has no registered codec
    #[error("No codec registered for type id {0}")]
    UnknownType(u8),

    /// Type only travels from host to robot
    #[error("Type id {0} is send-only and cannot be received")]
    SendOnly(u8),

    /// Field holds a value outside its enum
    #[error("Invalid value {value:#x} for field '{field}'")]
    InvalidValue { field: &'static str, value: u32 },
}

/// Errors surfaced by the link to its caller
#[derive(Error, Debug)]
pub enum LinkError {
    /// Opening or configuring the serial port failed
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Operation needs an open connection
    #[error("Not connected")]
    NotConnected,

    /// A connection is already open
    #[error("Already connected")]
    AlreadyConnected,

    /// Configuration rejected by validation
    #[error("Invalid link configuration: {0}")]
    Config(String),

    /// Outgoing message could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Incoming message could not be decoded
    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),

    /// Transport I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
