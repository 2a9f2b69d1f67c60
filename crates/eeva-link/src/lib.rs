//! # Eeva Link
//!
//! Host side of the serial link to the Eeva balancing robot.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame encoding and a resumable, byte-at-a-time frame parser
//! - CRC-16 integrity checking
//! - Typed codecs for every Glob message the robot understands
//! - A [`link::Link`] that runs the reader and parser tasks, dispatches
//!   decoded messages and keeps link statistics
//!
//! ## Example
//!
//! ```rust,ignore
//! use eeva_link::prelude::*;
//!
//! let mut link = Link::new(LinkConfig::default());
//! link.connect("/dev/rfcomm0", |env| println!("{:?}", env.glob))?;
//!
//! // Ask for every controller's gains
//! link.send(&Envelope::with_instance(0, Request::of::<PidParams>())).await?;
//! println!("{:?}", link.stats());
//! ```

pub mod link;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::link::{Link, LinkConfig, LinkHealth, LinkMonitor, LinkStats};
    pub use crate::protocol::{
        CaptureCommand, CaptureData, DebugMessage, DrivingCommand, Envelope, Glob, GlobBody,
        LinkError, Modes, PidParams, Request, RobotCommand, RobotCommandKind, StatusData, Wave,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
