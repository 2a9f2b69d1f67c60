//! Data capture accounting
//!
//! While a capture runs the robot streams `CaptureData` samples. When it is
//! done it echoes a `CaptureCommand` whose `total_samples` says how many it
//! recorded, which is checked against what actually arrived.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::protocol::{CaptureData, Glob};

/// How the received samples compare with what the robot recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureOutcome {
    /// Robot recorded nothing and nothing arrived
    NothingRecorded,
    /// Robot recorded samples but none arrived
    NoneReceived { expected: u32 },
    /// Every sample arrived
    Complete { received: u32 },
    /// Some samples were lost on the way
    Partial { received: u32, expected: u32 },
    /// More samples arrived than the robot reported
    TooMany { received: u32, expected: u32 },
}

impl CaptureOutcome {
    /// Whether any samples arrived
    pub fn has_data(&self) -> bool {
        !matches!(
            self,
            CaptureOutcome::NothingRecorded | CaptureOutcome::NoneReceived { .. }
        )
    }
}

impl fmt::Display for CaptureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureOutcome::NothingRecorded => write!(f, "No data was recorded by robot"),
            CaptureOutcome::NoneReceived { expected } => {
                write!(f, "Expecting {} samples but didn't receive any", expected)
            }
            CaptureOutcome::Complete { received } => {
                write!(f, "Received all {} samples", received)
            }
            CaptureOutcome::Partial { received, expected } => {
                write!(f, "Only received {} of {} samples", received, expected)
            }
            CaptureOutcome::TooMany { received, expected } => write!(
                f,
                "Received too many samples ({}), only expecting {}",
                received, expected
            ),
        }
    }
}

/// A finished capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    /// Received versus recorded sample count
    pub outcome: CaptureOutcome,
    /// Samples in arrival order
    pub samples: Vec<CaptureData>,
}

/// Collects samples until the robot reports the end of a capture
#[derive(Debug, Default)]
pub struct CaptureSession {
    samples: Vec<CaptureData>,
}

impl CaptureSession {
    /// An empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples received so far
    pub fn samples(&self) -> &[CaptureData] {
        &self.samples
    }

    /// Number of samples received so far
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has arrived yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop anything collected, e.g. after a reconnect
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Store one sample
    pub fn record(&mut self, sample: CaptureData) {
        if self.samples.is_empty() {
            info!("receiving capture data");
        }
        self.samples.push(sample);
    }

    /// Close the capture against the robot's sample count and start over
    pub fn finish(&mut self, total_samples: u32) -> CaptureReport {
        let samples = std::mem::take(&mut self.samples);
        let received = u32::try_from(samples.len()).unwrap_or(u32::MAX);
        let expected = total_samples;

        let outcome = match (received, expected) {
            (0, 0) => CaptureOutcome::NothingRecorded,
            (0, expected) => CaptureOutcome::NoneReceived { expected },
            (received, expected) if received == expected => {
                CaptureOutcome::Complete { received }
            }
            (received, expected) if received < expected => {
                CaptureOutcome::Partial { received, expected }
            }
            (received, expected) => CaptureOutcome::TooMany { received, expected },
        };
        debug!("capture finished: {}", outcome);

        CaptureReport { outcome, samples }
    }

    /// Feed a received message; returns a report when it ends the capture
    pub fn observe(&mut self, glob: &Glob) -> Option<CaptureReport> {
        match glob {
            Glob::CaptureData(sample) => {
                self.record(*sample);
                None
            }
            Glob::CaptureCommand(echo) => Some(self.finish(echo.total_samples)),
            _ => None,
        }
    }
}
