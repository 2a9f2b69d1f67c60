//! Link management
//!
//! A [`Link`] owns at most one connection. Each connection runs two tasks:
//! a reader that pulls chunks off the transport, and a parser that turns
//! them into frames, decodes them and hands each message to the caller's
//! callback. Sends are written directly from the caller's task.

pub mod capture;
pub mod config;
pub mod monitor;
pub mod stats;
pub mod transport;

pub use capture::{CaptureOutcome, CaptureReport, CaptureSession};
pub use config::LinkConfig;
pub use monitor::{LinkHealth, LinkMonitor, LinkReport};
pub use stats::{LinkStatistics, LinkStats};
pub use transport::{open_serial, Transport};

use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::protocol::{encode_frame, CodecRegistry, Envelope, FrameParser, LinkError, ParseEvent};

/// Callback invoked on the parser task for every decoded message
pub type MessageHandler = Box<dyn FnMut(Envelope) + Send + 'static>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One open transport and the tasks serving it
struct Session {
    writer: Mutex<BoxedWriter>,
    stats: Arc<LinkStatistics>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    parser: JoinHandle<()>,
}

impl Session {
    fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && !self.reader.is_finished()
    }

    fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Serial link to the robot
pub struct Link {
    config: LinkConfig,
    registry: Arc<CodecRegistry>,
    session: Option<Session>,
}

impl Link {
    /// Create a link using the canonical codec table (not yet connected)
    pub fn new(config: LinkConfig) -> Self {
        Self::with_registry(config, CodecRegistry::canonical())
    }

    /// Create a link with a custom codec table
    pub fn with_registry(config: LinkConfig, registry: CodecRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            session: None,
        }
    }

    /// Configuration used for every connection
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Codec table used to encode and decode bodies
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Whether a connection is open and its transport still alive
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_open)
    }

    /// Open a serial port and start receiving.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect<F>(&mut self, port_name: &str, on_message: F) -> Result<(), LinkError>
    where
        F: FnMut(Envelope) + Send + 'static,
    {
        if self.is_connected() {
            return Err(LinkError::AlreadyConnected);
        }
        self.config.validate()?;
        let port = open_serial(port_name, &self.config)?;
        info!("connected to {} at {} baud", port_name, self.config.baud_rate);
        self.connect_transport(port, on_message)
    }

    /// Start receiving over an already open transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_transport<T, F>(&mut self, transport: T, on_message: F) -> Result<(), LinkError>
    where
        T: Transport,
        F: FnMut(Envelope) + Send + 'static,
    {
        if self.is_connected() {
            return Err(LinkError::AlreadyConnected);
        }
        self.config.validate()?;

        // A previous session whose transport died may still have a parser
        // draining its queue; stop it before the new one starts dispatching.
        if let Some(old) = self.session.take() {
            old.stop();
        }

        let (read_half, write_half) = tokio::io::split(transport);
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let cancel = CancellationToken::new();
        let stats = Arc::new(LinkStatistics::new());

        let reader = tokio::spawn(transport::read_loop(
            read_half,
            tx,
            cancel.clone(),
            self.config.read_chunk_size,
            self.config.read_timeout(),
        ));

        let parser = tokio::spawn(parse_loop(
            rx,
            cancel.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&stats),
            self.config.crc_initial,
            Box::new(on_message),
        ));

        self.session = Some(Session {
            writer: Mutex::new(Box::new(write_half)),
            stats,
            cancel,
            reader,
            parser,
        });
        Ok(())
    }

    /// Close the connection.
    ///
    /// Returns whether a live connection was closed; `false` when none was
    /// open or the transport had already gone away.
    pub fn disconnect(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        let was_open = session.is_open();
        session.stop();
        if was_open {
            info!("disconnected");
        }
        was_open
    }

    /// Encode, frame and write one message. Does nothing when not connected.
    ///
    /// The sent counters are updated even if the transport drops the write.
    pub async fn send(&self, message: &Envelope) -> Result<(), LinkError> {
        let Some(session) = self.session.as_ref().filter(|s| s.is_open()) else {
            return Ok(());
        };

        let body = self.registry.encode(&message.glob)?;
        let frame = encode_frame(
            message.glob.type_id(),
            message.instance,
            &body,
            self.config.crc_initial,
        )?;

        let mut writer = session.writer.lock().await;
        session.stats.record_sent(frame.len());
        trace!(
            "sending {} instance {} ({} bytes)",
            message.glob.name(),
            message.instance,
            frame.len()
        );
        transport::write_frame(&mut *writer, &frame, self.config.write_timeout()).await?;
        Ok(())
    }

    /// Current counters; all zero when not connected
    pub fn stats(&self) -> LinkStats {
        self.session
            .as_ref()
            .map(|s| s.stats.snapshot())
            .unwrap_or_default()
    }

    /// Disconnect and wait for the connection's tasks to finish
    pub async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
            let _ = session.reader.await;
            let _ = session.parser.await;
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Parser task: drain chunks, extract frames, decode and dispatch in order
async fn parse_loop(
    mut rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
    registry: Arc<CodecRegistry>,
    stats: Arc<LinkStatistics>,
    crc_initial: u16,
    mut on_message: MessageHandler,
) {
    let mut parser = FrameParser::with_crc_initial(crc_initial);

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            chunk = rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        stats.record_bytes_received(chunk.len());
        for event in parser.feed(&chunk) {
            dispatch(event, &registry, &stats, &mut on_message);
        }
    }

    if !parser.is_idle() {
        debug!("abandoning partial frame in state {:?}", parser.state());
    }
}

fn dispatch(
    event: ParseEvent,
    registry: &CodecRegistry,
    stats: &LinkStatistics,
    on_message: &mut MessageHandler,
) {
    match event {
        ParseEvent::Frame(frame) => {
            stats.record_message_received();
            match registry.decode(frame.type_id, &frame.body) {
                Ok(glob) => {
                    trace!("received {} instance {}", glob.name(), frame.instance);
                    on_message(Envelope {
                        instance: frame.instance,
                        glob,
                    });
                }
                Err(e) => {
                    stats.record_dropped();
                    debug!("dropping frame type {}: {}", frame.type_id, e);
                }
            }
        }
        ParseEvent::BadCrc {
            type_id,
            instance,
            expected,
            received,
        } => {
            stats.record_bad_crc();
            debug!(
                "bad CRC on type {} instance {}: expected {:#06x}, got {:#06x}",
                type_id, instance, expected, received
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GlobBody, Modes, RawFrame, Request, RobotCommand, RobotCommandKind};
    use std::sync::Mutex as StdMutex;

    fn collector() -> (Arc<StdMutex<Vec<Envelope>>>, MessageHandler) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: MessageHandler = Box::new(move |env| sink.lock().unwrap().push(env));
        (seen, handler)
    }

    #[test]
    fn test_link_state() {
        let link = Link::new(LinkConfig::default());
        assert!(!link.is_connected());
        assert_eq!(link.stats(), LinkStats::default());
    }

    #[test]
    fn test_disconnect_when_not_connected() {
        let mut link = Link::new(LinkConfig::default());
        assert!(!link.disconnect());
        assert!(!link.disconnect());
    }

    #[test]
    fn test_dispatch_decodes_valid_frame() {
        let registry = CodecRegistry::canonical();
        let stats = LinkStatistics::new();
        let (seen, mut handler) = collector();
        let body = RobotCommand::new(RobotCommandKind::Stop).encode_body().unwrap();

        dispatch(
            ParseEvent::Frame(RawFrame {
                type_id: RobotCommand::TYPE_ID,
                instance: 1,
                body,
            }),
            &registry,
            &stats,
            &mut handler,
        );

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![Envelope::new(RobotCommand::new(RobotCommandKind::Stop))]
        );
        assert_eq!(stats.snapshot().messages_received, 1);
        assert_eq!(stats.snapshot().dropped, 0);
    }

    #[test]
    fn test_dispatch_drops_undecodable_frames() {
        let registry = CodecRegistry::canonical();
        let stats = LinkStatistics::new();
        let (seen, mut handler) = collector();

        for (type_id, body) in [
            (16u8, vec![]),                    // unknown id
            (Modes::TYPE_ID, vec![1, 2]),      // short body
            (Request::TYPE_ID, vec![18]),      // send-only
        ] {
            dispatch(
                ParseEvent::Frame(RawFrame {
                    type_id,
                    instance: 1,
                    body,
                }),
                &registry,
                &stats,
                &mut handler,
            );
        }

        assert!(seen.lock().unwrap().is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.messages_received, 3);
        assert_eq!(snap.dropped, 3);
    }

    #[test]
    fn test_dispatch_counts_bad_crc() {
        let registry = CodecRegistry::canonical();
        let stats = LinkStatistics::new();
        let (seen, mut handler) = collector();
        dispatch(
            ParseEvent::BadCrc {
                type_id: 2,
                instance: 1,
                expected: 1,
                received: 2,
            },
            &registry,
            &stats,
            &mut handler,
        );
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(stats.snapshot().bad_crc, 1);
        assert_eq!(stats.snapshot().messages_received, 0);
    }

    #[tokio::test]
    async fn test_send_when_not_connected_is_noop() {
        let link = Link::new(LinkConfig::default());
        link.send(&Envelope::new(Modes::default())).await.unwrap();
        assert_eq!(link.stats().messages_sent, 0);
    }
}
