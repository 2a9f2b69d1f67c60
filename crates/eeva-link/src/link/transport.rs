//! Transport adapter
//!
//! Anything that reads and writes bytes asynchronously can carry the link:
//! a serial port in production, an in-memory duplex pipe in tests. The read
//! side runs on its own task and hands chunks to the parser through a
//! bounded channel; writes happen on the caller's task.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::LinkConfig;
use crate::protocol::LinkError;

/// Byte stream the link can run over
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Open and configure a serial port for the robot link (8N1, no flow control)
pub fn open_serial(port_name: &str, config: &LinkConfig) -> Result<SerialStream, LinkError> {
    let mut port = tokio_serial::new(port_name, config.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(config.read_timeout())
        .open_native_async()
        .map_err(|e| LinkError::SerialError(format!("{}: {}", port_name, e)))?;

    // Some USB bridges reset the board when DTR drops; keep it asserted
    if let Err(e) = port.write_data_terminal_ready(true) {
        debug!("failed to set DTR on {}: {} (continuing)", port_name, e);
    }

    port.clear(tokio_serial::ClearBuffer::All)
        .map_err(|e| LinkError::SerialError(e.to_string()))?;

    Ok(port)
}

/// Reader task: push every non-empty chunk into `tx` until cancelled,
/// the transport closes, or the parser goes away.
pub(crate) async fn read_loop<R>(
    mut reader: R,
    tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
    chunk_size: usize,
    read_timeout: Duration,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = vec![0u8; chunk_size];
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = tokio::time::timeout(read_timeout, reader.read(&mut buf)) => read,
        };

        match read {
            // Timed out with nothing to read; go round and re-check for stop
            Err(_) => continue,
            Ok(Ok(0)) => {
                debug!("transport closed");
                break;
            }
            Ok(Ok(n)) => {
                buf.truncate(n);
                trace!("read {} bytes", n);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(buf) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Err(e))
                if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
            {
                continue
            }
            Ok(Err(e)) => {
                warn!("transport read failed: {}", e);
                break;
            }
        }
    }
}

/// Write one frame.
///
/// Returns `Ok(false)` when the write did not finish within `timeout`; the
/// frame is dropped in that case. Other I/O failures are returned.
pub(crate) async fn write_frame<W>(
    writer: &mut W,
    frame: &[u8],
    timeout: Duration,
) -> Result<bool, LinkError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let write = async {
        writer.write_all(frame).await?;
        writer.flush().await
    };

    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => Ok(true),
        Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
            warn!("write timed out, dropping {} bytes", frame.len());
            Ok(false)
        }
        Ok(Err(e)) => Err(LinkError::IoError(e)),
        Err(_) => {
            warn!("write timed out, dropping {} bytes", frame.len());
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_loop_forwards_chunks() {
        let (mut remote, local) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_loop(
            local,
            tx,
            cancel.clone(),
            16,
            Duration::from_millis(20),
        ));

        remote.write_all(&[1, 2, 3]).await.unwrap();
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk, vec![1, 2, 3]);

        cancel.cancel();
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_read_loop_splits_at_chunk_size() {
        let (mut remote, local) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(read_loop(
            local,
            tx,
            CancellationToken::new(),
            4,
            Duration::from_millis(20),
        ));

        remote.write_all(&[0u8; 10]).await.unwrap();
        drop(remote);
        task.await.unwrap();

        let mut total = 0;
        while let Some(chunk) = rx.recv().await {
            assert!(!chunk.is_empty() && chunk.len() <= 4);
            total += chunk.len();
        }
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn test_read_loop_stops_on_timeout_then_cancel() {
        let (_remote, local) = tokio::io::duplex(64);
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_loop(
            local,
            tx,
            cancel.clone(),
            16,
            Duration::from_millis(5),
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!task.is_finished());
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_frame() {
        let (mut remote, mut local) = tokio::io::duplex(64);
        let written = write_frame(&mut local, &[0xFE, 1, 2], Duration::from_millis(100))
            .await
            .unwrap();
        assert!(written);
        let mut buf = [0u8; 3];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xFE, 1, 2]);
    }

    #[tokio::test]
    async fn test_write_frame_dropped_when_peer_stalls() {
        // Nobody drains the 4 byte pipe, so the write cannot complete
        let (_remote, mut local) = tokio::io::duplex(4);
        let written = write_frame(&mut local, &[0u8; 16], Duration::from_millis(20))
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn test_write_frame_error_when_peer_gone() {
        let (remote, mut local) = tokio::io::duplex(4);
        drop(remote);
        let result = write_frame(&mut local, &[0u8; 2], Duration::from_millis(20)).await;
        assert!(matches!(result, Err(LinkError::IoError(_))));
    }
}
