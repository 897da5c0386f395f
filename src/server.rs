//! TCP session server for tracker connections.
//!
//! Each connection runs its own task through a fixed state machine: read
//! the 2-byte-length-prefixed device identifier, acknowledge it with a
//! single byte, then consume a stream of Codec8 packets. Framing is
//! length-aware: partial reads stay buffered until a full packet is
//! available. Every decoded packet is acknowledged with the announced
//! record count as a 4-byte big-endian integer. Undecodable packets are
//! logged and dropped without an acknowledgement so the device retransmits.
//!
//! Ingestion is awaited inline under a shared semaphore: packets from one
//! connection persist in arrival order, and a burst of connections cannot
//! flood the repository.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::codec::{self, hex_preview};
use crate::error::{IngestError, SessionError};
use crate::metrics::Metrics;
use crate::processor::ingest::IngestService;

const ACCEPT: u8 = 0x01;
const REJECT: u8 = 0x00;
const READ_CHUNK: usize = 8192;
const MAX_IDENTIFIER_LEN: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Hard cap on the per-connection read buffer; a declared frame beyond
    /// it closes the connection.
    pub frame_cap_bytes: usize,
    /// A connection without a complete read for this long is closed.
    pub idle_timeout: Duration,
}

pub async fn run_server(
    listener: TcpListener,
    ingest: Arc<IngestService>,
    metrics: Arc<Metrics>,
    cfg: SessionConfig,
    ingest_workers: usize,
) -> anyhow::Result<()> {
    let permits = Arc::new(Semaphore::new(ingest_workers.max(1)));
    loop {
        let (socket, peer) = listener.accept().await?;
        debug!(%peer, "device connected");

        let ingest = ingest.clone();
        let metrics = metrics.clone();
        let permits = permits.clone();
        tokio::spawn(async move {
            match handle_connection(socket, ingest, metrics, permits, cfg).await {
                Ok(()) => debug!(%peer, "session closed"),
                Err(e) => warn!(%peer, error = %e, "session ended"),
            }
        });
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    ingest: Arc<IngestService>,
    metrics: Arc<Metrics>,
    permits: Arc<Semaphore>,
    cfg: SessionConfig,
) -> Result<(), SessionError> {
    let identifier = match read_identifier(&mut socket, cfg.idle_timeout).await {
        Ok(id) => id,
        Err(e @ SessionError::BadIdentifier(_)) => {
            let _ = socket.write_all(&[REJECT]).await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    // Accept unconditionally; the device is resolved per packet so an
    // unknown identifier cannot be used to probe the registry from the
    // handshake alone.
    socket.write_all(&[ACCEPT]).await?;
    info!(device = %identifier, "session accepted");

    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match timeout(cfg.idle_timeout, socket.read(&mut chunk)).await {
            Ok(read) => read?,
            Err(_) => return Err(SessionError::IdleTimeout),
        };
        if n == 0 {
            return Ok(()); // device hung up
        }
        buf.extend_from_slice(&chunk[..n]);

        while let Some(frame) = next_frame(&mut buf, cfg.frame_cap_bytes)? {
            match codec::decode_packet(&frame) {
                Ok(packet) => {
                    let announced = packet.records.len() as u32;
                    debug!(
                        device = %identifier,
                        codec = ?packet.codec,
                        bytes = packet.bytes_consumed,
                        records = announced,
                        "packet decoded"
                    );
                    let Ok(_permit) = permits.acquire().await else {
                        return Ok(());
                    };
                    match ingest.ingest(&packet, &identifier).await {
                        Ok(outcome) => {
                            debug!(
                                device = %identifier,
                                processed = outcome.records_processed,
                                skipped = outcome.records_skipped,
                                "packet ingested"
                            );
                            socket.write_all(&announced.to_be_bytes()).await?;
                        }
                        Err(IngestError::UnauthorizedDevice(_)) => {
                            // Acknowledged but never persisted; retransmits
                            // of the same packet are equally harmless.
                            warn!(device = %identifier, "packet from unregistered device dropped");
                            socket.write_all(&announced.to_be_bytes()).await?;
                        }
                        Err(IngestError::Repository(e)) => {
                            // No ACK: the device will resend the packet.
                            error!(device = %identifier, error = %e, "persist failed, withholding ack");
                        }
                    }
                }
                Err(e) => {
                    Metrics::bump(&metrics.packets_dropped);
                    warn!(
                        device = %identifier,
                        error = %e,
                        payload = %hex_preview(&frame, 64),
                        "dropping undecodable packet"
                    );
                }
            }
        }
    }
}

/// Handshake: 2-byte big-endian length, then that many printable-ASCII
/// bytes (the identifier, typically a 15-digit IMEI).
async fn read_identifier(socket: &mut TcpStream, idle: Duration) -> Result<String, SessionError> {
    let mut len_buf = [0u8; 2];
    timeout(idle, socket.read_exact(&mut len_buf))
        .await
        .map_err(|_| SessionError::IdleTimeout)??;
    let len = u16::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_IDENTIFIER_LEN {
        return Err(SessionError::BadIdentifier(format!("length {len}")));
    }

    let mut id_buf = vec![0u8; len];
    timeout(idle, socket.read_exact(&mut id_buf))
        .await
        .map_err(|_| SessionError::IdleTimeout)??;
    if !id_buf.iter().all(|b| (0x20..=0x7E).contains(b)) {
        return Err(SessionError::BadIdentifier(
            "non-printable bytes".to_string(),
        ));
    }

    String::from_utf8(id_buf)
        .map_err(|_| SessionError::BadIdentifier("invalid encoding".to_string()))
}

/// Slice one complete packet off the front of the buffer, if present.
/// Packet extent is 8 header bytes + declared data length + 4 CRC bytes.
fn next_frame(buf: &mut Vec<u8>, cap: usize) -> Result<Option<Vec<u8>>, SessionError> {
    if buf.len() < 8 {
        return Ok(None);
    }
    let declared = u32::from_be_bytes(buf[4..8].try_into().unwrap()) as usize;
    let total = 8 + declared + 4;
    if total > cap {
        return Err(SessionError::OversizedFrame {
            declared: total,
            cap,
        });
    }
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some(buf.drain(..total).collect()))
}
