// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TCP development transport standing in for the BLE stack.
//
// Traffic in both directions is a stream of records:
//
//   [channel u8][len u16 BE][bytes]
//
// Channel 0 is the main write/notify characteristic, 1-3 the auxiliary
// channels.  From the client, `0x80 | ch` subscribes and `0xC0 | ch`
// unsubscribes (no body, len 0).  One client is served at a time.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc, watch};
use tracing::{debug, error, info, warn};

use instax_core::error::{InstaxError, Result};
use instax_engine::{AdvertisingRequest, AuxChannel, Transport, TransportEvent};

// ---------------------------------------------------------------------------
// Record format
// ---------------------------------------------------------------------------

pub const CHANNEL_PRIMARY: u8 = 0x00;
const SUBSCRIBE_FLAG: u8 = 0x80;
const UNSUBSCRIBE_FLAG: u8 = 0xC0;

/// Largest record body accepted from a client.
const MAX_RECORD_LEN: usize = 4096;

/// Frame `bytes` as one record on `channel`.
pub fn encode_record(channel: u8, bytes: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| InstaxError::Transport(format!("record of {} bytes too large", bytes.len())))?;
    let mut buf = Vec::with_capacity(bytes.len() + 3);
    buf.push(channel);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(buf)
}

/// Map a client record to an engine event.
pub fn event_for(channel: u8, data: Vec<u8>) -> Option<TransportEvent> {
    if channel == CHANNEL_PRIMARY {
        return Some(TransportEvent::WriteReceived(data));
    }
    let (flag, id) = (channel & UNSUBSCRIBE_FLAG, channel & !UNSUBSCRIBE_FLAG);
    let aux = AuxChannel::from_wire_id(id)?;
    match flag {
        0 => Some(TransportEvent::AuxiliaryWrite { channel: aux, data }),
        SUBSCRIBE_FLAG => Some(TransportEvent::SubscribeChanged { channel: aux, enabled: true }),
        UNSUBSCRIBE_FLAG => Some(TransportEvent::SubscribeChanged { channel: aux, enabled: false }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Outbound half
// ---------------------------------------------------------------------------

/// Engine-facing half: queues notification records for the connected client.
#[derive(Default)]
pub struct BridgeTransport {
    client: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl BridgeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self, tx: mpsc::UnboundedSender<Vec<u8>>) {
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    fn detach(&self) {
        self.client.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn push(&self, channel: u8, bytes: &[u8]) -> Result<()> {
        let record = encode_record(channel, bytes)?;
        let guard = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard
            .as_ref()
            .ok_or_else(|| InstaxError::Transport("no client connected".into()))?;
        tx.send(record).map_err(|_| InstaxError::ChannelClosed)
    }
}

impl Transport for BridgeTransport {
    fn notify(&self, bytes: &[u8]) -> Result<()> {
        self.push(CHANNEL_PRIMARY, bytes)
    }

    fn notify_secondary(&self, channel: AuxChannel, bytes: &[u8]) -> Result<()> {
        self.push(channel.wire_id(), bytes)
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

pub struct TcpBridge {
    listener: TcpListener,
    transport: Arc<BridgeTransport>,
    events: mpsc::Sender<TransportEvent>,
    shutdown: Arc<Notify>,
}

impl TcpBridge {
    pub async fn bind(
        addr: &str,
        transport: Arc<BridgeTransport>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| InstaxError::Transport(format!("bind {addr}: {e}")))?;
        info!(addr = %listener.local_addr()?, "development transport listening");
        Ok(Self {
            listener,
            transport,
            events,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle used to stop [`run`](Self::run).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Serve clients one at a time until shutdown is signalled.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    debug!("bridge received shutdown signal");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!(%peer, "client connected");
                            if !self.serve(stream).await {
                                break;
                            }
                            info!(%peer, "client disconnected");
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
        info!("development transport stopped");
    }

    /// Serve one client.  Returns `false` when shutdown was requested.
    async fn serve(&self, stream: TcpStream) -> bool {
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.transport.attach(tx);

        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = write_half.write_all(&record).await {
                    warn!(error = %e, "write to client failed");
                    break;
                }
            }
        });

        if self.events.send(TransportEvent::Connected).await.is_err() {
            error!("engine gone, closing client");
        }

        let mut reader = BufReader::new(read_half);
        let keep_running = tokio::select! {
            _ = self.shutdown.notified() => false,
            result = self.read_records(&mut reader) => {
                if let Err(e) = result {
                    debug!(error = %e, "client stream ended");
                }
                true
            }
        };

        self.transport.detach();
        writer.abort();
        if self.events.send(TransportEvent::Disconnected).await.is_err() {
            debug!("engine gone before disconnect");
        }
        keep_running
    }

    async fn read_records<R: AsyncReadExt + Unpin>(&self, reader: &mut R) -> Result<()> {
        loop {
            let channel = reader.read_u8().await?;
            let len = usize::from(reader.read_u16().await?);
            if len > MAX_RECORD_LEN {
                return Err(InstaxError::Transport(format!("record of {len} bytes exceeds {MAX_RECORD_LEN}")));
            }
            let mut data = vec![0u8; len];
            reader.read_exact(&mut data).await?;

            match event_for(channel, data) {
                Some(event) => self
                    .events
                    .send(event)
                    .await
                    .map_err(|_| InstaxError::ChannelClosed)?,
                None => warn!(channel = format_args!("{channel:#04x}"), "unknown record channel"),
            }
        }
    }
}

/// Log every advertising change until the device handle goes away.
pub async fn log_advertising(mut rx: watch::Receiver<AdvertisingRequest>) {
    loop {
        {
            let request = rx.borrow_and_update();
            let adv = &request.advertising;
            info!(
                revision = request.revision,
                name = %adv.local_name,
                manufacturer = format_args!("{:02X?}", adv.manufacturer_data),
                tx_power = adv.tx_power,
                packet = format_args!("{:02X?}", adv.advertising_packet()),
                scan_response = format_args!("{:02X?}", adv.scan_response_packet()),
                "advertising"
            );
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    // -- Records --

    #[test]
    fn record_has_channel_and_big_endian_length() {
        assert_eq!(encode_record(2, &[0xAA, 0xBB]).unwrap(), vec![2, 0x00, 0x02, 0xAA, 0xBB]);
        assert!(encode_record(0, &vec![0; 70_000]).is_err());
    }

    #[test]
    fn channels_map_to_events() {
        assert_eq!(event_for(0, vec![1]), Some(TransportEvent::WriteReceived(vec![1])));
        assert_eq!(
            event_for(2, vec![9]),
            Some(TransportEvent::AuxiliaryWrite { channel: AuxChannel::WideStatus, data: vec![9] })
        );
        assert_eq!(
            event_for(0x83, vec![]),
            Some(TransportEvent::SubscribeChanged { channel: AuxChannel::WideInfo, enabled: true })
        );
        assert_eq!(
            event_for(0xC1, vec![]),
            Some(TransportEvent::SubscribeChanged { channel: AuxChannel::LinkStatus, enabled: false })
        );
        assert_eq!(event_for(0x07, vec![]), None);
        assert_eq!(event_for(0x41, vec![]), None);
    }

    // -- Transport --

    #[test]
    fn notify_without_client_fails() {
        let transport = BridgeTransport::new();
        assert!(matches!(transport.notify(&[1]), Err(InstaxError::Transport(_))));
    }

    #[test]
    fn notify_queues_records_for_client() {
        let transport = BridgeTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.attach(tx);
        transport.notify_secondary(AuxChannel::WideInfo, &[5]).unwrap();
        assert_eq!(rx.try_recv().unwrap(), vec![3, 0, 1, 5]);
    }

    // -- Listener --

    #[tokio::test]
    async fn client_records_reach_engine_channel() {
        let transport = Arc::new(BridgeTransport::new());
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let bridge = TcpBridge::bind("127.0.0.1:0", Arc::clone(&transport), events_tx)
            .await
            .unwrap();
        let addr = bridge.local_addr().unwrap();
        let shutdown = bridge.shutdown_handle();
        let task = tokio::spawn(bridge.run());

        let mut client = TcpStream::connect(addr).await.unwrap();
        assert_eq!(events_rx.recv().await, Some(TransportEvent::Connected));

        client.write_all(&encode_record(0, &[0x41, 0x62]).unwrap()).await.unwrap();
        assert_eq!(events_rx.recv().await, Some(TransportEvent::WriteReceived(vec![0x41, 0x62])));

        drop(client);
        assert_eq!(events_rx.recv().await, Some(TransportEvent::Disconnected));

        shutdown.notify_one();
        task.await.unwrap();
    }
}
