// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event-driven engine loop.
//
// A transport feeds `TransportEvent`s through one channel; the engine owns
// the reassembler and dispatcher and pushes notifications back through the
// `Transport` trait.  Frames are handled strictly in arrival order.
//
// Responses go through a FIFO outbox.  Each entry waits its own delay after
// the previous send, so a paced PRINT_DATA ACK holds back later responses but
// never the reassembly of incoming writes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use instax_core::EmulatorConfig;
use instax_core::error::Result;

use crate::device_state::DeviceHandle;
use crate::dispatcher::{Dispatch, Dispatcher, Outbound, Target, Timings};
use crate::gatt::{self, AuxChannel};
use crate::reassembler::Reassembler;
use crate::state_store::StateStore;
use crate::storage::PrintStorage;

/// Capacity of the channel returned by [`event_channel`].
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything a transport reports to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// A write to the main command characteristic.
    WriteReceived(Vec<u8>),
    /// A write to an auxiliary characteristic.
    AuxiliaryWrite { channel: AuxChannel, data: Vec<u8> },
    SubscribeChanged { channel: AuxChannel, enabled: bool },
}

/// Outbound half of a transport.
pub trait Transport: Send + Sync {
    /// Notify on the main notify characteristic.
    fn notify(&self, bytes: &[u8]) -> Result<()>;
    /// Notify on an auxiliary status characteristic.
    fn notify_secondary(&self, channel: AuxChannel, bytes: &[u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn notify(&self, bytes: &[u8]) -> Result<()> {
        (**self).notify(bytes)
    }

    fn notify_secondary(&self, channel: AuxChannel, bytes: &[u8]) -> Result<()> {
        (**self).notify_secondary(channel, bytes)
    }
}

/// Tunables taken from the emulator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_frame_size: usize,
    pub timings: Timings,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&EmulatorConfig::default())
    }
}

impl From<&EmulatorConfig> for EngineOptions {
    fn from(config: &EmulatorConfig) -> Self {
        Self {
            max_frame_size: config.max_frame_size,
            timings: Timings {
                data_ack_delay: Duration::from_millis(config.data_ack_delay_ms),
                history_notify_delay: Duration::from_millis(config.history_notify_delay_ms),
            },
        }
    }
}

/// Bounded channel for transport events.
pub fn event_channel() -> (mpsc::Sender<TransportEvent>, mpsc::Receiver<TransportEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

pub struct Engine<T: Transport> {
    device: DeviceHandle,
    reassembler: Reassembler,
    dispatcher: Dispatcher,
    transport: T,
    store: Option<Arc<Mutex<StateStore>>>,
    outbox: VecDeque<Outbound>,
    /// When the outbox head may be sent.
    head_due: Option<Instant>,
}

impl<T: Transport> Engine<T> {
    pub fn new(device: DeviceHandle, storage: Box<dyn PrintStorage>, transport: T, options: EngineOptions) -> Self {
        Self {
            reassembler: Reassembler::with_max_frame_size(options.max_frame_size),
            dispatcher: Dispatcher::new(device.clone(), storage).with_timings(options.timings),
            device,
            transport,
            store: None,
            outbox: VecDeque::new(),
            head_due: None,
        }
    }

    /// Persist committed prints and the device snapshot to `store`.
    pub fn with_state_store(mut self, store: Arc<Mutex<StateStore>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// Responses waiting for their pacing delay.
    pub fn queued_responses(&self) -> usize {
        self.outbox.len()
    }

    /// Consume events until every sender is dropped, then drain the outbox.
    ///
    /// Incoming events keep being processed while a paced response waits.
    pub async fn run(&mut self, mut events: mpsc::Receiver<TransportEvent>) {
        info!("engine running");
        loop {
            let due = self.head_due;
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.process(event),
                    None => break,
                },
                _ = tokio::time::sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                    self.send_head();
                }
            }
        }
        self.flush().await;
        info!("event channel closed, engine stopping");
    }

    /// Handle one event and wait until every response it produced is sent.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        self.process(event);
        self.flush().await;
    }

    fn process(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("client connected");
                self.device.set_connected(true);
            }
            TransportEvent::Disconnected => {
                info!("client disconnected");
                self.device.set_connected(false);
                self.reassembler.reset();
                self.dispatcher.on_disconnect();
                if !self.outbox.is_empty() {
                    debug!(dropped = self.outbox.len(), "dropping unsent responses");
                    self.outbox.clear();
                    self.head_due = None;
                }
            }
            TransportEvent::WriteReceived(chunk) => {
                if let Some(frame) = self.reassembler.on_chunk(&chunk) {
                    let dispatch = self.dispatcher.dispatch(&frame);
                    self.accept(dispatch);
                }
            }
            TransportEvent::AuxiliaryWrite { channel, data } => {
                debug!(?channel, len = data.len(), "auxiliary write");
                if channel == AuxChannel::WideStatus && self.has_aux(channel) {
                    let payload = self.device.with_state(|s| gatt::aux_payload(channel, s));
                    self.enqueue(aux(channel, payload));
                }
            }
            TransportEvent::SubscribeChanged { channel, enabled } => {
                debug!(?channel, enabled, "subscription changed");
                if enabled && channel == AuxChannel::WideInfo && self.has_aux(channel) {
                    self.enqueue(aux(channel, gatt::WIDE_INFO_PAYLOAD.to_vec()));
                }
            }
        }
    }

    fn has_aux(&self, channel: AuxChannel) -> bool {
        self.device.with_state(|s| s.profile().has_aux_channel(channel))
    }

    fn accept(&mut self, dispatch: Dispatch) {
        for out in dispatch.responses {
            self.enqueue(out);
        }

        if let Some(record) = dispatch.committed {
            let Some(store) = &self.store else {
                return;
            };
            let store = store.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = store.record_print(&record) {
                warn!(error = %e, "could not record print");
            }
            if let Err(e) = store.save_state(&self.device.persisted()) {
                warn!(error = %e, "could not persist device state");
            }
        }
    }

    fn enqueue(&mut self, out: Outbound) {
        if self.outbox.is_empty() {
            self.head_due = Some(Instant::now() + out.delay);
        }
        self.outbox.push_back(out);
    }

    fn send_head(&mut self) {
        if let Some(out) = self.outbox.pop_front() {
            self.send(out.target, &out.bytes);
        }
        self.head_due = self.outbox.front().map(|next| Instant::now() + next.delay);
    }

    async fn flush(&mut self) {
        while let Some(due) = self.head_due {
            if due > Instant::now() {
                tokio::time::sleep_until(due).await;
            }
            self.send_head();
        }
    }

    fn send(&self, target: Target, bytes: &[u8]) {
        let result = match target {
            Target::Primary => self.transport.notify(bytes),
            Target::Aux(channel) => self.transport.notify_secondary(channel, bytes),
        };
        if let Err(e) = result {
            warn!(?target, error = %e, "notification failed");
        }
    }
}

fn aux(channel: AuxChannel, bytes: Vec<u8>) -> Outbound {
    Outbound {
        delay: Duration::ZERO,
        target: Target::Aux(channel),
        bytes,
    }
}
