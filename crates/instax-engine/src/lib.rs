// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Instax Engine: frame codec, write reassembly, model profiles, command
// dispatch and print transfers for the emulated printer.  Transports plug in
// through `engine::Transport` and the declarative GATT description in `gatt`.

pub mod device_state;
pub mod dispatcher;
pub mod engine;
pub mod frame;
pub mod gatt;
pub mod print_job;
pub mod profile;
pub mod protocol;
pub mod reassembler;
pub mod state_store;
pub mod storage;

pub use device_state::{AdvertisingRequest, DeviceHandle, DeviceState, PersistedState};
pub use dispatcher::{Dispatch, Dispatcher, Outbound, Target, Timings};
pub use engine::{Engine, EngineOptions, Transport, TransportEvent, event_channel};
pub use frame::{Direction, Frame};
pub use gatt::{AdvertisingData, AuxChannel};
pub use print_job::{JobState, PrintJob};
pub use profile::{ModelProfile, detect_model, profile};
pub use reassembler::Reassembler;
pub use state_store::StateStore;
pub use storage::{DirectoryStorage, MemoryStorage, PrintStorage};
