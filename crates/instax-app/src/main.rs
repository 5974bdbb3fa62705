// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// instax-emu: Instax printer emulator
//
// Entry point. Loads configuration, restores the persisted device, and runs
// the protocol engine behind the development TCP transport until Ctrl-C.

mod bridge;
mod paths;

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use instax_core::config::{CONFIG_FILE_NAME, EmulatorConfig};
use instax_core::error::Result;
use instax_engine::{DeviceHandle, DeviceState, DirectoryStorage, Engine, EngineOptions, StateStore, event_channel};

use bridge::{BridgeTransport, TcpBridge};

const STATE_DB_NAME: &str = "state.db";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "instax-emu failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_dir = paths::default_data_dir();
    std::fs::create_dir_all(&config_dir)?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let loaded = EmulatorConfig::load(&config_path);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!("instax-emu starting");
    match loaded {
        Ok(_) => config.save(&config_path)?,
        Err(e) => warn!(error = %e, path = %config_path.display(), "bad configuration, using defaults"),
    }

    let data_dir = config.data_dir.clone().unwrap_or(config_dir);
    std::fs::create_dir_all(&data_dir)?;
    let store = Arc::new(Mutex::new(StateStore::open(data_dir.join(STATE_DB_NAME))?));
    let device = restore_device(&store, &config)?;

    let prints_dir = paths::subdir(&data_dir, &config.prints_dir_name)?;
    let storage = DirectoryStorage::new(&prints_dir)?;
    info!(dir = %prints_dir.display(), "prints will be stored here");

    tokio::spawn(bridge::log_advertising(device.subscribe_advertising()));

    let transport = Arc::new(BridgeTransport::new());
    let (events_tx, events_rx) = event_channel();
    let mut engine = Engine::new(
        device.clone(),
        Box::new(storage),
        Arc::clone(&transport),
        EngineOptions::from(&config),
    )
    .with_state_store(Arc::clone(&store));
    let engine_task = tokio::spawn(async move { engine.run(events_rx).await });

    let bridge = TcpBridge::bind(&config.listen_addr, transport, events_tx).await?;
    let shutdown = bridge.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!(error = %e, "cannot listen for Ctrl-C, shutting down"),
        }
        shutdown.notify_one();
    });

    // Dropping the bridge closes the event channel, which ends the engine.
    bridge.run().await;
    if let Err(e) = engine_task.await {
        error!(error = %e, "engine task failed");
    }

    persist(&store, &device)?;
    info!("instax-emu stopped");
    Ok(())
}

/// Build the device from the saved snapshot, or the configured model's
/// defaults on first start.
fn restore_device(store: &Arc<Mutex<StateStore>>, config: &EmulatorConfig) -> Result<DeviceHandle> {
    let device = DeviceHandle::new(DeviceState::defaults_for(config.model));
    let saved = store.lock().unwrap_or_else(PoisonError::into_inner).load_state()?;
    match saved {
        Some(saved) => {
            info!(model = %saved.model, "restoring saved device state");
            device.restore(&saved);
        }
        None => info!(model = %config.model, "no saved state, starting fresh"),
    }
    device.with_state(DeviceState::log_summary);
    persist(store, &device)?;
    Ok(device)
}

fn persist(store: &Arc<Mutex<StateStore>>, device: &DeviceHandle) -> Result<()> {
    store
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .save_state(&device.persisted())
}
