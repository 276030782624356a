//! Background pumping of the tracking client.

use crate::client::TrackingClient;
use crate::{BridgeError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Background thread that pumps the tracking client.
///
/// Calls `update()` at a fixed interval so report callbacks run off the game
/// thread. While a pump runs it is the only caller of `update()`: input
/// devices must be told to stop pumping from their tick.
pub struct ClientPump {
    stop: Option<Sender<()>>,
    active: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ClientPump {
    pub fn start(client: Arc<dyn TrackingClient>, interval: Duration) -> Result<ClientPump> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = active.clone();

        let thread = std::thread::Builder::new()
            .name("hmd-client-pump".into())
            .spawn(move || {
                pump_loop(client, interval, stop_rx);
                active_clone.store(false, Ordering::Release);
            })
            .map_err(|e| BridgeError::Pump(format!("Failed to spawn pump thread: {}", e)))?;

        Ok(ClientPump {
            stop: Some(stop_tx),
            active,
            thread: Some(thread),
        })
    }

    /// Check if the pump thread is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop the pump and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the loop immediately.
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ClientPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn pump_loop(client: Arc<dyn TrackingClient>, interval: Duration, stop: Receiver<()>) {
    log::info!("Client pump started ({:?} interval)", interval);
    let mut ready = true;

    loop {
        if client.is_ready() {
            if !ready {
                log::info!("Tracking client ready again");
                ready = true;
            }
            if let Err(e) = client.update() {
                log::warn!("Client update failed: {}", e);
            }
        } else if ready {
            log::warn!("Tracking client not ready, pausing updates");
            ready = false;
        }

        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::info!("Client pump stopped");
}
