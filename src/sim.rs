//! In-memory tracking client.
//!
//! Reports are queued by the `report_*` methods and delivered to callbacks
//! from [`TrackingClient::update`], on whichever thread calls it. Useful for
//! tests, demos and running the engine side without hardware.

use crate::client::{AnalogCallback, DigitalCallback, InterfaceHandle, TrackingClient};
use crate::types::{ClientStatus, PoseSample};
use crate::{BridgeError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SharedDigital = Arc<dyn Fn(bool) + Send + Sync>;
type SharedAnalog = Arc<dyn Fn(f64) + Send + Sync>;

#[derive(Debug, Clone)]
enum Report {
    Button(String, bool),
    Analog(String, f64),
}

#[derive(Default)]
struct SimState {
    ready: bool,
    next_handle: u64,
    missing: HashSet<String>,
    rejecting: HashSet<String>,
    handles: HashMap<u64, String>,
    digital: HashMap<u64, Vec<SharedDigital>>,
    analog: HashMap<u64, Vec<SharedAnalog>>,
    pending: VecDeque<Report>,
    poses: HashMap<String, PoseSample>,
    released: Vec<String>,
    updates: u64,
}

impl SimState {
    fn handles_for(&self, path: &str) -> Vec<u64> {
        self.handles
            .iter()
            .filter(|(_, p)| p.as_str() == path)
            .map(|(h, _)| *h)
            .collect()
    }
}

/// Tracking client simulated in memory. Every path resolves unless marked
/// missing with [`SimulatedClient::remove_path`].
pub struct SimulatedClient {
    state: Mutex<SimState>,
}

impl SimulatedClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                ready: true,
                next_handle: 1,
                ..SimState::default()
            }),
        }
    }

    /// A client whose context never becomes ready.
    pub fn not_ready() -> Self {
        let client = Self::new();
        client.set_ready(false);
        client
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    /// Make `path` fail to resolve.
    pub fn remove_path(&self, path: &str) {
        self.lock().missing.insert(path.to_string());
    }

    /// Make callback registration on `path` fail.
    pub fn reject_callbacks(&self, path: &str) {
        self.lock().rejecting.insert(path.to_string());
    }

    pub fn report_button(&self, path: &str, pressed: bool) {
        self.lock()
            .pending
            .push_back(Report::Button(path.to_string(), pressed));
    }

    pub fn report_analog(&self, path: &str, value: f64) {
        self.lock()
            .pending
            .push_back(Report::Analog(path.to_string(), value));
    }

    pub fn set_pose(&self, path: &str, pose: PoseSample) {
        self.lock().poses.insert(path.to_string(), pose);
    }

    /// Make pose queries on `path` fail.
    pub fn clear_pose(&self, path: &str) {
        self.lock().poses.remove(path);
    }

    /// Paths released so far, one entry per released handle.
    pub fn released_paths(&self) -> Vec<String> {
        self.lock().released.clone()
    }

    pub fn live_handles(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn update_count(&self) -> u64 {
        self.lock().updates
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingClient for SimulatedClient {
    fn check_status(&self) -> ClientStatus {
        if self.lock().ready {
            ClientStatus::Ready
        } else {
            ClientStatus::NotReady
        }
    }

    fn update(&self) -> Result<()> {
        let mut digital: Vec<(SharedDigital, bool)> = Vec::new();
        let mut analog: Vec<(SharedAnalog, f64)> = Vec::new();
        {
            let mut state = self.lock();
            state.updates += 1;
            let pending: Vec<Report> = state.pending.drain(..).collect();
            for report in pending {
                match report {
                    Report::Button(path, pressed) => {
                        for handle in state.handles_for(&path) {
                            for cb in state.digital.get(&handle).into_iter().flatten() {
                                digital.push((cb.clone(), pressed));
                            }
                        }
                    }
                    Report::Analog(path, value) => {
                        for handle in state.handles_for(&path) {
                            for cb in state.analog.get(&handle).into_iter().flatten() {
                                analog.push((cb.clone(), value));
                            }
                        }
                    }
                }
            }
        }

        // Invoked without the lock held, like a real client calling back
        // from its own processing loop.
        for (cb, pressed) in digital {
            cb(pressed);
        }
        for (cb, value) in analog {
            cb(value);
        }
        Ok(())
    }

    fn resolve_interface(&self, path: &str) -> Result<InterfaceHandle> {
        let mut state = self.lock();
        if !state.ready || state.missing.contains(path) {
            return Err(BridgeError::Resolution(path.to_string()));
        }
        let id = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(id, path.to_string());
        Ok(InterfaceHandle(id))
    }

    fn release_interface(&self, handle: InterfaceHandle) -> Result<()> {
        let mut state = self.lock();
        let path = state
            .handles
            .remove(&handle.0)
            .ok_or(BridgeError::InvalidArgument("unknown interface handle"))?;
        state.digital.remove(&handle.0);
        state.analog.remove(&handle.0);
        state.released.push(path);
        Ok(())
    }

    fn register_digital_callback(
        &self,
        handle: InterfaceHandle,
        callback: DigitalCallback,
    ) -> Result<()> {
        let mut state = self.lock();
        let path = state
            .handles
            .get(&handle.0)
            .cloned()
            .ok_or(BridgeError::InvalidArgument("unknown interface handle"))?;
        if state.rejecting.contains(&path) {
            return Err(BridgeError::CallbackRegistration(path));
        }
        state
            .digital
            .entry(handle.0)
            .or_default()
            .push(Arc::from(callback));
        Ok(())
    }

    fn register_analog_callback(
        &self,
        handle: InterfaceHandle,
        callback: AnalogCallback,
    ) -> Result<()> {
        let mut state = self.lock();
        let path = state
            .handles
            .get(&handle.0)
            .cloned()
            .ok_or(BridgeError::InvalidArgument("unknown interface handle"))?;
        if state.rejecting.contains(&path) {
            return Err(BridgeError::CallbackRegistration(path));
        }
        state
            .analog
            .entry(handle.0)
            .or_default()
            .push(Arc::from(callback));
        Ok(())
    }

    fn pose(&self, handle: InterfaceHandle) -> Result<PoseSample> {
        let state = self.lock();
        let path = state
            .handles
            .get(&handle.0)
            .ok_or(BridgeError::InvalidArgument("unknown interface handle"))?;
        state
            .poses
            .get(path)
            .copied()
            .ok_or_else(|| BridgeError::QueryFailure(path.clone()))
    }
}
