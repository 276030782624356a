//! Seam to the tracking client library.
//!
//! The client is a black box that resolves interface paths such as
//! `/controller/left/trigger` into handles, delivers button and analog
//! reports through callbacks and answers pose queries. Callbacks may be
//! invoked on any thread the client chooses, typically from inside
//! [`TrackingClient::update`].

use crate::types::{ClientStatus, PoseSample};
use crate::Result;

/// Opaque handle to a resolved client interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceHandle(pub u64);

/// Receives `true` on press and `false` on release.
pub type DigitalCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Receives each raw analog sample.
pub type AnalogCallback = Box<dyn Fn(f64) + Send + Sync>;

pub trait TrackingClient: Send + Sync {
    fn check_status(&self) -> ClientStatus;

    /// Pump client-side processing. Pending reports are delivered to the
    /// registered callbacks from here.
    fn update(&self) -> Result<()>;

    fn resolve_interface(&self, path: &str) -> Result<InterfaceHandle>;

    /// Free a handle. Once this returns the client must not invoke any
    /// callback registered on it.
    fn release_interface(&self, handle: InterfaceHandle) -> Result<()>;

    fn register_digital_callback(
        &self,
        handle: InterfaceHandle,
        callback: DigitalCallback,
    ) -> Result<()>;

    fn register_analog_callback(
        &self,
        handle: InterfaceHandle,
        callback: AnalogCallback,
    ) -> Result<()>;

    /// Latest pose on a tracker interface.
    fn pose(&self, handle: InterfaceHandle) -> Result<PoseSample>;

    fn is_ready(&self) -> bool {
        self.check_status() == ClientStatus::Ready
    }
}
