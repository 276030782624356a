//! # hmd-bridge - HMD and motion-controller bridge for a 3D engine
//!
//! Connects a VR tracking client to an engine's view and input systems.
//! Provides:
//! - Controller bindings from interface paths to engine keys, with
//!   thresholded analog axes demoted to buttons
//! - Lock-free per-binding report queues drained on the game thread
//! - Head pose conversion, world scaling and orientation/position calibration
//! - Stereo view setup (view rects, eye offsets, projection)
//! - C FFI for hosting the bridge from C/C++ engines
//!
//! ## Quick Start
//! ```no_run
//! use hmd_bridge::{BridgeConfig, ControllerEvent, Session, SimulatedClient};
//! use std::sync::Arc;
//!
//! let client = Arc::new(SimulatedClient::new());
//! let (tx, rx) = crossbeam_channel::unbounded::<ControllerEvent>();
//! let mut session = Session::connect(client.clone(), Box::new(tx), &BridgeConfig::from_env()).unwrap();
//!
//! client.report_button("/controller/right/1", true);
//! let head = session.begin_frame(1.0 / 90.0);
//! println!("head: {:?}", head.position);
//! for event in rx.try_iter() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod error;
pub mod types;
pub mod keys;
pub mod client;
pub mod sim;
pub mod queue;
pub mod bindings;
pub mod coords;
pub mod dispatch;
pub mod config;
pub mod stereo;
pub mod provider;
pub mod hmd;
pub mod input;
pub mod pump;
pub mod session;
pub mod ffi;

pub use error::BridgeError;
pub use types::*;
pub use keys::ControllerKey;
pub use client::{InterfaceHandle, TrackingClient};
pub use sim::SimulatedClient;
pub use bindings::{BindingSpec, ControlKind, ControlRegistry, DEFAULT_BINDINGS};
pub use dispatch::{ControllerEvent, MessageHandler, CONTROLLER_ID};
pub use config::BridgeConfig;
pub use stereo::{DisplayDescription, StereoPass, ViewRect};
pub use provider::{InputProvider, PoseProvider, StereoConfigProvider};
pub use hmd::Hmd;
pub use input::InputDevice;
pub use pump::ClientPump;
pub use session::Session;

/// Result type alias for hmd-bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
