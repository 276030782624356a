//! Motion-controller input device.

use crate::bindings::{BindingSpec, ControlRegistry, DEFAULT_BINDINGS};
use crate::client::{InterfaceHandle, TrackingClient};
use crate::config::BridgeConfig;
use crate::coords;
use crate::dispatch::{self, MessageHandler, CONTROLLER_ID};
use crate::provider::InputProvider;
use crate::types::{Hand, Pose, TrackingStatus, WorldScale};
use crate::{BridgeError, Result};
use std::sync::Arc;

/// Buttons, axes and hand poses of the motion controllers.
///
/// Built against a client that is not ready, the device is inert: every
/// call succeeds and does nothing.
pub struct InputDevice {
    client: Arc<dyn TrackingClient>,
    registry: Option<ControlRegistry>,
    left_hand: Option<InterfaceHandle>,
    right_hand: Option<InterfaceHandle>,
    handler: Box<dyn MessageHandler>,
    scale: Arc<WorldScale>,
    /// A background pump owns `update()`.
    pumped: bool,
}

impl InputDevice {
    /// Set up the default controller layout.
    pub fn new(
        client: Arc<dyn TrackingClient>,
        handler: Box<dyn MessageHandler>,
        scale: Arc<WorldScale>,
        config: &BridgeConfig,
    ) -> InputDevice {
        Self::with_bindings(client, handler, scale, config, DEFAULT_BINDINGS)
    }

    pub fn with_bindings(
        client: Arc<dyn TrackingClient>,
        handler: Box<dyn MessageHandler>,
        scale: Arc<WorldScale>,
        config: &BridgeConfig,
        table: &[BindingSpec],
    ) -> InputDevice {
        let registry = match ControlRegistry::initialize(client.clone(), table) {
            Ok(registry) => Some(registry),
            Err(e) => {
                log::warn!("Controller input disabled: {}", e);
                None
            }
        };

        let (left_hand, right_hand) = if registry.is_some() {
            (
                resolve_hand(client.as_ref(), &config.left_hand_path),
                resolve_hand(client.as_ref(), &config.right_hand_path),
            )
        } else {
            (None, None)
        };

        InputDevice {
            client,
            registry,
            left_hand,
            right_hand,
            handler,
            scale,
            pumped: false,
        }
    }

    /// Whether the client context was available at construction and the
    /// device has not been shut down.
    pub fn is_active(&self) -> bool {
        self.registry.is_some()
    }

    pub fn is_pumped(&self) -> bool {
        self.pumped
    }

    pub fn registry(&self) -> Option<&ControlRegistry> {
        self.registry.as_ref()
    }

    /// Pose of one hand, converted and scaled but not rebased.
    ///
    /// Only controller index 0 is tracked.
    pub fn controller_pose(&self, controller_index: i32, hand: Hand) -> Result<Pose> {
        if controller_index != CONTROLLER_ID || !self.is_active() {
            return Err(BridgeError::Untracked);
        }
        let handle = match hand {
            Hand::Left => self.left_hand,
            Hand::Right => self.right_hand,
        };
        coords::acquire_pose(self.client.as_ref(), handle, self.scale.get())
    }

    /// Stop callbacks, then release every interface.
    ///
    /// Slots are closed before any handle is freed, so a callback racing with
    /// shutdown either finishes first or finds its slot closed. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut registry) = self.registry.take() {
            registry.release();
            log::info!("Controller input shut down");
        }
        for hand in [self.left_hand.take(), self.right_hand.take()].into_iter().flatten() {
            if let Err(e) = self.client.release_interface(hand) {
                log::warn!("Failed to release hand interface: {}", e);
            }
        }
    }
}

fn resolve_hand(client: &dyn TrackingClient, path: &str) -> Option<InterfaceHandle> {
    match client.resolve_interface(path) {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("Hand tracking unavailable on {}: {}", path, e);
            None
        }
    }
}

impl Drop for InputDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl InputProvider for InputDevice {
    fn tick(&mut self, _delta_time: f32) {
        if self.pumped || !self.is_active() || !self.client.is_ready() {
            return;
        }
        if let Err(e) = self.client.update() {
            log::debug!("Client update failed: {}", e);
        }
    }

    fn set_pumped(&mut self, pumped: bool) {
        self.pumped = pumped;
    }

    fn send_controller_events(&mut self) -> usize {
        match &self.registry {
            Some(registry) => dispatch::dispatch(registry.bindings(), self.handler.as_mut()),
            None => 0,
        }
    }

    fn set_message_handler(&mut self, handler: Box<dyn MessageHandler>) {
        self.handler = handler;
    }

    fn controller_orientation_and_position(&self, controller_index: i32, hand: Hand) -> Option<Pose> {
        self.controller_pose(controller_index, hand).ok()
    }

    fn controller_tracking_status(&self, controller_index: i32, hand: Hand) -> TrackingStatus {
        let handle = match hand {
            Hand::Left => self.left_hand,
            Hand::Right => self.right_hand,
        };
        if controller_index == CONTROLLER_ID
            && self.is_active()
            && handle.is_some()
            && self.client.is_ready()
        {
            TrackingStatus::Tracked
        } else {
            TrackingStatus::NotTracked
        }
    }
}
