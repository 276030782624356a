//! Control registry: the static binding table and interface resolution.

use crate::client::{InterfaceHandle, TrackingClient};
use crate::keys::ControllerKey;
use crate::queue::BindingSlot;
use crate::{BridgeError, Result};
use std::sync::Arc;

/// Threshold applied to joystick axes for the directional digital keys.
pub const STICK_THRESHOLD: f64 = 0.25;

/// Threshold applied to analog triggers for the trigger click keys.
pub const TRIGGER_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    /// Whether `sample` is past `threshold` in this direction.
    pub fn holds(self, sample: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => sample > threshold,
            Comparison::LessThan => sample < threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlKind {
    /// Button reports, queued as press/release.
    Digital,
    /// Axis reports, queued as raw values.
    Analog,
    /// Axis reports demoted to press/release when crossing `value`.
    Threshold { comparison: Comparison, value: f64 },
}

/// One entry of a static binding table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindingSpec {
    pub kind: ControlKind,
    pub key: ControllerKey,
    pub path: &'static str,
}

impl BindingSpec {
    pub const fn digital(key: ControllerKey, path: &'static str) -> Self {
        Self {
            kind: ControlKind::Digital,
            key,
            path,
        }
    }

    pub const fn analog(key: ControllerKey, path: &'static str) -> Self {
        Self {
            kind: ControlKind::Analog,
            key,
            path,
        }
    }

    pub const fn threshold(
        comparison: Comparison,
        value: f64,
        key: ControllerKey,
        path: &'static str,
    ) -> Self {
        Self {
            kind: ControlKind::Threshold { comparison, value },
            key,
            path,
        }
    }

    const fn above(value: f64, key: ControllerKey, path: &'static str) -> Self {
        Self::threshold(Comparison::GreaterThan, value, key, path)
    }

    const fn below(value: f64, key: ControllerKey, path: &'static str) -> Self {
        Self::threshold(Comparison::LessThan, value, key, path)
    }
}

use ControllerKey as K;

/// Controller layout exposed to the engine. Order is dispatch order.
pub const DEFAULT_BINDINGS: &[BindingSpec] = &[
    // left hand
    BindingSpec::digital(K::SpecialLeft, "/controller/left/middle"),
    BindingSpec::digital(K::LeftShoulder, "/controller/left/bumper"),
    BindingSpec::digital(K::LeftThumbstick, "/controller/left/joystick/button"),
    BindingSpec::digital(K::LeftFaceButton1, "/controller/left/1"),
    BindingSpec::digital(K::LeftFaceButton2, "/controller/left/2"),
    BindingSpec::digital(K::LeftFaceButton3, "/controller/left/3"),
    BindingSpec::digital(K::LeftFaceButton4, "/controller/left/4"),
    BindingSpec::analog(K::LeftThumbstickX, "/controller/left/joystick/x"),
    BindingSpec::above(STICK_THRESHOLD, K::LeftThumbstickRight, "/controller/left/joystick/x"),
    BindingSpec::below(-STICK_THRESHOLD, K::LeftThumbstickLeft, "/controller/left/joystick/x"),
    BindingSpec::analog(K::LeftThumbstickY, "/controller/left/joystick/y"),
    BindingSpec::above(STICK_THRESHOLD, K::LeftThumbstickUp, "/controller/left/joystick/y"),
    BindingSpec::below(-STICK_THRESHOLD, K::LeftThumbstickDown, "/controller/left/joystick/y"),
    BindingSpec::analog(K::LeftTriggerAxis, "/controller/left/trigger"),
    BindingSpec::above(TRIGGER_THRESHOLD, K::LeftTrigger, "/controller/left/trigger"),
    // right hand
    BindingSpec::digital(K::SpecialRight, "/controller/right/middle"),
    BindingSpec::digital(K::RightShoulder, "/controller/right/bumper"),
    BindingSpec::digital(K::RightThumbstick, "/controller/right/joystick/button"),
    BindingSpec::digital(K::RightFaceButton1, "/controller/right/1"),
    BindingSpec::digital(K::RightFaceButton2, "/controller/right/2"),
    BindingSpec::digital(K::RightFaceButton3, "/controller/right/3"),
    BindingSpec::digital(K::RightFaceButton4, "/controller/right/4"),
    BindingSpec::analog(K::RightThumbstickX, "/controller/right/joystick/x"),
    BindingSpec::above(STICK_THRESHOLD, K::RightThumbstickRight, "/controller/right/joystick/x"),
    BindingSpec::below(-STICK_THRESHOLD, K::RightThumbstickLeft, "/controller/right/joystick/x"),
    BindingSpec::analog(K::RightThumbstickY, "/controller/right/joystick/y"),
    BindingSpec::above(STICK_THRESHOLD, K::RightThumbstickUp, "/controller/right/joystick/y"),
    BindingSpec::below(-STICK_THRESHOLD, K::RightThumbstickDown, "/controller/right/joystick/y"),
    BindingSpec::analog(K::RightTriggerAxis, "/controller/right/trigger"),
    BindingSpec::above(TRIGGER_THRESHOLD, K::RightTrigger, "/controller/right/trigger"),
    // gamepad-style aliases
    BindingSpec::digital(K::GamepadRightShoulder, "/controller/right/bumper"),
    BindingSpec::digital(K::GamepadRightThumb, "/controller/right/joystick/button"),
    BindingSpec::digital(K::GamepadFaceButtonBottom, "/controller/right/1"),
    BindingSpec::digital(K::GamepadFaceButtonRight, "/controller/right/2"),
    BindingSpec::digital(K::GamepadFaceButtonLeft, "/controller/right/3"),
    BindingSpec::digital(K::GamepadFaceButtonTop, "/controller/right/4"),
    BindingSpec::digital(K::GamepadLeftShoulder, "/controller/left/bumper"),
    BindingSpec::digital(K::GamepadLeftThumb, "/controller/left/joystick/button"),
    BindingSpec::digital(K::GamepadDPadDown, "/controller/left/1"),
    BindingSpec::digital(K::GamepadDPadRight, "/controller/left/2"),
    BindingSpec::digital(K::GamepadDPadLeft, "/controller/left/3"),
    BindingSpec::digital(K::GamepadDPadUp, "/controller/left/4"),
    BindingSpec::analog(K::GamepadLeftX, "/controller/left/joystick/x"),
    BindingSpec::above(STICK_THRESHOLD, K::GamepadLeftStickRight, "/controller/left/joystick/x"),
    BindingSpec::below(-STICK_THRESHOLD, K::GamepadLeftStickLeft, "/controller/left/joystick/x"),
    BindingSpec::analog(K::GamepadLeftY, "/controller/left/joystick/y"),
    BindingSpec::above(STICK_THRESHOLD, K::GamepadLeftStickUp, "/controller/left/joystick/y"),
    BindingSpec::below(-STICK_THRESHOLD, K::GamepadLeftStickDown, "/controller/left/joystick/y"),
    BindingSpec::analog(K::GamepadRightX, "/controller/right/joystick/x"),
    BindingSpec::above(STICK_THRESHOLD, K::GamepadRightStickRight, "/controller/right/joystick/x"),
    BindingSpec::below(-STICK_THRESHOLD, K::GamepadRightStickLeft, "/controller/right/joystick/x"),
    BindingSpec::analog(K::GamepadRightY, "/controller/right/joystick/y"),
    BindingSpec::above(STICK_THRESHOLD, K::GamepadRightStickUp, "/controller/right/joystick/y"),
    BindingSpec::below(-STICK_THRESHOLD, K::GamepadRightStickDown, "/controller/right/joystick/y"),
    BindingSpec::analog(K::GamepadLeftTriggerAxis, "/controller/left/trigger"),
    BindingSpec::analog(K::GamepadRightTriggerAxis, "/controller/right/trigger"),
    BindingSpec::above(TRIGGER_THRESHOLD, K::GamepadLeftTrigger, "/controller/left/trigger"),
    BindingSpec::above(TRIGGER_THRESHOLD, K::GamepadRightTrigger, "/controller/right/trigger"),
];

/// A binding from the table plus its runtime state.
pub struct ControlBinding {
    spec: BindingSpec,
    valid: bool,
    slot: Arc<BindingSlot>,
}

impl ControlBinding {
    fn new(spec: BindingSpec) -> Self {
        Self {
            spec,
            valid: true,
            slot: Arc::new(BindingSlot::new(spec.kind)),
        }
    }

    pub fn key(&self) -> ControllerKey {
        self.spec.key
    }

    pub fn path(&self) -> &'static str {
        self.spec.path
    }

    pub fn kind(&self) -> ControlKind {
        self.spec.kind
    }

    /// False once resolution or callback registration failed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn slot(&self) -> &BindingSlot {
        &self.slot
    }

    fn register(&self, client: &dyn TrackingClient, handle: InterfaceHandle) -> Result<()> {
        let slot = self.slot.clone();
        match self.spec.kind {
            ControlKind::Digital => client
                .register_digital_callback(handle, Box::new(move |pressed| slot.on_digital(pressed))),
            ControlKind::Analog | ControlKind::Threshold { .. } => client
                .register_analog_callback(handle, Box::new(move |value| slot.on_analog(value))),
        }
    }
}

/// Bindings resolved against a live client, with one handle per distinct path.
pub struct ControlRegistry {
    client: Arc<dyn TrackingClient>,
    bindings: Vec<ControlBinding>,
    interfaces: Vec<(&'static str, InterfaceHandle)>,
}

impl ControlRegistry {
    /// Resolve and register every entry of `table`.
    ///
    /// Fails only when the client context is not ready. A path that does not
    /// resolve, or a callback that cannot be registered, disables that one
    /// binding and setup continues.
    pub fn initialize(
        client: Arc<dyn TrackingClient>,
        table: &[BindingSpec],
    ) -> Result<ControlRegistry> {
        if !client.is_ready() {
            return Err(BridgeError::ContextUnavailable);
        }

        let mut registry = ControlRegistry {
            client,
            bindings: Vec::with_capacity(table.len()),
            interfaces: Vec::new(),
        };

        for spec in table {
            let mut binding = ControlBinding::new(*spec);
            match registry.interface(spec.path) {
                Ok(handle) => {
                    if let Err(e) = binding.register(registry.client.as_ref(), handle) {
                        log::warn!("Disabling {} ({}): {}", spec.key, spec.path, e);
                        binding.valid = false;
                    }
                }
                Err(e) => {
                    log::warn!("Disabling {} ({}): {}", spec.key, spec.path, e);
                    binding.valid = false;
                }
            }
            registry.bindings.push(binding);
        }

        log::info!(
            "Control registry ready: {}/{} bindings on {} interfaces",
            registry.valid_count(),
            registry.bindings.len(),
            registry.interfaces.len()
        );

        Ok(registry)
    }

    /// Handle for `path`, resolving it on first use.
    fn interface(&mut self, path: &'static str) -> Result<InterfaceHandle> {
        if let Some((_, handle)) = self.interfaces.iter().find(|(p, _)| *p == path) {
            return Ok(*handle);
        }
        let handle = self.client.resolve_interface(path)?;
        self.interfaces.push((path, handle));
        Ok(handle)
    }

    pub fn bindings(&self) -> &[ControlBinding] {
        &self.bindings
    }

    pub fn valid_count(&self) -> usize {
        self.bindings.iter().filter(|b| b.valid).count()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Close every slot, then free each resolved interface once.
    pub fn release(&mut self) {
        for binding in &self.bindings {
            binding.slot.close();
        }
        for (path, handle) in self.interfaces.drain(..) {
            if let Err(e) = self.client.release_interface(handle) {
                log::warn!("Failed to release {}: {}", path, e);
            }
        }
    }
}

impl Drop for ControlRegistry {
    fn drop(&mut self) {
        self.release();
    }
}
