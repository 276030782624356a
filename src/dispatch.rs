//! Turns queued samples into engine input notifications.

use crate::bindings::ControlBinding;
use crate::keys::ControllerKey;
use crossbeam_channel::Sender;

/// Controller index attached to every notification.
///
/// All bindings report as player 0 whatever physical controller the path
/// belongs to; multi-player routing is not implemented.
pub const CONTROLLER_ID: i32 = 0;

/// Receiver of controller notifications on the game thread.
pub trait MessageHandler: Send {
    fn on_controller_button_pressed(&mut self, key: ControllerKey, controller_id: i32, is_repeat: bool);
    fn on_controller_button_released(&mut self, key: ControllerKey, controller_id: i32, is_repeat: bool);
    fn on_controller_analog(&mut self, key: ControllerKey, controller_id: i32, value: f32);
}

/// One notification as a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerEvent {
    Pressed { key: ControllerKey, controller_id: i32 },
    Released { key: ControllerKey, controller_id: i32 },
    Analog { key: ControllerKey, controller_id: i32, value: f32 },
}

impl ControllerEvent {
    pub fn key(&self) -> ControllerKey {
        match *self {
            ControllerEvent::Pressed { key, .. }
            | ControllerEvent::Released { key, .. }
            | ControllerEvent::Analog { key, .. } => key,
        }
    }
}

impl MessageHandler for Vec<ControllerEvent> {
    fn on_controller_button_pressed(&mut self, key: ControllerKey, controller_id: i32, _is_repeat: bool) {
        self.push(ControllerEvent::Pressed { key, controller_id });
    }

    fn on_controller_button_released(&mut self, key: ControllerKey, controller_id: i32, _is_repeat: bool) {
        self.push(ControllerEvent::Released { key, controller_id });
    }

    fn on_controller_analog(&mut self, key: ControllerKey, controller_id: i32, value: f32) {
        self.push(ControllerEvent::Analog {
            key,
            controller_id,
            value,
        });
    }
}

/// Forward notifications to another thread. Events are dropped once the
/// receiving side is gone.
impl MessageHandler for Sender<ControllerEvent> {
    fn on_controller_button_pressed(&mut self, key: ControllerKey, controller_id: i32, _is_repeat: bool) {
        let _ = self.send(ControllerEvent::Pressed { key, controller_id });
    }

    fn on_controller_button_released(&mut self, key: ControllerKey, controller_id: i32, _is_repeat: bool) {
        let _ = self.send(ControllerEvent::Released { key, controller_id });
    }

    fn on_controller_analog(&mut self, key: ControllerKey, controller_id: i32, value: f32) {
        let _ = self.send(ControllerEvent::Analog {
            key,
            controller_id,
            value,
        });
    }
}

/// Drain every valid binding into `handler`.
///
/// Bindings are visited in table order. For each, all queued digital
/// transitions are sent before its queued analog values. Returns the number
/// of notifications sent.
pub fn dispatch(bindings: &[ControlBinding], handler: &mut dyn MessageHandler) -> usize {
    let mut sent = 0;
    for binding in bindings.iter().filter(|b| b.is_valid()) {
        let key = binding.key();
        let slot = binding.slot();
        for pressed in slot.drain_digital() {
            if pressed {
                handler.on_controller_button_pressed(key, CONTROLLER_ID, false);
            } else {
                handler.on_controller_button_released(key, CONTROLLER_ID, false);
            }
            sent += 1;
        }
        for value in slot.drain_analog() {
            handler.on_controller_analog(key, CONTROLLER_ID, value as f32);
            sent += 1;
        }
    }
    sent
}
