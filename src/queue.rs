//! Per-binding report queues and the callback demux.
//!
//! Each binding owns one [`BindingSlot`]. The tracking client's callback is
//! the single producer for a slot and the game thread's dispatch is the
//! single consumer. Queues are crossbeam channels, so push and drain never
//! block each other.

use crate::bindings::ControlKind;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Unbounded FIFO of raw samples.
pub(crate) struct SampleQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> SampleQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, value: T) {
        // The receiver lives in the same struct, so send cannot disconnect.
        let _ = self.sender.send(value);
    }

    /// Take every sample queued at the time of the call, oldest first.
    ///
    /// Samples pushed while draining are left for the next drain so a busy
    /// producer cannot keep the consumer looping.
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        let queued = self.receiver.len();
        self.receiver.try_iter().take(queued)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn clear(&self) {
        while self.receiver.try_recv().is_ok() {}
    }
}

/// Shared state between one binding's callback and the dispatcher.
pub struct BindingSlot {
    kind: ControlKind,
    last_digital_state: AtomicBool,
    digital: SampleQueue<bool>,
    analog: SampleQueue<f64>,
    open: RwLock<bool>,
}

impl BindingSlot {
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            last_digital_state: AtomicBool::new(false),
            digital: SampleQueue::new(),
            analog: SampleQueue::new(),
            open: RwLock::new(true),
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    /// Digital callback body: every transition is queued.
    pub fn on_digital(&self, pressed: bool) {
        let open = self.open.read().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            return;
        }
        self.digital.push(pressed);
    }

    /// Analog callback body.
    ///
    /// Analog bindings queue every sample. Threshold bindings are demoted to
    /// digital and only queue when the thresholded state changes.
    pub fn on_analog(&self, value: f64) {
        let open = self.open.read().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            return;
        }
        match self.kind {
            ControlKind::Threshold { comparison, value: threshold } => {
                let state = comparison.holds(value, threshold);
                let previous = self.last_digital_state.swap(state, Ordering::AcqRel);
                if state != previous {
                    self.digital.push(state);
                }
            }
            ControlKind::Analog => self.analog.push(value),
            ControlKind::Digital => {
                log::trace!("analog sample on a digital binding ignored");
            }
        }
    }

    pub fn last_digital_state(&self) -> bool {
        self.last_digital_state.load(Ordering::Acquire)
    }

    pub(crate) fn drain_digital(&self) -> impl Iterator<Item = bool> + '_ {
        self.digital.drain()
    }

    pub(crate) fn drain_analog(&self) -> impl Iterator<Item = f64> + '_ {
        self.analog.drain()
    }

    /// Number of samples waiting in the (digital, analog) queues.
    pub fn pending(&self) -> (usize, usize) {
        (self.digital.len(), self.analog.len())
    }

    /// Stop accepting samples and discard queued ones.
    ///
    /// Blocks until any callback currently pushing into this slot returns;
    /// afterwards no callback can push again.
    pub fn close(&self) {
        let mut open = self.open.write().unwrap_or_else(PoisonError::into_inner);
        *open = false;
        drop(open);
        self.digital.clear();
        self.analog.clear();
    }

    pub fn is_open(&self) -> bool {
        *self.open.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Comparison;
    use std::sync::Arc;

    fn threshold(comparison: Comparison, value: f64) -> BindingSlot {
        BindingSlot::new(ControlKind::Threshold { comparison, value })
    }

    #[test]
    fn threshold_greater_than_is_edge_triggered() {
        let t = 0.25;
        let eps = 0.01;
        let slot = threshold(Comparison::GreaterThan, t);
        for sample in [t - eps, t + eps, t + 2.0 * eps, t - eps] {
            slot.on_analog(sample);
        }
        let events: Vec<bool> = slot.drain_digital().collect();
        assert_eq!(events, vec![true, false]);
        assert_eq!(slot.pending(), (0, 0));
    }

    #[test]
    fn threshold_less_than_fires_below() {
        let slot = threshold(Comparison::LessThan, -0.25);
        for sample in [0.0, -0.3, -0.9, -0.1, -0.5] {
            slot.on_analog(sample);
        }
        let events: Vec<bool> = slot.drain_digital().collect();
        assert_eq!(events, vec![true, false, true]);
        assert!(slot.last_digital_state());
    }

    #[test]
    fn threshold_equal_to_value_is_not_past_it() {
        let slot = threshold(Comparison::GreaterThan, 0.75);
        slot.on_analog(0.75);
        assert_eq!(slot.drain_digital().count(), 0);
    }

    #[test]
    fn analog_samples_are_never_coalesced() {
        let slot = BindingSlot::new(ControlKind::Analog);
        let samples = [0.1, 0.1, 0.5, -0.2, 0.1];
        for s in samples {
            slot.on_analog(s);
        }
        let drained: Vec<f64> = slot.drain_analog().collect();
        assert_eq!(drained, samples);
        assert_eq!(slot.drain_digital().count(), 0);
    }

    #[test]
    fn digital_transitions_queue_unconditionally() {
        let slot = BindingSlot::new(ControlKind::Digital);
        for s in [true, true, false, false] {
            slot.on_digital(s);
        }
        let drained: Vec<bool> = slot.drain_digital().collect();
        assert_eq!(drained, vec![true, true, false, false]);
    }

    #[test]
    fn closed_slot_rejects_samples() {
        let slot = BindingSlot::new(ControlKind::Digital);
        slot.on_digital(true);
        slot.close();
        slot.on_digital(false);
        assert!(!slot.is_open());
        assert_eq!(slot.pending(), (0, 0));
    }

    #[test]
    fn drain_preserves_order_across_threads() {
        let slot = Arc::new(BindingSlot::new(ControlKind::Analog));
        let producer = {
            let slot = slot.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    slot.on_analog(i as f64);
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            seen.extend(slot.drain_analog());
            std::thread::yield_now();
        }
        producer.join().unwrap();

        let expected: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        assert_eq!(seen, expected);
    }
}
