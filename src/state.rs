use std::sync::Arc;

use crate::proto::{DRIVE_CMD, DirMask, FrameSink, encode};

pub const DEFAULT_SPEED: u8 = 255;

/// Tracks the current direction mask and speed, and turns every change into
/// exactly one frame on the sink. There is deliberately no de-duplication:
/// retransmitting an unchanged mask is how speed-only updates re-arm the
/// vehicle.
pub struct DriveState {
    mask: DirMask,
    speed: u8,
    sink: Arc<dyn FrameSink>,
}

impl DriveState {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            mask: DirMask::STOP,
            speed: DEFAULT_SPEED,
            sink,
        }
    }

    pub fn mask(&self) -> DirMask {
        self.mask
    }

    /// Press edge: set one direction bit. Idempotent on the mask, but still
    /// transmits.
    pub fn set_bit(&mut self, bit: DirMask) {
        let mask = self.mask.with(bit);
        self.send_direction(mask, None);
    }

    /// Release edge: clear one direction bit. Idempotent on the mask, but
    /// still transmits.
    pub fn clear_bit(&mut self, bit: DirMask) {
        let mask = self.mask.without(bit);
        self.send_direction(mask, None);
    }

    /// Replace the stored speed and send the given mask at the new speed.
    /// This is the only operation that changes the persisted speed.
    pub fn set_speed(&mut self, mask: DirMask, speed: u8) {
        self.speed = speed;
        self.send_direction(mask, Some(speed));
    }

    /// Transmit a drive frame for `mask`. With `speed: None` the stored
    /// speed is used; an explicit speed applies to this frame only and does
    /// not persist.
    pub fn send_direction(&mut self, mask: DirMask, speed: Option<u8>) {
        self.mask = mask;
        let speed = speed.unwrap_or(self.speed);
        self.sink.send_frame(encode(DRIVE_CMD, mask.0, speed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::testing::Recorder;

    fn rig() -> (Arc<Recorder>, DriveState) {
        let rec = Arc::new(Recorder::default());
        let state = DriveState::new(rec.clone());
        (rec, state)
    }

    #[test]
    fn starts_stopped_at_full_speed() {
        let (rec, mut state) = rig();
        assert_eq!(state.mask(), DirMask::STOP);
        assert!(rec.frames().is_empty());
        state.send_direction(DirMask::STOP, None);
        assert_eq!(rec.frames(), vec![[10, 0, 255, 9]]);
    }

    #[test]
    fn set_bit_is_idempotent_but_still_sends() {
        let (rec, mut state) = rig();
        state.set_bit(DirMask::FORWARD);
        state.set_bit(DirMask::FORWARD);
        assert_eq!(state.mask(), DirMask::FORWARD);
        // both presses hit the wire, same payload
        assert_eq!(rec.frames(), vec![[10, 1, 255, 10], [10, 1, 255, 10]]);
    }

    #[test]
    fn clear_bit_drops_only_that_bit() {
        let (rec, mut state) = rig();
        state.set_bit(DirMask::FORWARD);
        state.set_bit(DirMask::RIGHT);
        state.clear_bit(DirMask::FORWARD);
        assert_eq!(state.mask(), DirMask::RIGHT);
        assert_eq!(rec.frames().last(), Some(&[10, 8, 255, 17]));
    }

    #[test]
    fn set_speed_persists_across_later_sends() {
        let (rec, mut state) = rig();
        state.set_speed(DirMask::STOP, 128);
        state.set_bit(DirMask::LEFT);
        assert_eq!(rec.frames(), vec![[10, 0, 128, 138], [10, 4, 128, 142]]);
    }

    #[test]
    fn explicit_speed_does_not_persist() {
        let (rec, mut state) = rig();
        state.send_direction(DirMask::FORWARD, Some(40));
        state.set_bit(DirMask::LEFT);
        // the explicit 40 applied to one frame; the stored 255 came back
        assert_eq!(rec.frames(), vec![[10, 1, 40, 51], [10, 5, 255, 14]]);
    }
}
