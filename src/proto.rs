use std::fmt;

/// Command id for drive requests. The firmware's command table reserves 10
/// for "drive"; it is the only command this controller speaks.
pub const DRIVE_CMD: u8 = 10;

/// Bitmask of active movement directions (keyState on the wire).
///
/// The wire protocol does not forbid FORWARD|BACKWARD; such masks are passed
/// through unchanged and left to the firmware to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirMask(pub u8);

impl DirMask {
    pub const STOP: DirMask = DirMask(0);
    pub const FORWARD: DirMask = DirMask(1);
    pub const BACKWARD: DirMask = DirMask(2);
    pub const LEFT: DirMask = DirMask(4);
    pub const RIGHT: DirMask = DirMask(8);

    pub fn contains(self, bit: DirMask) -> bool {
        self.0 & bit.0 != 0
    }

    pub fn with(self, bit: DirMask) -> DirMask {
        DirMask(self.0 | bit.0)
    }

    pub fn without(self, bit: DirMask) -> DirMask {
        DirMask(self.0 & !bit.0)
    }

    pub fn is_stop(self) -> bool {
        self.0 == 0
    }

    /// Two-letter mnemonic table used by sequence scripts. Case-insensitive.
    /// Returns None for mnemonics outside the table; the caller decides
    /// whether that is a stop or an error.
    pub fn from_mnemonic(s: &str) -> Option<DirMask> {
        let mask = match s.to_ascii_uppercase().as_str() {
            "FF" => Self::FORWARD,
            "FR" => Self::FORWARD.with(Self::RIGHT),
            "FL" => Self::FORWARD.with(Self::LEFT),
            "BB" => Self::BACKWARD,
            "BL" => Self::BACKWARD.with(Self::LEFT),
            "BR" => Self::BACKWARD.with(Self::RIGHT),
            "LL" => Self::LEFT,
            "RR" => Self::RIGHT,
            "SS" => Self::STOP,
            _ => return None,
        };
        Some(mask)
    }
}

impl fmt::Display for DirMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        if self.is_stop() {
            return f.write_str("stop");
        }
        for (bit, c) in [
            (Self::FORWARD, 'F'),
            (Self::BACKWARD, 'B'),
            (Self::LEFT, 'L'),
            (Self::RIGHT, 'R'),
        ] {
            if self.contains(bit) {
                f.write_char(c)?;
            }
        }
        Ok(())
    }
}

/// Build the 4-byte command frame: [id, data1, data2, checksum].
/// The checksum is a byte-width wrapping sum, matching the firmware.
pub fn encode(command_id: u8, data1: u8, data2: u8) -> [u8; 4] {
    let sum = command_id.wrapping_add(data1).wrapping_add(data2);
    [command_id, data1, data2, sum]
}

/// Seam between command producers (interactive path, sequence engine) and
/// the serial transport. Delivery is at-most-effort: implementations never
/// report write failures to the caller.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: [u8; 4]);
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::FrameSink;

    /// Records frames instead of writing them to a serial port.
    #[derive(Default)]
    pub struct Recorder(Mutex<Vec<[u8; 4]>>);

    impl Recorder {
        pub fn frames(&self) -> Vec<[u8; 4]> {
            self.0.lock().unwrap().clone()
        }
    }

    impl FrameSink for Recorder {
        fn send_frame(&self, frame: [u8; 4]) {
            self.0.lock().unwrap().push(frame);
        }
    }
}
