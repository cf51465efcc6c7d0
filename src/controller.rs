use std::io::Write;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::event::Event;
use crate::port::Transport;
use crate::proto::DirMask;
use crate::sequence::SequenceEngine;
use crate::settings::FileSettings;
use crate::state::DriveState;

/// Business-logic hub: one shared connection, one drive state, at most one
/// sequence run. The drive state sits behind a mutex so the interactive
/// path and a scripted run cannot mutate it at the same time.
pub struct Controller {
    link: Arc<Transport>,
    drive: Arc<Mutex<DriveState>>,
    engine: SequenceEngine,
    settings: FileSettings,
    events: Sender<Event>,
}

impl Controller {
    pub fn new(settings: FileSettings, events: Sender<Event>) -> Self {
        let link = Arc::new(Transport::new());
        let drive = Arc::new(Mutex::new(DriveState::new(link.clone())));
        Self {
            link,
            drive,
            engine: SequenceEngine::new(),
            settings,
            events,
        }
    }

    /// Connect to the stored port name. Any failure becomes a warning and
    /// the controller keeps running disconnected; sends are then no-ops.
    pub fn connect(&self) {
        let name = match self.settings.port_name() {
            Ok(name) => name,
            Err(e) => {
                self.warn(e.to_string());
                return;
            }
        };
        // Inbound bytes are free-form status text from the vehicle; mirror
        // them to stdout as they arrive.
        let result = self.link.open(
            &name,
            Box::new(|chunk| {
                let mut out = std::io::stdout();
                let _ = out.write_all(chunk);
                let _ = out.flush();
            }),
        );
        if let Err(e) = result {
            self.warn(format!("could not connect ({}): {}", name, e));
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    pub fn set_port_name(&self, name: &str) {
        if let Err(e) = self.settings.set_port_name(name) {
            self.warn(e.to_string());
        }
    }

    pub fn press(&self, bit: DirMask) {
        self.drive().set_bit(bit);
    }

    pub fn release(&self, bit: DirMask) {
        self.drive().clear_bit(bit);
    }

    /// Change the stored speed and re-send the current mask at it.
    pub fn set_speed(&self, speed: u8) {
        let mut drive = self.drive();
        let mask = drive.mask();
        drive.set_speed(mask, speed);
    }

    pub fn send_direction(&self, mask: DirMask, speed: Option<u8>) {
        self.drive().send_direction(mask, speed);
    }

    pub fn stop(&self) {
        self.send_direction(DirMask::STOP, None);
    }

    /// Replay `sequence.txt` on a background run. Returns false if the file
    /// is unavailable (with a warning) or a run is already active.
    pub fn play_sequence(&self, strict: bool) -> bool {
        let fields = match self.settings.sequence_fields() {
            Ok(fields) => fields,
            Err(e) => {
                self.warn(format!("could not process sequence file: {}", e));
                return false;
            }
        };
        self.engine
            .start(fields, self.drive.clone(), self.events.clone(), strict)
    }

    pub fn cancel_sequence(&self) {
        self.engine.cancel();
    }

    pub fn wait_sequence(&self) {
        self.engine.wait();
    }

    pub fn sequence_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn disconnect(&self) {
        self.link.close();
    }

    fn drive(&self) -> MutexGuard<'_, DriveState> {
        self.drive.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn warn(&self, msg: String) {
        let _ = self.events.send(Event::Warning(msg));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn connect_without_port_file_warns_and_stays_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let controller = Controller::new(FileSettings::in_dir(dir.path()), tx);
        controller.connect();
        assert!(!controller.is_connected());
        let ev = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(ev, Event::Warning(_)));
    }

    #[test]
    fn play_sequence_without_script_warns() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let controller = Controller::new(FileSettings::in_dir(dir.path()), tx);
        assert!(!controller.play_sequence(false));
        let ev = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(ev, Event::Warning(msg) if msg.contains("sequence file")));
    }

    #[test]
    fn sequence_replays_even_while_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sequence.txt"), "FF,200,10\nSS,0,10\n").unwrap();
        let (tx, rx) = mpsc::channel();
        let controller = Controller::new(FileSettings::in_dir(dir.path()), tx);
        assert!(controller.play_sequence(false));
        controller.wait_sequence();
        assert!(!controller.sequence_running());
        let dirs: Vec<DirMask> = rx
            .try_iter()
            .filter_map(|ev| match ev {
                Event::DirectionChanged(mask) => Some(mask),
                Event::Warning(_) => None,
            })
            .collect();
        assert_eq!(dirs, vec![DirMask::FORWARD, DirMask::STOP, DirMask::STOP]);
    }
}
