use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use crate::proto::DirMask;

/// Notifications for the UI collaborator. Carried over an unbounded channel
/// so the paths that emit them never block on a slow consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// User-facing failure: missing files, parse errors, connection errors.
    Warning(String),
    /// Live display update for the current direction mask.
    DirectionChanged(DirMask),
}

/// Drains events on a background thread and prints them. The thread exits
/// once every sender is dropped; join the handle for a clean flush on exit.
pub fn spawn_printer() -> (Sender<Event>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = std::thread::spawn(move || {
        for ev in rx {
            match ev {
                Event::Warning(msg) => eprintln!("[ui] warning: {}", msg),
                Event::DirectionChanged(mask) => eprintln!("[ui] direction: {}", mask),
            }
        }
    });
    (tx, handle)
}
