use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;

use crate::event::Event;
use crate::proto::DirMask;
use crate::state::DriveState;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("{0} fields is not a multiple of 3 (direction,speed,duration)")]
    FieldCount(usize),
    #[error("bad speed {0:?} (expected 0-255)")]
    BadSpeed(String),
    #[error("bad duration {0:?} (expected milliseconds)")]
    BadDuration(String),
    #[error("unknown direction mnemonic {0:?}")]
    UnknownDirection(String),
}

/// One timed command of a programmed sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub dir: DirMask,
    pub speed: u8,
    pub duration: Duration,
}

/// Parse the flat (direction, speed, duration, ...) field list a sequence
/// script flattens into. In lenient mode an unknown mnemonic becomes a stop
/// for that one step; in strict mode it fails the whole run. Malformed
/// numbers always fail the whole run, there is no partial recovery.
pub fn parse_steps(fields: &[String], strict: bool) -> Result<Vec<Step>, SequenceError> {
    if fields.len() % 3 != 0 {
        return Err(SequenceError::FieldCount(fields.len()));
    }
    let mut steps = Vec::with_capacity(fields.len() / 3);
    for chunk in fields.chunks_exact(3) {
        let dir = match DirMask::from_mnemonic(&chunk[0]) {
            Some(d) => d,
            None if strict => return Err(SequenceError::UnknownDirection(chunk[0].clone())),
            None => DirMask::STOP,
        };
        let speed: u8 = chunk[1]
            .parse()
            .map_err(|_| SequenceError::BadSpeed(chunk[1].clone()))?;
        let ms: u64 = chunk[2]
            .parse()
            .map_err(|_| SequenceError::BadDuration(chunk[2].clone()))?;
        steps.push(Step {
            dir,
            speed,
            duration: Duration::from_millis(ms),
        });
    }
    Ok(steps)
}

/// Replays a sequence on a dedicated thread so the interactive path stays
/// responsive. At most one run is active at a time; `start` while running is
/// rejected. Every run that sends anything ends with a stop command, whether
/// it completes or is cancelled mid-delay.
pub struct SequenceEngine {
    running: Arc<AtomicBool>,
    cancel: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SequenceEngine {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a run over the flattened field list. Returns false, with no
    /// side effects, if a run is already active.
    pub fn start(
        &self,
        fields: Vec<String>,
        drive: Arc<Mutex<DriveState>>,
        events: Sender<Event>,
        strict: bool,
    ) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let (cancel_tx, cancel_rx) = mpsc::channel();
        *lock(&self.cancel) = Some(cancel_tx);

        let running = self.running.clone();
        let handle = std::thread::spawn(move || {
            run_steps(&fields, strict, &drive, &events, &cancel_rx);
            running.store(false, Ordering::SeqCst);
        });
        *lock(&self.worker) = Some(handle);
        true
    }

    /// Interrupt the in-flight delay and skip the remaining steps. The
    /// terminal stop command still runs. No-op when idle.
    pub fn cancel(&self) {
        if let Some(tx) = lock(&self.cancel).take() {
            let _ = tx.send(());
        }
    }

    /// Block until the active run (if any) has fully finished, including
    /// its terminal stop.
    pub fn wait(&self) {
        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }
    }
}

impl Default for SequenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn run_steps(
    fields: &[String],
    strict: bool,
    drive: &Mutex<DriveState>,
    events: &Sender<Event>,
    cancel_rx: &Receiver<()>,
) {
    // Parse everything up front: a bad script aborts before any frame goes
    // out, so there is nothing moving that would need the fail-safe stop.
    let steps = match parse_steps(fields, strict) {
        Ok(steps) => steps,
        Err(e) => {
            let _ = events.send(Event::Warning(format!("sequence error: {}", e)));
            return;
        }
    };

    for step in &steps {
        lock(drive).send_direction(step.dir, Some(step.speed));
        let _ = events.send(Event::DirectionChanged(step.dir));
        match cancel_rx.recv_timeout(step.duration) {
            Err(RecvTimeoutError::Timeout) => {}
            // cancelled, or the engine itself went away
            _ => break,
        }
    }

    // Fail-safe: the vehicle never ends a script run still moving.
    lock(drive).send_direction(DirMask::STOP, None);
    let _ = events.send(Event::DirectionChanged(DirMask::STOP));
}

fn lock<'a, T>(m: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
