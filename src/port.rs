use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};
use thiserror::Error;

use crate::proto::FrameSink;

/// Fixed line parameters: 9600 8N1, no parity, no flow control.
pub const BAUD: u32 = 9600;
pub const OPEN_TIMEOUT: Duration = Duration::from_millis(2000);
const READ_POLL: Duration = Duration::from_millis(100);

/// Called with each inbound chunk, exactly once per arrival, in FIFO order.
pub type InboundHandler = Box<dyn FnMut(&[u8]) + Send>;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("could not enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),
    #[error("no serial port named {0}")]
    NotFound(String),
    #[error("open {0}: {1}")]
    Open(String, #[source] serialport::Error),
}

/// Port names as reported by the OS driver; order is not guaranteed stable.
pub fn list_endpoints() -> Result<Vec<String>, LinkError> {
    let ports = serialport::available_ports().map_err(LinkError::Enumerate)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Owner of the single serial connection. `open`, `close`, `send`, and
/// inbound delivery are mutually exclusive: the handle sits behind one
/// mutex, and the reader thread takes a shared I/O lock around each
/// delivery that `send` also holds across its write, so a handler never
/// overlaps a write. `close` joins the reader without holding either lock.
pub struct Transport {
    inner: Mutex<Inner>,
    io: Arc<Mutex<()>>,
}

#[derive(Default)]
struct Inner {
    port: Option<Box<dyn SerialPort>>,
    reader: Option<Reader>,
}

struct Reader {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            io: Arc::new(Mutex::new(())),
        }
    }

    /// Close-then-open as one atomic call. The name is checked against the
    /// enumerated ports first, so a not-found failure leaves any existing
    /// connection untouched; once the name is known, the old handle is
    /// closed before the new open. If that open then fails, the transport
    /// ends up cleanly disconnected rather than holding a stale handle.
    pub fn open(&self, name: &str, on_data: InboundHandler) -> Result<(), LinkError> {
        let names = list_endpoints()?;
        if !names.iter().any(|n| n == name) {
            return Err(LinkError::NotFound(name.to_string()));
        }

        let old = close_locked(&mut self.lock());
        join_reader(old);

        let port = serialport::new(name, BAUD)
            .timeout(OPEN_TIMEOUT)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open()
            .map_err(|e| LinkError::Open(name.to_string(), e))?;

        let mut rx = port
            .try_clone()
            .map_err(|e| LinkError::Open(name.to_string(), e))?;
        // short poll so close() can stop the reader promptly
        let _ = rx.set_timeout(READ_POLL);

        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_reader(rx, on_data, stop.clone(), self.io.clone());

        let mut inner = self.lock();
        inner.port = Some(port);
        inner.reader = Some(Reader { stop, handle });
        Ok(())
    }

    /// Idempotent; safe when nothing is open. Stops the reader thread and
    /// drops the inbound handler with it. The join happens outside the
    /// inner lock so a handler mid-delivery cannot deadlock against it.
    pub fn close(&self) {
        let reader = close_locked(&mut self.lock());
        join_reader(reader);
    }

    pub fn is_open(&self) -> bool {
        self.lock().port.is_some()
    }

    /// Fire-and-forget write: a no-op when disconnected or empty; write
    /// failures are logged, never raised. The physical link is at-most-effort
    /// anyway, so a lost frame is not worth stalling the interactive path.
    pub fn send(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut inner = self.lock();
        let Some(port) = inner.port.as_mut() else {
            return;
        };
        // writes never overlap an inbound delivery
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = port.write_all(bytes) {
            eprintln!("[link] write failed: {}", e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for Transport {
    fn send_frame(&self, frame: [u8; 4]) {
        self.send(&frame);
    }
}

fn close_locked(inner: &mut Inner) -> Option<Reader> {
    inner.port = None;
    let reader = inner.reader.take();
    if let Some(reader) = &reader {
        reader.stop.store(true, Ordering::Relaxed);
    }
    reader
}

fn join_reader(reader: Option<Reader>) {
    if let Some(reader) = reader {
        let _ = reader.handle.join();
    }
}

fn spawn_reader<R>(
    mut rx: R,
    mut on_data: InboundHandler,
    stop: Arc<AtomicBool>,
    io: Arc<Mutex<()>>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = [0u8; 512];
        while !stop.load(Ordering::Relaxed) {
            match rx.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    // deliveries hold the same I/O lock as send
                    let _io = io.lock().unwrap_or_else(PoisonError::into_inner);
                    on_data(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    eprintln!("[link] read error: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::mpsc;

    use super::*;

    /// Stand-in for the cloned serial handle: yields the queued chunks,
    /// then times out like an idle line.
    struct ChunkReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkReader {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            }
        }
    }

    impl Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Err(io::ErrorKind::TimedOut.into())
                }
            }
        }
    }

    #[test]
    fn open_unknown_endpoint_fails_without_connecting() {
        let t = Transport::new();
        let err = t
            .open("/dev/tty-rc-drive-no-such-port", Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::NotFound(_) | LinkError::Enumerate(_)
        ));
        assert!(!t.is_open());
    }

    #[test]
    fn send_when_disconnected_is_a_noop() {
        let t = Transport::new();
        t.send(&[10, 1, 255, 10]);
        t.send(&[]);
        assert!(!t.is_open());
    }

    #[test]
    fn close_is_idempotent() {
        let t = Transport::new();
        t.close();
        t.close();
        assert!(!t.is_open());
    }

    #[test]
    fn inbound_delivery_waits_for_the_io_lock() {
        let io = Arc::new(Mutex::new(()));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        // hold the lock like an in-flight send
        let guard = io.lock().unwrap();
        let handle = spawn_reader(
            ChunkReader::new(&[&[1, 2, 3]]),
            Box::new(move |chunk| {
                let _ = tx.send(chunk.to_vec());
            }),
            stop.clone(),
            io.clone(),
        );

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            vec![1, 2, 3]
        );

        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
    }

    #[test]
    fn inbound_chunks_arrive_once_each_in_fifo_order() {
        let io = Arc::new(Mutex::new(()));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let handle = spawn_reader(
            ChunkReader::new(&[&[1, 2, 3], &[4, 5]]),
            Box::new(move |chunk| {
                let _ = tx.send(chunk.to_vec());
            }),
            stop.clone(),
            io,
        );

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), vec![4, 5]);
        // idle line: nothing further arrives
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
    }
}
