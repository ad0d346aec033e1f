//! `PtyHandle` — a live pseudo-terminal backed by `portable-pty`.
//!
//! One uniform contract across platforms: `spawn`, `read`, `write`,
//! `resize`, `terminate`. `portable_pty::native_pty_system()` picks the
//! Unix `forkpty`-style backend or the Windows ConPTY backend at runtime,
//! so this module carries no `#[cfg(unix)]`/`#[cfg(windows)]` split.

use crate::error::{PtyError, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Mutex;
use std::thread;

/// Chunk size used by the background reader thread. Independent of the `n`
/// passed to `read` — `read` serves out of the channel (and a small
/// leftover buffer) regardless of how the far side chunked things.
const READER_THREAD_CHUNK: usize = 4096;

/// A spawned shell attached to a PTY master.
///
/// `portable-pty`'s master reader is a plain blocking `Read`. To honor the
/// PTY contract's non-blocking `read` (empty on would-block, never parks
/// the caller), a dedicated thread drains it continuously into a channel;
/// `read` only ever does a non-blocking `try_recv`. This is the same shape
/// as `original_source/webterm/pty_unix.py`'s `O_NONBLOCK` fd plus
/// `BlockingIOError`-returns-`b""`, implemented portably instead of via a
/// platform-specific fd flag.
pub struct PtyHandle {
    pid: Option<u32>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    output_rx: Mutex<Receiver<Vec<u8>>>,
    leftover: Mutex<Vec<u8>>,
}

impl PtyHandle {
    /// Spawn `shell` in `cwd` with an initial `cols`x`rows` window.
    ///
    /// The child changes directory to `cwd` (the caller is responsible for
    /// falling back to the user's home directory before calling this —
    /// see `shellcast_sessions::manager::resolve_cwd`).
    pub fn spawn(shell: &str, cwd: &str, cols: u16, rows: u16) -> Result<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(cwd);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let pid = child.process_id();

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        thread::spawn(move || {
            let mut buf = vec![0u8; READER_THREAD_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            // Sender dropped here — the channel disconnecting is how
            // `read` observes end-of-stream.
        });

        Ok(Self {
            pid,
            child: Mutex::new(child),
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            output_rx: Mutex::new(rx),
            leftover: Mutex::new(Vec::new()),
        })
    }

    /// Process id of the spawned shell, when the platform exposes one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking read of up to `n` bytes from the PTY master.
    ///
    /// Returns `Ok(vec![])` immediately if nothing is available yet (the
    /// would-block case). Returns `Err(PtyError::Eof)` once the background
    /// reader thread has observed end-of-stream (child closed its side) —
    /// the session manager's pump treats that as end-of-stream and
    /// transitions the session to `exited`.
    pub fn read(&self, n: usize) -> Result<Vec<u8>> {
        let mut leftover = self.leftover.lock().unwrap();
        if !leftover.is_empty() {
            let take = leftover.len().min(n);
            return Ok(leftover.drain(..take).collect());
        }
        drop(leftover);

        match self.output_rx.lock().unwrap().try_recv() {
            Ok(mut bytes) => {
                if bytes.len() > n {
                    let rest = bytes.split_off(n);
                    *self.leftover.lock().unwrap() = rest;
                }
                Ok(bytes)
            }
            Err(TryRecvError::Empty) => Ok(Vec::new()),
            Err(TryRecvError::Disconnected) => Err(PtyError::Eof),
        }
    }

    /// Write `data` to the shell's stdin, retrying until fully drained.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    /// Resize the terminal window. Best-effort: some platforms may reject
    /// a resize on an already-exited child, which is not a caller error.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let master = self.master.lock().unwrap();
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Io(std::io::Error::other(e.to_string())))
    }

    /// Ask the child to exit. Idempotent — killing an already-exited child
    /// is not surfaced as an error.
    pub fn terminate(&self) {
        let mut child = self.child.lock().unwrap();
        let _ = child.kill();
    }
}
