// src/watch/inotify.rs

//! Thin wrapper over the kernel inotify API.
//!
//! Owns the inotify file descriptor and decodes the raw record stream. Each
//! record is a 16-byte header (wd: i32, mask: u32, cookie: u32, len: u32) in
//! kernel byte order, followed by `len` bytes of NUL-padded filename.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

/// Size of the fixed record header preceding the name bytes.
pub const EVENT_HEADER_LEN: usize = 16;

/// One decoded kernel record, before translation to a watch path.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub wd: i32,
    pub mask: u32,
    pub cookie: u32,
    /// Filename with NUL padding stripped; empty for events on the watched
    /// path itself.
    pub name: String,
}

/// An owned inotify file descriptor.
///
/// `close` may be called from a different thread than `read`; closing the
/// descriptor is how the blocking read loop is woken for teardown.
#[derive(Debug)]
pub struct InotifyFd {
    fd: AtomicI32,
}

impl InotifyFd {
    /// Create a new close-on-exec inotify instance.
    pub fn new() -> io::Result<InotifyFd> {
        let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(InotifyFd {
            fd: AtomicI32::new(fd),
        })
    }

    /// Install (or update) a watch for `path`, returning the kernel watch
    /// descriptor. Watching the same path twice yields the same descriptor.
    pub fn add_watch(&self, path: &Path, mask: u32) -> io::Result<i32> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        let wd = unsafe { libc::inotify_add_watch(self.raw(), c_path.as_ptr(), mask) };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(wd)
    }

    /// Remove a watch by descriptor.
    pub fn rm_watch(&self, wd: i32) -> io::Result<()> {
        let rc = unsafe { libc::inotify_rm_watch(self.raw(), wd) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Blocking read of the next batch of records into `buf`. The caller is
    /// responsible for retrying `ErrorKind::Interrupted`.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.raw(), buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    /// Close the descriptor. Idempotent; a blocked `read` on another thread
    /// fails once the descriptor is gone.
    pub fn close(&self) {
        let fd = self.fd.swap(-1, Ordering::SeqCst);
        if fd >= 0 {
            unsafe {
                libc::close(fd);
            }
        }
    }

    fn raw(&self) -> i32 {
        self.fd.load(Ordering::SeqCst)
    }
}

impl Drop for InotifyFd {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decode a batch of raw records from one `read`.
///
/// A partial trailing record (header or name cut off at the buffer
/// boundary) is discarded; the kernel only produces whole records per read,
/// so this only guards against corruption.
pub fn decode_events(buf: &[u8]) -> Vec<RawEvent> {
    let mut events = Vec::new();
    let mut offset = 0usize;

    while offset + EVENT_HEADER_LEN <= buf.len() {
        let wd = i32::from_ne_bytes([
            buf[offset],
            buf[offset + 1],
            buf[offset + 2],
            buf[offset + 3],
        ]);
        let mask = u32::from_ne_bytes([
            buf[offset + 4],
            buf[offset + 5],
            buf[offset + 6],
            buf[offset + 7],
        ]);
        let cookie = u32::from_ne_bytes([
            buf[offset + 8],
            buf[offset + 9],
            buf[offset + 10],
            buf[offset + 11],
        ]);
        let name_len = u32::from_ne_bytes([
            buf[offset + 12],
            buf[offset + 13],
            buf[offset + 14],
            buf[offset + 15],
        ]) as usize;
        offset += EVENT_HEADER_LEN;

        if offset + name_len > buf.len() {
            break;
        }
        let raw_name = &buf[offset..offset + name_len];
        offset += name_len;

        // The name field is padded to `name_len` with NUL bytes.
        let end = raw_name
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();

        events.push(RawEvent {
            wd,
            mask,
            cookie,
            name,
        });
    }

    events
}
