//! Bounded per-track byte queue feeding the streaming mixer.
//!
//! Writers block while the queue is full; the mixer never blocks and takes
//! whole frames only, unless the writer has finished and a partial tail is
//! all that is left.

use std::io;
use std::sync::{Arc, Condvar, Mutex};

/// Thread-safe circular buffer of PCM bytes.
pub(crate) struct TrackBuffer {
    notify_mixer: Arc<Condvar>,
    space: Condvar,
    mu: Mutex<BufferState>,
}

struct BufferState {
    buf: Vec<u8>,
    head: usize,
    len: usize,
    close_write: bool,
    close_err: Option<String>,
}

pub(crate) enum Pull {
    /// `n` bytes were copied into the front of the caller's buffer.
    Data(usize),
    /// Nothing buffered yet.
    Empty,
    /// Writer finished and everything was consumed.
    Eof,
    /// Closed with an error; buffered audio was discarded.
    Error(String),
}

impl TrackBuffer {
    pub fn new(capacity: usize, notify_mixer: Arc<Condvar>) -> Self {
        Self {
            notify_mixer,
            space: Condvar::new(),
            mu: Mutex::new(BufferState {
                buf: vec![0u8; capacity.max(1)],
                head: 0,
                len: 0,
                close_write: false,
                close_err: None,
            }),
        }
    }

    /// Appends `data`, blocking while the buffer is full.
    pub fn write(&self, mut data: &[u8]) -> io::Result<usize> {
        let total = data.len();
        let mut st = self.mu.lock().unwrap();

        while !data.is_empty() {
            if let Some(ref e) = st.close_err {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, e.clone()));
            }
            if st.close_write {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "track write closed",
                ));
            }

            let cap = st.buf.len();
            let free = cap - st.len;
            if free == 0 {
                st = self.space.wait(st).unwrap();
                continue;
            }

            let n = data.len().min(free);
            let tail = (st.head + st.len) % cap;
            let first = n.min(cap - tail);
            st.buf[tail..tail + first].copy_from_slice(&data[..first]);
            st.buf[..n - first].copy_from_slice(&data[first..n]);
            st.len += n;
            data = &data[n..];

            self.notify_mixer.notify_all();
        }

        Ok(total)
    }

    /// Copies up to `out.len()` bytes into `out` without blocking.
    ///
    /// While the writer is open only whole multiples of `frame` are taken.
    pub fn pull(&self, out: &mut [u8], frame: usize) -> Pull {
        let mut st = self.mu.lock().unwrap();

        if let Some(ref e) = st.close_err {
            return Pull::Error(e.clone());
        }

        let mut n = out.len().min(st.len);
        if !st.close_write {
            n -= n % frame;
        }
        if n == 0 {
            return if st.len == 0 && st.close_write {
                Pull::Eof
            } else {
                Pull::Empty
            };
        }

        let cap = st.buf.len();
        let first = n.min(cap - st.head);
        out[..first].copy_from_slice(&st.buf[st.head..st.head + first]);
        out[first..n].copy_from_slice(&st.buf[..n - first]);
        st.head = (st.head + n) % cap;
        st.len -= n;

        self.space.notify_all();
        Pull::Data(n)
    }

    /// Number of bytes waiting to be mixed.
    pub fn buffered(&self) -> usize {
        self.mu.lock().unwrap().len
    }

    /// True once nothing more will ever be pulled.
    pub fn is_finished(&self) -> bool {
        let st = self.mu.lock().unwrap();
        st.close_err.is_some() || (st.close_write && st.len == 0)
    }

    /// Returns the error the buffer was closed with, if any.
    pub fn error(&self) -> Option<String> {
        self.mu.lock().unwrap().close_err.clone()
    }

    pub fn close_write(&self) {
        let mut st = self.mu.lock().unwrap();
        if !st.close_write {
            st.close_write = true;
            self.space.notify_all();
            self.notify_mixer.notify_all();
        }
    }

    /// Closes the buffer and drops whatever is still queued.
    pub fn close_with_error(&self, err: String) {
        let mut st = self.mu.lock().unwrap();
        if st.close_err.is_none() {
            st.close_err = Some(err);
        }
        st.close_write = true;
        st.len = 0;
        self.space.notify_all();
        self.notify_mixer.notify_all();
    }
}
