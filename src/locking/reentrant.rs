//! Reentrant read/write lock with writer-thread tracking.
//!
//! `parking_lot::RwLock` is deliberately not reentrant and cannot answer
//! "does the current thread hold the write side", which the scheduling
//! core needs for its lock-precondition assertions. This implementation
//! keeps the full lock state behind one small mutex and parks waiters on a
//! condvar, trading a little throughput for exact hold accounting.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct LockState {
    /// Read holds per thread. A thread may hold several.
    readers: HashMap<ThreadId, usize>,
    /// Thread currently holding the write side, if any.
    writer: Option<ThreadId>,
    /// Write reentry depth of the owning thread.
    write_depth: usize,
}

impl LockState {
    fn other_readers(&self, me: ThreadId) -> bool {
        self.readers.keys().any(|id| *id != me)
    }
}

#[derive(Debug, Default)]
pub struct ReentrantRwLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl ReentrantRwLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the write side, blocking until it is free. Reentrant: the
    /// owning thread may acquire again, and a thread holding only its own
    /// read locks may upgrade.
    pub fn write(&self) -> ReentrantWriteGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.writer == Some(me) {
            state.write_depth += 1;
        } else {
            while state.writer.is_some() || state.other_readers(me) {
                self.released.wait(&mut state);
            }
            state.writer = Some(me);
            state.write_depth = 1;
        }
        ReentrantWriteGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire the read side, blocking while another thread holds the
    /// write side. The writing thread itself reads without blocking.
    pub fn read(&self) -> ReentrantReadGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while state.writer.is_some() && state.writer != Some(me) {
            self.released.wait(&mut state);
        }
        *state.readers.entry(me).or_insert(0) += 1;
        ReentrantReadGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Whether the calling thread currently holds the write side.
    pub fn is_write_held_by_current_thread(&self) -> bool {
        self.state.lock().writer == Some(thread::current().id())
    }

    /// Whether any thread holds either side.
    pub fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.writer.is_some() || !state.readers.is_empty()
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.writer, Some(thread::current().id()));
        state.write_depth -= 1;
        if state.write_depth == 0 {
            state.writer = None;
            self.released.notify_all();
        }
    }

    fn release_read(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let count = state
            .readers
            .get_mut(&me)
            .expect("read guard released on a thread that never acquired");
        *count -= 1;
        if *count == 0 {
            state.readers.remove(&me);
            self.released.notify_all();
        }
    }
}

/// Write guard. Thread-bound: releasing on another thread would corrupt
/// the hold accounting, so the guard is neither `Send` nor `Sync`.
pub struct ReentrantWriteGuard<'a> {
    lock: &'a ReentrantRwLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

/// Read guard, thread-bound like the write guard.
pub struct ReentrantReadGuard<'a> {
    lock: &'a ReentrantRwLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}
