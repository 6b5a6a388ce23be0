//! A simple auto-reset event used to wake a parked thread when work shows up,
//! plus a shallow guard signaling the event once every clone of it dropped.
//! The guard is what lets a driver block until a whole group of threads has
//! wound down.
use std::sync::{Arc, Condvar, Mutex};

struct Inner {
    set: Mutex<bool>,
    cond: Condvar,
}

/// Auto-reset event: wait() blocks until signal() ran, then consumes the
/// signal. Signaling an already-set event is a no-op.
pub struct Event {
    inner: Arc<Inner>,
}

/// Shallow guard signaling the owning event upon dropping. Clone the
/// returned `Arc<Guard>` into each thread of a group: the signal fires when
/// the last clone goes away.
pub struct Guard(Arc<Inner>);

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    #[inline]
    pub fn new() -> Self {
        Event {
            inner: Arc::new(Inner {
                set: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    #[inline]
    pub fn signal(&self) -> () {
        self.inner.up();
    }

    #[inline]
    pub fn wait(&self) -> () {

        //
        // - block until the flag is up
        // - consume it (auto-reset)
        //
        let mut set = self.inner.set.lock().unwrap();
        while !*set {
            set = self.inner.cond.wait(set).unwrap();
        }
        *set = false;
    }

    #[inline]
    pub fn guard(&self) -> Arc<Guard> {
        Arc::new(Guard(self.inner.clone()))
    }
}

impl Inner {
    fn up(&self) -> () {
        let mut set = self.set.lock().unwrap();
        *set = true;
        self.cond.notify_one();
    }
}

impl Drop for Guard {
    fn drop(&mut self) -> () {
        self.0.up();
    }
}
