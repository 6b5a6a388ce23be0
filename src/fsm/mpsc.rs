use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug)]
pub enum Errors {
    Empty,
}

use self::Errors::*;

///
/// Basic unbounded MPSC FIFO queue. Any thread may push; pop() *must* only
/// ever be used by one thread at a time (the automaton event loop). Waking
/// that consumer up is not the queue's job, the owning automaton parks on
/// its event instead.
///
pub struct MPSC<T> {
    fifo: Mutex<VecDeque<T>>,
}

impl<T> Default for MPSC<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MPSC<T> {
    pub fn new() -> MPSC<T> {
        MPSC {
            fifo: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, val: T) -> () {
        self.fifo.lock().unwrap().push_back(val);
    }

    pub fn pop(&self) -> Result<T, Errors> {
        self.fifo.lock().unwrap().pop_front().ok_or(Empty)
    }
}
