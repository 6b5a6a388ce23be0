//! Deadline timer built as an automaton of its own. Callers schedule a
//! command to be posted back to some target automaton after a lapse; an
//! internal thread posts a TICK every 25ms which expires pending deadlines.
//! Targets are held weakly so a drained automaton never keeps the timer from
//! letting go of it.
use crate::fsm::automaton::{Automaton, Opcode, Recv};
use crate::primitives::event::Guard;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

pub enum Command<T>
where
    T: Send + 'static,
{
    TICK,
    SCHEDULE(Arc<Automaton<T>>, T, Duration),
}

#[derive(Copy, Clone, PartialEq)]
enum State {
    DEFAULT,
}

impl Default for State {
    fn default() -> State {
        State::DEFAULT
    }
}

use self::Command::*;

pub struct Timer<T>
where
    T: Send + 'static,
{
    pub fsm: Arc<Automaton<Command<T>>>,
}

struct Pending<T>
where
    T: Send + 'static,
{
    n: u64,
    at: Instant,
    to: Weak<Automaton<T>>,
    msg: T,
}

struct FSM<T>
where
    T: Send + 'static,
{
    n: u64,
    heap: BinaryHeap<Pending<T>>,
}

impl<T> Ord for Pending<T>
where
    T: Send + 'static,
{
    fn cmp(&self, other: &Self) -> Ordering {

        //
        // - the std heap is a max-heap: reverse so that the earliest
        //   deadline bubbles up to the top
        //
        (self.at, self.n).cmp(&(other.at, other.n)).reverse()
    }
}

impl<T> PartialOrd for Pending<T>
where
    T: Send + 'static,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Pending<T>
where
    T: Send + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        (self.n, self.at) == (other.n, other.at)
    }
}

impl<T> Eq for Pending<T> where T: Send + 'static {}

impl<T> Recv<Command<T>, State> for FSM<T>
where
    T: Send + 'static,
{
    fn recv(
        &mut self,
        _this: &Arc<Automaton<Command<T>>>,
        state: State,
        opcode: Opcode<Command<T>, State>,
    ) -> State {
        match opcode {
            Opcode::INPUT(TICK) => {

                //
                // - pop every expired deadline and post its payload back to
                //   the target automaton, skipping targets that died
                //
                let now = Instant::now();
                loop {
                    match self.heap.peek() {
                        Some(pending) if pending.at <= now => {}
                        _ => break,
                    }
                    let pending = self.heap.pop().unwrap();
                    if let Some(fsm) = pending.to.upgrade() {
                        let _ = fsm.post(pending.msg);
                    }
                }
            }
            Opcode::INPUT(SCHEDULE(to, msg, lapse)) => {
                self.heap.push(Pending {
                    n: self.n,
                    at: Instant::now() + lapse,
                    to: Arc::downgrade(&to),
                    msg,
                });
                self.n += 1;
            }
            _ => {}
        }
        state
    }
}

impl<T> Timer<T>
where
    T: Send + 'static,
{
    pub fn spawn(guard: Arc<Guard>) -> Timer<T> {

        let fsm = Automaton::spawn(
            guard.clone(),
            Box::new(FSM {
                n: 0,
                heap: BinaryHeap::new(),
            }),
        );

        {
            //
            // - allocate an internal thread periodically posting a TICK
            //   command back to the automaton
            //
            let fsm = fsm.clone();
            let _ = thread::spawn(move || {

                //
                // - the thread stops spinning as soon as it cannot post
                //   anymore, e.g once the automaton drained
                //
                let cv = Condvar::new();
                let mtx = Mutex::new(());
                while fsm.post(TICK).is_ok() {

                    //
                    // - park on the condition variable for up to 25ms
                    //
                    let lock = mtx.lock().unwrap();
                    let _ = cv.wait_timeout(lock, Duration::from_millis(25)).unwrap();
                }
                drop(guard);
            });
        }

        Timer { fsm }
    }

    pub fn schedule(&self, to: Arc<Automaton<T>>, msg: T, lapse: Duration) -> () {
        let _ = self.fsm.post(SCHEDULE(to, msg, lapse));
    }
}

impl<T> Drop for Timer<T>
where
    T: Send + 'static,
{
    fn drop(&mut self) -> () {
        self.fsm.drain();
    }
}
