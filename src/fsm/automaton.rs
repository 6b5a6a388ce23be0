//! Minimalistic automaton (e.g finite state machine) backed by an event loop
//! running on a dedicated thread. Producers post commands into an unbounded
//! inbox; the loop drains it one command at a time and hands each to a user
//! supplied handler, which is therefore the only code ever touching the
//! machine's state.
use crate::fsm::mpsc::MPSC;
use crate::primitives::event::{Event, Guard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Mode {
    IDLE = 0,
    RUNNING = 1,
    SIGNALED = 2,
    DRAINING = 3,
    DEAD = 4,
}

#[derive(Debug)]
pub enum Errors {
    InvalidMode(Mode),
}

#[derive(Debug)]
pub enum Opcode<T, U>
where
    U: PartialEq,
{
    START,
    INPUT(T),
    TRANSITION(U),
    DRAIN,
    EXIT,
}

use self::Errors::*;
use self::Mode::*;
use self::Opcode::*;

/// User defined handler specifying the current state and opcode to process.
/// The state will be updated to whatever value is returned.
pub trait Recv<T, U>: Send
where
    T: Send,
    U: PartialEq,
{
    fn recv(&mut self, this: &Arc<Automaton<T>>, state: U, opcode: Opcode<T, U>) -> U;
}

/// Automaton maintaining an incoming queue of commands plus a mode (idle,
/// running, draining, etc.). The mode is a tiny state machine of its own,
/// tracking the lifecycle transitions. The underlying thread runs the event
/// loop: dequeue from the inbox, invoke the handler, park when starved.
pub struct Automaton<T>
where
    T: Send + 'static,
{
    event: Event,
    inbox: MPSC<T>,
    mode: AtomicUsize,
}

impl<T> Automaton<T>
where
    T: Send + 'static,
{
    pub fn spawn<U>(guard: Arc<Guard>, mut body: Box<dyn Recv<T, U>>) -> Arc<Automaton<T>>
    where
        U: Send + Copy + Default + PartialEq + 'static,
    {
        let fsm = Arc::new(Automaton {
            event: Event::new(),
            inbox: MPSC::new(),
            mode: AtomicUsize::new(0),
        });

        {
            //
            // - allocate the underlying event loop
            // - it will signal the specified guard upon going down
            //
            let fsm = fsm.clone();
            let _ = thread::spawn(move || {

                //
                // - the mode is IDLE at this point
                // - block until start() flips us to RUNNING
                // - recv on START and assign the initial state
                //
                fsm.event.wait();
                let mut draining = false;
                let mut state = body.recv(&fsm, Default::default(), START);
                loop {

                    //
                    // - if drain() was invoked move the mode to DRAINING and
                    //   recv() on DRAIN, once
                    //
                    draining |= fsm
                        .transition_if(SIGNALED, || { let _ = body.recv(&fsm, state, DRAIN); });
                    if let Ok(msg) = fsm.inbox.pop() {

                        //
                        // - we dequeued the next command
                        // - recv() on INPUT and then on TRANSITION whenever
                        //   the returned state compares different
                        //
                        let next = body.recv(&fsm, state, INPUT(msg));
                        if next != state {
                            let _ = body.recv(&fsm, next, TRANSITION(state));
                        }
                        state = next;

                    } else if draining {

                        //
                        // - draining with an empty inbox: we are done
                        // - move the mode to DEAD and recv() a last time on EXIT
                        //
                        fsm.mode.fetch_add(1, Ordering::Release);
                        let _ = body.recv(&fsm, state, EXIT);
                        break;

                    } else {

                        //
                        // - running but starved
                        // - park until the next post() or drain()
                        //
                        fsm.event.wait();
                    }
                }

                //
                // - the automaton is now dead
                // - drop the handler first, then the guard, and exit the thread
                //
                drop(body);
                drop(guard);
            });
        }
        fsm.start();
        fsm
    }

    #[inline]
    pub fn start(&self) -> () {

        //
        // - attempt to transition from IDLE to RUNNING
        // - signal the internal event upon success to release the event loop
        //
        let _ = self.transition_if(IDLE, || self.event.signal());
    }

    #[inline]
    pub fn drain(&self) -> () {

        //
        // - attempt to transition from RUNNING to SIGNALED
        // - signal the internal event in case the loop is parked on an
        //   empty inbox
        //
        let _ = self.transition_if(RUNNING, || self.event.signal());
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        match self.mode.load(Ordering::Relaxed) {
            0 => IDLE,
            1 => RUNNING,
            2 => SIGNALED,
            3 => DRAINING,
            _ => DEAD,
        }
    }

    /// True until drain() is invoked, e.g while post() can still succeed.
    #[inline]
    pub fn running(&self) -> bool {
        self.mode.load(Ordering::Relaxed) <= RUNNING as usize
    }

    pub fn post(&self, msg: T) -> Result<(), Errors> {

        //
        // - only allow pushing to the inbox while the mode is RUNNING
        //
        match self.mode.load(Ordering::Relaxed) {
            1 => {
                self.inbox.push(msg);
                self.event.signal();
                Ok(())
            }
            _ => Err(InvalidMode(self.mode())),
        }
    }

    fn transition_if<F>(&self, expected: Mode, mut f: F) -> bool
    where
        F: FnMut() -> (),
    {
        let expected = expected as usize;
        loop {

            //
            // - increment the mode if and only if it currently holds the
            //   expected value and run the closure upon success
            // - looping is only allowed upon a spurious CAS failure
            //
            match self.mode.compare_exchange_weak(
                expected,
                expected + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    f();
                    return true;
                }
                Err(prv) if prv != expected => return false,
                _ => {}
            }
        }
    }
}
