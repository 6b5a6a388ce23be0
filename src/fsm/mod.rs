pub mod automaton;
pub mod mpsc;
pub mod timer;

#[cfg(test)]
mod tests {

    use crate::fsm::automaton::*;
    use crate::fsm::timer::*;
    use crate::primitives::event::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    enum Command {
        TERMINATE,
    }

    #[derive(Debug, Copy, Clone, PartialEq)]
    enum State {
        DEFAULT,
    }

    use self::Command::*;

    impl Default for State {
        fn default() -> State {
            State::DEFAULT
        }
    }

    #[test]
    fn basic_lifecycle() {
        struct FSM {
            cnt: usize,
        }

        impl Recv<Command, State> for FSM {
            fn recv(
                &mut self,
                _this: &Arc<Automaton<Command>>,
                state: State,
                _opcode: Opcode<Command, State>,
            ) -> State {
                self.cnt += 1;
                state
            }
        }

        impl Drop for FSM {
            fn drop(&mut self) -> () {

                //
                // - we expect exactly START, DRAIN and EXIT
                //
                assert!(self.cnt == 3);
            }
        }

        let event = Event::new();
        let guard = event.guard();
        let fsm = Automaton::spawn(guard.clone(), Box::new(FSM { cnt: 0 }));
        drop(guard);
        fsm.drain();
        event.wait();
        assert!(fsm.mode() == Mode::DEAD);
    }

    #[test]
    fn inputs_processed_in_order() {
        use std::sync::Mutex;

        struct FSM {
            seen: Arc<Mutex<Vec<usize>>>,
        }

        #[derive(Debug)]
        enum N {
            N(usize),
        }

        impl Recv<N, State> for FSM {
            fn recv(
                &mut self,
                _this: &Arc<Automaton<N>>,
                state: State,
                opcode: Opcode<N, State>,
            ) -> State {
                if let Opcode::INPUT(N::N(n)) = opcode {
                    self.seen.lock().unwrap().push(n);
                }
                state
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let event = Event::new();
        let guard = event.guard();
        let fsm = Automaton::spawn(guard.clone(), Box::new(FSM { seen: seen.clone() }));
        for n in 0..64 {
            fsm.post(N::N(n)).unwrap();
        }
        drop(guard);
        fsm.drain();
        event.wait();
        assert!(*seen.lock().unwrap() == (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn terminate_in_250ms() {
        struct FSM {
            timer: Timer<Command>,
        }

        impl Recv<Command, State> for FSM {
            fn recv(
                &mut self,
                this: &Arc<Automaton<Command>>,
                state: State,
                opcode: Opcode<Command, State>,
            ) -> State {
                match opcode {
                    Opcode::START => {
                        self.timer.schedule(
                            this.clone(),
                            TERMINATE,
                            Duration::from_millis(250),
                        );
                    }
                    Opcode::INPUT(TERMINATE) => {
                        this.drain();
                    }
                    _ => {}
                }
                state
            }
        }

        let event = Event::new();
        let guard = event.guard();
        let timer = Timer::spawn(guard.clone());
        let _ = Automaton::spawn(guard.clone(), Box::new(FSM { timer }));
        drop(guard);
        event.wait();
    }
}
