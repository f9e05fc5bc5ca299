//! The `select()`-based reactor (§5, §6).
//!
//! Single-threaded and cooperative by design (§5 Non-goal: no
//! thread-parallel evaluation) — `accept_input_for_fds` is one blocking
//! `select()` call per invocation, not a background loop. A host program
//! drives the reactor itself by calling it repeatedly, the same shape as
//! librep's `main-loop` calling into `accept-input` between read/eval
//! steps; this crate doesn't own that outer loop (§2 external
//! collaborators).

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use wisp_core::value::CellId;
use wisp_core::{Interpreter, LispError, Signal, Value};

/// What to do when a watched fd becomes readable.
enum Action {
    /// Hand the fd to an arbitrary Lisp callback (`register-process-input-handler`).
    Lisp(Value),
    /// Drain a client socket's incoming bytes to its sink (§4.7).
    DrainSocket(CellId),
    /// Accept one pending connection on a listening socket (§4.7).
    AcceptSocket(CellId),
}

#[derive(Default)]
pub struct Reactor {
    handlers: HashMap<RawFd, Action>,
}

impl Reactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_input_fd(&mut self, fd: RawFd, handler: Value) {
        self.handlers.insert(fd, Action::Lisp(handler));
    }

    pub fn register_process_input_handler(&mut self, handler: Value) {
        self.register_input_fd(0, handler);
    }

    pub(crate) fn register_socket_drain(&mut self, fd: RawFd, socket: CellId) {
        self.handlers.insert(fd, Action::DrainSocket(socket));
    }

    pub(crate) fn register_socket_accept(&mut self, fd: RawFd, socket: CellId) {
        self.handlers.insert(fd, Action::AcceptSocket(socket));
    }

    pub fn deregister_input_fd(&mut self, fd: RawFd) {
        self.handlers.remove(&fd);
    }

    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.handlers.contains_key(&fd)
    }

    /// One `select()` pass. `timeout_ms` of `None` blocks indefinitely.
    /// Returns the number of handlers that fired.
    pub fn accept_input_for_fds(
        &mut self,
        interp: &mut Interpreter,
        timeout_ms: Option<i64>,
    ) -> Result<usize, Signal> {
        if self.handlers.is_empty() {
            return Ok(0);
        }

        let mut read_set: libc::fd_set = unsafe { std::mem::zeroed() };
        let mut max_fd: RawFd = 0;
        unsafe {
            libc::FD_ZERO(&mut read_set);
            for &fd in self.handlers.keys() {
                libc::FD_SET(fd, &mut read_set);
                max_fd = max_fd.max(fd);
            }
        }

        let mut storage;
        let timeout_ptr = match timeout_ms {
            Some(ms) => {
                storage = libc::timeval {
                    tv_sec: (ms / 1000) as libc::time_t,
                    tv_usec: ((ms % 1000) * 1000) as libc::suseconds_t,
                };
                &mut storage as *mut libc::timeval
            }
            None => std::ptr::null_mut(),
        };

        let ready = unsafe {
            libc::select(
                max_fd + 1,
                &mut read_set,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                timeout_ptr,
            )
        };
        if ready < 0 {
            return Err(Signal::error(LispError::Error {
                message: "select() failed".to_string(),
                irritants: vec![Value::Int(
                    std::io::Error::last_os_error().raw_os_error().unwrap_or(-1) as i64,
                )],
            }));
        }

        let ready_fds: Vec<RawFd> = self
            .handlers
            .keys()
            .copied()
            .filter(|&fd| unsafe { libc::FD_ISSET(fd, &read_set) })
            .collect();

        let mut triggered = 0;
        for fd in ready_fds {
            wisp_core::diagnostics::reactor_wakeup(fd, "readable");
            let action = match self.handlers.get(&fd) {
                Some(Action::Lisp(v)) => Some(Action::Lisp(*v)),
                Some(Action::DrainSocket(id)) => Some(Action::DrainSocket(*id)),
                Some(Action::AcceptSocket(id)) => Some(Action::AcceptSocket(*id)),
                None => None,
            };
            match action {
                Some(Action::Lisp(callback)) => {
                    interp.apply(callback, &[Value::Int(fd as i64)], false)?;
                    triggered += 1;
                }
                Some(Action::DrainSocket(id)) => {
                    crate::socket::on_readable(interp, self, id)?;
                    triggered += 1;
                }
                Some(Action::AcceptSocket(id)) => {
                    crate::socket::on_acceptable(interp, self, id)?;
                    triggered += 1;
                }
                None => {}
            }
        }
        Ok(triggered)
    }
}
