//! Socket streams (§4.7): the second illustrative extension type — a
//! reactor-driven, blocking-on-write stream with a small state machine.
//!
//! State moves `Fresh -> Active[Registered] -> Closed` and never back
//! (§4.7 invariant). `close_socket` is the single internal entry point for
//! every transition to `Closed` — clean EOF, an unrecoverable write error,
//! and an explicit `(close socket)` call all route through it, so the
//! "sentinel fires exactly once" property is structural rather than a
//! convention three call sites have to each remember (§ supplemented
//! features, `original_source/src/sockets.c`).

use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{FromRawFd, IntoRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use wisp_core::header::CellFlags;
use wisp_core::types::{Cell, TypeDescriptor};
use wisp_core::value::{CellId, TypeCode};
use wisp_core::{Interpreter, LispError, Signal, Value};

use crate::reactor::Reactor;

pub const TYPE_NAME: &str = "socket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Fresh,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    TcpClient,
    TcpListener,
    UnixClient,
    UnixListener,
}

#[derive(Debug)]
pub struct Socket {
    fd: Option<RawFd>,
    kind: Kind,
    state: SocketState,
    /// Client role: called with incoming bytes as they arrive.
    sink: Option<Value>,
    /// Called exactly once, on the transition to `Closed`.
    sentinel: Option<Value>,
    /// Server role: called with a freshly accepted client socket.
    accept_callback: Option<Value>,
    type_code: TypeCode,
}

impl Socket {
    fn new(kind: Kind, type_code: TypeCode) -> Self {
        Self {
            fd: None,
            kind,
            state: SocketState::Fresh,
            sink: None,
            sentinel: None,
            accept_callback: None,
            type_code,
        }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn fd(&self) -> Option<RawFd> {
        self.fd
    }

    fn is_listener(&self) -> bool {
        matches!(self.kind, Kind::TcpListener | Kind::UnixListener)
    }
}

impl Cell for Socket {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn type_code(&self) -> TypeCode {
        self.type_code
    }
}

pub struct SocketDescriptor;

impl TypeDescriptor for SocketDescriptor {
    fn name(&self) -> &str {
        TYPE_NAME
    }

    fn print(&self, cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        let socket = cell.as_any().downcast_ref::<Socket>().expect("socket cell");
        write!(out, "#<socket {:?} {:?}>", socket.kind, socket.state)
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let socket = cell.as_any().downcast_ref::<Socket>().expect("socket cell");
        let mut out = SmallVec::new();
        out.extend(socket.sink);
        out.extend(socket.sentinel);
        out.extend(socket.accept_callback);
        out
    }

    /// Active sockets are roots even when nothing in the value graph
    /// points at them any more — they may still be doing I/O. Once
    /// `close_socket` clears `ACTIVE`, the cell collects normally like
    /// anything else (§4.7, §4.2a).
    fn extra_roots(&self, instances: &[(CellId, CellFlags)]) -> SmallVec<[CellId; 4]> {
        instances
            .iter()
            .filter(|(_, flags)| flags.contains(CellFlags::ACTIVE))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Defensive fd close only. By construction this only ever runs on an
    /// already-`Closed` socket (`extra_roots` keeps every `Active` one
    /// alive) — the sentinel has already fired via `close_socket`, and
    /// firing it again here isn't possible anyway (`on_reclaim` has no
    /// `&mut Interpreter` to apply it with).
    fn on_reclaim(&self, cell: &mut dyn Cell) {
        let socket = cell.as_any_mut().downcast_mut::<Socket>().expect("socket cell");
        if let Some(fd) = socket.fd.take() {
            unsafe {
                libc::close(fd);
            }
        }
        socket.state = SocketState::Closed;
    }

    fn putc(&self, cell: &mut dyn Cell, ch: char) -> Option<io::Result<()>> {
        let socket = cell.as_any_mut().downcast_mut::<Socket>().expect("socket cell");
        let fd = socket.fd?;
        let mut buf = [0u8; 4];
        let encoded = ch.encode_utf8(&mut buf);
        Some(blocking_write(fd, encoded.as_bytes()).map(|_| ()))
    }

    fn puts(&self, cell: &mut dyn Cell, bytes: &[u8], _is_interned: bool) -> Option<io::Result<usize>> {
        let socket = cell.as_any_mut().downcast_mut::<Socket>().expect("socket cell");
        let fd = socket.fd?;
        Some(blocking_write(fd, bytes))
    }
}

fn type_code(interp: &Interpreter) -> TypeCode {
    interp.registry.find_by_name(TYPE_NAME).expect("socket type registered")
}

pub fn install(interp: &mut Interpreter) {
    interp.register_type(Box::new(SocketDescriptor));
}

fn cell_id_of(interp: &Interpreter, value: Value, arg_index: usize) -> Result<CellId, Signal> {
    let tc = type_code(interp);
    value
        .as_cell_id()
        .filter(|id| interp.heap.is_live(*id) && interp.heap.type_code(*id) == tc)
        .ok_or_else(|| Signal::bad_arg(arg_index, value))
}

fn downcast_mut<'a>(interp: &'a mut Interpreter, id: CellId) -> &'a mut Socket {
    interp.heap.cell_mut(id).as_any_mut().downcast_mut::<Socket>().expect("socket cell")
}

fn downcast<'a>(interp: &'a Interpreter, id: CellId) -> &'a Socket {
    interp.heap.cell(id).as_any().downcast_ref::<Socket>().expect("socket cell")
}

fn alloc_fresh(interp: &mut Interpreter, kind: Kind) -> (CellId, TypeCode) {
    let tc = type_code(interp);
    let id = interp.heap.alloc(tc, Box::new(Socket::new(kind, tc)));
    (id, tc)
}

fn activate(interp: &mut Interpreter, id: CellId, fd: RawFd) -> Result<(), Signal> {
    set_nonblocking(fd).map_err(io_signal)?;
    let socket = downcast_mut(interp, id);
    socket.fd = Some(fd);
    socket.state = SocketState::Active;
    interp.heap.set_flags(id, CellFlags::ACTIVE);
    Ok(())
}

fn io_signal(err: io::Error) -> Signal {
    Signal::error(LispError::FileError { message: err.to_string() })
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn wait_writable(fd: RawFd) -> io::Result<()> {
    let mut write_set: libc::fd_set = unsafe { std::mem::zeroed() };
    unsafe {
        libc::FD_ZERO(&mut write_set);
        libc::FD_SET(fd, &mut write_set);
    }
    let ready = unsafe {
        libc::select(fd + 1, std::ptr::null_mut(), &mut write_set, std::ptr::null_mut(), std::ptr::null_mut())
    };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Write every byte, retrying through `select()` on `EWOULDBLOCK` rather
/// than spinning (§4.7 "blocking putc/puts via select()").
fn blocking_write(fd: RawFd, bytes: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < bytes.len() {
        let n = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr() as *const libc::c_void,
                (bytes.len() - written) as libc::size_t,
            )
        };
        if n >= 0 {
            written += n as usize;
            continue;
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            wait_writable(fd)?;
            continue;
        }
        return Err(err);
    }
    Ok(written)
}

/// Current lifecycle state of a socket value, or `None` if `value` is not
/// a live socket.
pub fn state_of(interp: &Interpreter, value: Value) -> Option<SocketState> {
    let tc = type_code(interp);
    let id = value.as_cell_id().filter(|id| interp.heap.is_live(*id) && interp.heap.type_code(*id) == tc)?;
    Some(downcast(interp, id).state)
}

/// Write bytes to a socket's underlying fd, blocking (via `select()`) until
/// every byte is accepted by the kernel. The direct Rust-level complement
/// to the `putc`/`puts` type hooks, for embedding code that is not driving
/// the write through the evaluator's stream protocol (§6).
pub fn write_bytes(interp: &mut Interpreter, socket: Value, bytes: &[u8]) -> Result<usize, Signal> {
    let id = cell_id_of(interp, socket, 1)?;
    let fd = downcast(interp, id).fd.ok_or_else(|| Signal::bad_arg(1, socket))?;
    blocking_write(fd, bytes).map_err(io_signal)
}

pub fn connect_tcp(interp: &mut Interpreter, host: &str, port: u16) -> Result<Value, Signal> {
    let stream = TcpStream::connect((host, port)).map_err(io_signal)?;
    let fd = stream.into_raw_fd();
    let (id, _) = alloc_fresh(interp, Kind::TcpClient);
    activate(interp, id, fd)?;
    Ok(Value::Ref(id))
}

pub fn connect_unix(interp: &mut Interpreter, path: &Path) -> Result<Value, Signal> {
    let stream = UnixStream::connect(path).map_err(io_signal)?;
    let fd = stream.into_raw_fd();
    let (id, _) = alloc_fresh(interp, Kind::UnixClient);
    activate(interp, id, fd)?;
    Ok(Value::Ref(id))
}

pub fn listen_tcp(interp: &mut Interpreter, host: &str, port: u16) -> Result<Value, Signal> {
    let listener = TcpListener::bind((host, port)).map_err(io_signal)?;
    let fd = listener.into_raw_fd();
    let (id, _) = alloc_fresh(interp, Kind::TcpListener);
    activate(interp, id, fd)?;
    Ok(Value::Ref(id))
}

pub fn listen_unix(interp: &mut Interpreter, path: &Path) -> Result<Value, Signal> {
    let listener = UnixListener::bind(path).map_err(io_signal)?;
    let fd = listener.into_raw_fd();
    let (id, _) = alloc_fresh(interp, Kind::UnixListener);
    activate(interp, id, fd)?;
    Ok(Value::Ref(id))
}

/// Install a client socket's data sink and watch it for readability.
pub fn install_sink(
    interp: &mut Interpreter,
    reactor: &mut Reactor,
    socket: Value,
    sink: Value,
) -> Result<(), Signal> {
    let id = cell_id_of(interp, socket, 1)?;
    let fd = downcast(interp, id).fd.ok_or_else(|| Signal::bad_arg(1, socket))?;
    downcast_mut(interp, id).sink = Some(sink);
    reactor.register_socket_drain(fd, id);
    interp.heap.set_flags(id, CellFlags::REGISTERED);
    Ok(())
}

pub fn install_sentinel(interp: &mut Interpreter, socket: Value, sentinel: Value) -> Result<(), Signal> {
    let id = cell_id_of(interp, socket, 1)?;
    downcast_mut(interp, id).sentinel = Some(sentinel);
    Ok(())
}

/// Install a listening socket's accept callback and watch it for incoming
/// connections.
pub fn install_accept_callback(
    interp: &mut Interpreter,
    reactor: &mut Reactor,
    socket: Value,
    callback: Value,
) -> Result<(), Signal> {
    let id = cell_id_of(interp, socket, 1)?;
    if !downcast(interp, id).is_listener() {
        return Err(Signal::bad_arg(1, socket));
    }
    let fd = downcast(interp, id).fd.ok_or_else(|| Signal::bad_arg(1, socket))?;
    downcast_mut(interp, id).accept_callback = Some(callback);
    reactor.register_socket_accept(fd, id);
    interp.heap.set_flags(id, CellFlags::REGISTERED);
    Ok(())
}

/// The single path to `Closed` (§ supplemented features). Idempotent: a
/// socket already `Closed` is left alone and the sentinel does not fire
/// again.
pub fn close_socket(interp: &mut Interpreter, id: CellId) -> Result<(), Signal> {
    let (fd, sentinel, already_closed) = {
        let socket = downcast_mut(interp, id);
        let already_closed = socket.state == SocketState::Closed;
        let fd = socket.fd.take();
        let sentinel = socket.sentinel;
        socket.state = SocketState::Closed;
        (fd, sentinel, already_closed)
    };
    interp.heap.clear_flags(id, CellFlags::ACTIVE | CellFlags::REGISTERED);
    if already_closed {
        return Ok(());
    }
    if let Some(fd) = fd {
        unsafe {
            libc::close(fd);
        }
    }
    if let Some(sentinel) = sentinel {
        interp.apply(sentinel, &[Value::Ref(id)], false)?;
    }
    Ok(())
}

pub fn close(interp: &mut Interpreter, socket: Value) -> Result<(), Signal> {
    let id = cell_id_of(interp, socket, 1)?;
    close_socket(interp, id)
}

/// Reactor callback for a readable client socket: drain available bytes to
/// the sink, or close on clean EOF (§4.7).
pub(crate) fn on_readable(interp: &mut Interpreter, reactor: &mut Reactor, id: CellId) -> Result<(), Signal> {
    let fd = match downcast(interp, id).fd {
        Some(fd) => fd,
        None => return Ok(()),
    };
    let mut buf = [0u8; 4096];
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len() as libc::size_t) };
    if n > 0 {
        let sink = downcast(interp, id).sink;
        if let Some(sink) = sink {
            let bytes: Vec<Value> = buf[..n as usize].iter().map(|b| Value::Int(*b as i64)).collect();
            let list = wisp_core::cons::vec_to_list(&mut interp.heap, interp.cons_type, interp.nil, &bytes);
            interp.apply(sink, &[Value::Ref(id), list], false)?;
        }
        return Ok(());
    }
    if n == 0 {
        reactor.deregister_input_fd(fd);
        return close_socket(interp, id);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        return Ok(());
    }
    reactor.deregister_input_fd(fd);
    close_socket(interp, id)
}

/// Reactor callback for a listening socket becoming acceptable: accept one
/// pending connection and hand it to the installed accept callback.
pub(crate) fn on_acceptable(interp: &mut Interpreter, _reactor: &mut Reactor, id: CellId) -> Result<(), Signal> {
    let (fd, kind) = {
        let socket = downcast(interp, id);
        (socket.fd, socket.kind)
    };
    let fd = match fd {
        Some(fd) => fd,
        None => return Ok(()),
    };

    let (client_fd, client_kind) = match kind {
        Kind::TcpListener => {
            let listener = unsafe { TcpListener::from_raw_fd(fd) };
            let accepted = listener.accept();
            let _ = listener.into_raw_fd();
            match accepted {
                Ok((stream, _)) => (stream.into_raw_fd(), Kind::TcpClient),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(io_signal(err)),
            }
        }
        Kind::UnixListener => {
            let listener = unsafe { UnixListener::from_raw_fd(fd) };
            let accepted = listener.accept();
            let _ = listener.into_raw_fd();
            match accepted {
                Ok((stream, _)) => (stream.into_raw_fd(), Kind::UnixClient),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(io_signal(err)),
            }
        }
        _ => return Ok(()),
    };

    let (client_id, _) = alloc_fresh(interp, client_kind);
    activate(interp, client_id, client_fd)?;
    let callback = downcast(interp, id).accept_callback;
    if let Some(callback) = callback {
        interp.apply(callback, &[Value::Ref(client_id)], false)?;
    }
    Ok(())
}
