//! Socket stream state machine and blocking-write behavior (§4.7), driven
//! over Unix-domain sockets so the suite needs no network port allocation.

use std::io::Read;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicUsize, Ordering};

use wisp_core::Interpreter;
use wisp_ext::socket::{self, SocketState};

static SENTINEL_CALLS: AtomicUsize = AtomicUsize::new(0);

fn count_sentinel(_interp: &mut Interpreter, _args: &[wisp_core::Value]) -> Result<wisp_core::Value, wisp_core::Signal> {
    SENTINEL_CALLS.fetch_add(1, Ordering::SeqCst);
    Ok(wisp_core::Value::Int(0))
}

#[test]
fn connect_writes_bytes_a_real_listener_receives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wisp.sock");
    let listener = UnixListener::bind(&path).unwrap();

    let mut interp = Interpreter::new();
    let client = socket::connect_unix(&mut interp, &path).expect("connect");
    assert_eq!(socket::state_of(&interp, client), Some(SocketState::Active));

    let (mut server_side, _) = listener.accept().unwrap();

    let n = socket::write_bytes(&mut interp, client, b"hello wisp").expect("write");
    assert_eq!(n, b"hello wisp".len());

    let mut buf = [0u8; 32];
    let read = server_side.read(&mut buf).unwrap();
    assert_eq!(&buf[..read], b"hello wisp");
}

#[test]
fn close_fires_sentinel_exactly_once_and_is_idempotent() {
    SENTINEL_CALLS.store(0, Ordering::SeqCst);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wisp.sock");
    let _listener = UnixListener::bind(&path).unwrap();

    let mut interp = Interpreter::new();
    let client = socket::connect_unix(&mut interp, &path).expect("connect");

    interp.define_subr("test-sentinel", wisp_core::callable::Arity::Fixed(1), count_sentinel);
    let sentinel_sym = interp.intern("test-sentinel");
    let sentinel_fn = interp.function_of(sentinel_sym).unwrap();
    socket::install_sentinel(&mut interp, client, sentinel_fn).unwrap();

    assert_eq!(socket::state_of(&interp, client), Some(SocketState::Active));

    socket::close(&mut interp, client).unwrap();
    assert_eq!(socket::state_of(&interp, client), Some(SocketState::Closed));
    assert_eq!(SENTINEL_CALLS.load(Ordering::SeqCst), 1);

    // Closing an already-closed socket is a no-op, not a second sentinel call.
    socket::close(&mut interp, client).unwrap();
    assert_eq!(SENTINEL_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn listen_accept_and_drain_round_trip_through_the_reactor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wisp.sock");

    let mut interp = Interpreter::new();
    let mut reactor = wisp_ext::Reactor::new();

    let server = socket::listen_unix(&mut interp, &path).expect("listen");
    assert_eq!(socket::state_of(&interp, server), Some(SocketState::Active));

    interp.define_subr("test-sentinel", wisp_core::callable::Arity::Fixed(1), count_sentinel);
    let sentinel_sym = interp.intern("test-sentinel");
    let accept_cb = interp.function_of(sentinel_sym).unwrap();
    socket::install_accept_callback(&mut interp, &mut reactor, server, accept_cb).unwrap();

    let client = UnixStream::connect(&path).unwrap();

    SENTINEL_CALLS.store(0, Ordering::SeqCst);
    let fired = reactor.accept_input_for_fds(&mut interp, Some(1000)).expect("select");
    assert_eq!(fired, 1);
    assert_eq!(SENTINEL_CALLS.load(Ordering::SeqCst), 1);

    drop(client);
}
