//! Illustrative extension types built on `wisp-core`'s type-hook contract
//! (§4.6, §4.7): fixed-length vectors and a reactor-driven socket stream.
//!
//! Neither type needs anything beyond `wisp-core`'s public API — no
//! `unsafe` crosses the crate boundary except the raw fd plumbing a
//! blocking-write socket stream necessarily requires.

pub mod reactor;
pub mod socket;
pub mod vector;

use wisp_core::Interpreter;

pub use reactor::Reactor;

/// Register both extension types against `interp` and hand back a fresh
/// [`Reactor`] ready for `connect`/`listen` calls to register fds with.
pub fn install(interp: &mut Interpreter) -> Reactor {
    vector::install(interp);
    socket::install(interp);
    Reactor::new()
}
