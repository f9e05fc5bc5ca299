//! Thin tracing helpers shared by core and extension crates (§9 Design
//! Note: logging is ambient, not a feature any Non-goal scopes out).
//!
//! GC-cycle and apply-depth events are emitted directly from `gc.rs` and
//! `stack.rs` where the data already lives; the helpers here cover the
//! sites that don't have a natural home of their own — invariant
//! violations and the socket reactor's per-wakeup trace.

/// A core invariant was about to be violated and was instead turned into a
/// recoverable `Signal` (§7: "fatal-invariant-violation coercion point").
/// Always logged at `error` — this path should never be silent even though
/// the caller recovers from it.
pub fn invariant_violation(what: &str, detail: &str) {
    tracing::error!(invariant = what, detail, "invariant violation coerced to signal");
}

/// One reactor wakeup: a watched fd became ready for the named event.
pub fn reactor_wakeup(fd: i32, event: &str) {
    tracing::trace!(fd, event, "reactor wakeup");
}
