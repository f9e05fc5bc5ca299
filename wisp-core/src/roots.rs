//! Scoped GC roots (§4.2, §6; Design Note 3 in §9).
//!
//! The original's `rep_PUSHGC`/`rep_POPGC` are a manually-paired macro
//! discipline: forget the pop and the value silently outlives its scope as
//! a leak (harmless) or, worse, forget the push and a live reference gets
//! swept out from under you. Here the pop is a `Drop` impl, so a scope's
//! roots are released exactly when the scope ends, including on an early
//! return through `?`.

use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared root table. Cheap to clone (an `Rc` bump); the interpreter keeps
/// one and hands out guards as nested scopes need to protect values that
/// are not yet reachable from any other root (freshly allocated locals
/// mid-computation, before they are stored anywhere the mark phase would
/// otherwise find them).
#[derive(Clone)]
pub struct Roots(Rc<RefCell<Vec<Value>>>);

impl Roots {
    pub fn new() -> Self {
        Roots(Rc::new(RefCell::new(Vec::new())))
    }

    /// Push a scope rooting `values`, returning a guard that pops them (and
    /// anything pushed onto the guard afterward) when dropped.
    pub fn scope(&self, values: &[Value]) -> RootGuard {
        let start = {
            let mut stack = self.0.borrow_mut();
            let start = stack.len();
            stack.extend_from_slice(values);
            start
        };
        RootGuard {
            roots: self.clone(),
            start,
        }
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }
}

impl Default for Roots {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one root scope. Additional values can be pushed onto the
/// same scope with [`RootGuard::push`] (e.g. a `cons` building up its car
/// before its cdr is evaluated).
pub struct RootGuard {
    roots: Roots,
    start: usize,
}

impl RootGuard {
    pub fn push(&self, value: Value) {
        self.roots.0.borrow_mut().push(value);
    }
}

impl Drop for RootGuard {
    fn drop(&mut self) {
        self.roots.0.borrow_mut().truncate(self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellId;

    #[test]
    fn scope_pops_on_drop() {
        let roots = Roots::new();
        {
            let guard = roots.scope(&[Value::Ref(CellId(0))]);
            guard.push(Value::Ref(CellId(1)));
            assert_eq!(roots.snapshot().len(), 2);
        }
        assert_eq!(roots.snapshot().len(), 0);
    }

    #[test]
    fn nested_scopes_are_independent() {
        let roots = Roots::new();
        let outer = roots.scope(&[Value::Ref(CellId(0))]);
        {
            let _inner = roots.scope(&[Value::Ref(CellId(1)), Value::Ref(CellId(2))]);
            assert_eq!(roots.snapshot().len(), 3);
        }
        assert_eq!(roots.snapshot().len(), 1);
        drop(outer);
        assert_eq!(roots.snapshot().len(), 0);
    }
}
