//! The call stack (§4.3 steps 2–3, §6 backtraces).
//!
//! Every `apply` pushes a frame before evaluating the callee and pops it on
//! the way out, value or exception. Frames are also a root source for the
//! GC (§4.2's "call-stack chain"): a closure mid-call and its argument list
//! must stay alive even though nothing else points at them yet.

use crate::throw::Signal;
use crate::value::Value;
use smallvec::SmallVec;

/// One in-flight `apply`. `name` and `location` are best-effort, filled in
/// by `eval.rs` from whatever naming information the callee carries (a
/// bound symbol, a subr's registered name, or `None` for an anonymous
/// closure) — matching the original's backtrace, which also falls back to
/// `<anonymous>` when a closure was never bound to a symbol.
#[derive(Debug, Clone)]
pub struct Frame {
    pub function: Value,
    pub args: SmallVec<[Value; 4]>,
    pub name: Option<String>,
    pub location: Option<(String, u32)>,
    pub tail: bool,
}

impl Frame {
    pub fn new(function: Value, args: SmallVec<[Value; 4]>, tail: bool) -> Self {
        Self {
            function,
            args,
            name: None,
            location: None,
            tail,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some((file.into(), line));
        self
    }
}

/// Bounded call stack. `max_depth` is `Interpreter::max_lisp_depth` (§3
/// Invariants, default 250); exceeding it raises exactly the message in
/// §8 scenario 2.
pub struct CallStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Checked before the frame is pushed, per the original's
    /// increment-then-check-then-push order (§9 Design Note, `apply.c`).
    pub fn try_push(&mut self, frame: Frame) -> Result<(), Signal> {
        if self.frames.len() >= self.max_depth {
            return Err(Signal::depth_exceeded());
        }
        let warn_at = self.max_depth * 9 / 10;
        if self.frames.len() + 1 >= warn_at {
            tracing::warn!(
                depth = self.frames.len() + 1,
                max = self.max_depth,
                "apply depth crossed 90% of max-lisp-depth"
            );
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Every value reachable only through in-flight calls: the callee and
    /// argument list of each live frame.
    pub fn root_values(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.frames.len() * 2);
        for frame in &self.frames {
            out.push(frame.function);
            out.extend(frame.args.iter().copied());
        }
        out
    }

    /// Render a backtrace, innermost frame first, in the
    /// `#<index> name (args | ...) [at file:line]` shape named in §6.
    pub fn backtrace(&self) -> String {
        let mut out = String::new();
        for (index, frame) in self.frames.iter().rev().enumerate() {
            let name = frame.name.as_deref().unwrap_or("<anonymous>");
            out.push_str(&format!("#{index} {name} ("));
            for (i, arg) in frame.args.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&arg.to_string());
            }
            out.push(')');
            if let Some((file, line)) = &frame.location {
                out.push_str(&format!(" [at {file}:{line}]"));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use smallvec::smallvec;

    #[test]
    fn depth_limit_raises_exact_message() {
        let mut stack = CallStack::new(2);
        stack
            .try_push(Frame::new(Value::Int(0), smallvec![], false))
            .unwrap();
        stack
            .try_push(Frame::new(Value::Int(0), smallvec![], false))
            .unwrap();
        let err = stack
            .try_push(Frame::new(Value::Int(0), smallvec![], false))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "max-lisp-depth exceeded, possible infinite recursion?"
        );
    }

    #[test]
    fn backtrace_lists_innermost_first() {
        let mut stack = CallStack::new(10);
        stack
            .try_push(Frame::new(Value::Int(1), smallvec![Value::Int(1)], false).named("outer"))
            .unwrap();
        stack
            .try_push(Frame::new(Value::Int(2), smallvec![Value::Int(2)], true).named("inner"))
            .unwrap();
        let bt = stack.backtrace();
        let first_line = bt.lines().next().unwrap();
        assert!(first_line.starts_with("#0 inner"));
    }
}
