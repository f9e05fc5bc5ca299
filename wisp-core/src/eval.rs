//! A minimal evaluator over the apply engine (§4.3's lambda/closure path).
//!
//! This is not a language front end — there is no reader, and the special
//! form table below is the whole syntax this runtime understands natively.
//! Its job is to give `apply` something to call: a closure's body has to
//! be evaluated somehow, and that evaluation has to route back through
//! `apply` for every nested call so the call stack, depth limit, and
//! pending-exception slot stay accurate. Special forms are recognized by
//! symbol identity before their operands are evaluated, the traditional
//! split between "special form" and "applicable procedure" — unlike an
//! ordinary subr, a special form's unevaluated operands never pass through
//! `apply`, so it cannot be `funcall`ed as a value.

use crate::cons::{list_to_vec, Cons};
use crate::interpreter::Interpreter;
use crate::throw::{LispError, Signal};
use crate::types::Cell;
use crate::value::Value;

type Env = Vec<(Value, Value)>;

impl Interpreter {
    /// Evaluate one form in `env` (innermost lexical bindings last).
    pub fn eval(&mut self, form: Value, env: &mut Env, tail: bool) -> Result<Value, Signal> {
        match form {
            Value::Int(_) => Ok(form),
            Value::Ref(id) => {
                if !self.heap.is_live(id) {
                    return Ok(form);
                }
                let type_code = self.heap.type_code(id);
                if type_code == self.symbol_type {
                    self.eval_symbol(form, env)
                } else if type_code == self.cons_type {
                    self.eval_form(form, env, tail)
                } else {
                    Ok(form)
                }
            }
        }
    }

    fn eval_symbol(&mut self, symbol: Value, env: &Env) -> Result<Value, Signal> {
        if symbol == self.nil || symbol == self.t {
            return Ok(symbol);
        }
        if let Some((_, value)) = env.iter().rev().find(|(k, _)| *k == symbol) {
            return Ok(*value);
        }
        if let Some(value) = self.value_of(symbol) {
            return Ok(value);
        }
        let name = self.symbol_name(symbol).unwrap_or("?").to_string();
        Err(Signal::error(LispError::Error {
            message: format!("unbound variable: {name}"),
            irritants: vec![symbol],
        }))
    }

    fn eval_form(&mut self, form: Value, env: &mut Env, tail: bool) -> Result<Value, Signal> {
        let (head, rest) = self.uncons(form)?;
        if let Some(name) = self.symbol_name(head) {
            match name {
                "quote" => return self.sf_quote(rest),
                "if" => return self.sf_if(rest, env, tail),
                "lambda" => return self.sf_lambda(rest, env),
                "define" => return self.sf_define(rest, env),
                "progn" => return self.sf_progn(rest, env, tail),
                "setq" => return self.sf_setq(rest, env),
                "catch" => return self.sf_catch(rest, env),
                "throw" => return self.sf_throw(rest, env),
                _ => {}
            }
        }

        let callee = self.eval(head, env, false)?;
        let arg_forms = self.list_values(rest)?;
        let mut args = Vec::with_capacity(arg_forms.len());
        for arg_form in arg_forms {
            args.push(self.eval(arg_form, env, false)?);
        }
        self.apply(callee, &args, tail)
    }

    fn uncons(&self, form: Value) -> Result<(Value, Value), Signal> {
        let id = form.as_cell_id().filter(|id| self.heap.is_live(*id) && self.heap.type_code(*id) == self.cons_type);
        match id {
            Some(id) => {
                let cons = self.heap.cell(id).as_any().downcast_ref::<Cons>().expect("cons cell");
                Ok((cons.car, cons.cdr))
            }
            None => Err(Signal::error(LispError::Error {
                message: "improper form: expected a cons cell".to_string(),
                irritants: vec![form],
            })),
        }
    }

    fn list_values(&self, list: Value) -> Result<Vec<Value>, Signal> {
        list_to_vec(&self.heap, self.cons_type, self.nil, list).ok_or_else(|| {
            Signal::error(LispError::Error {
                message: "improper list".to_string(),
                irritants: vec![list],
            })
        })
    }

    fn sf_quote(&mut self, rest: Value) -> Result<Value, Signal> {
        let (form, _) = self.uncons(rest)?;
        Ok(form)
    }

    fn sf_if(&mut self, rest: Value, env: &mut Env, tail: bool) -> Result<Value, Signal> {
        let items = self.list_values(rest)?;
        if items.is_empty() {
            return Err(Signal::error(LispError::MissingArg { index: 1 }));
        }
        let test = self.eval(items[0], env, false)?;
        if self.is_true(test) {
            items
                .get(1)
                .map(|&form| self.eval(form, env, tail))
                .unwrap_or(Ok(self.nil))
        } else {
            let mut result = Ok(self.nil);
            for (i, &form) in items.iter().enumerate().skip(2) {
                let is_last = i + 1 == items.len();
                result = self.eval(form, env, is_last && tail);
            }
            result
        }
    }

    fn sf_lambda(&mut self, rest: Value, env: &Env) -> Result<Value, Signal> {
        let (params_form, body_form) = self.uncons(rest)?;
        let (params, rest_param) = self.parse_params(params_form)?;
        let body = self.list_values(body_form)?;
        let closure = crate::callable::Closure::new(params, rest_param, body, env.clone(), self.closure_type);
        let id = self.heap.alloc(self.closure_type, Box::new(closure));
        Ok(Value::Ref(id))
    }

    /// Parses a proper list of parameter symbols, or a dotted list whose
    /// tail symbol collects the remaining arguments (`(a b . rest)`).
    fn parse_params(&self, mut params_form: Value) -> Result<(Vec<Value>, Option<Value>), Signal> {
        let mut params = Vec::new();
        loop {
            if params_form == self.nil {
                return Ok((params, None));
            }
            match params_form.as_cell_id() {
                Some(id) if self.heap.is_live(id) && self.heap.type_code(id) == self.cons_type => {
                    let cons = self.heap.cell(id).as_any().downcast_ref::<Cons>().expect("cons cell");
                    params.push(cons.car);
                    params_form = cons.cdr;
                }
                _ => return Ok((params, Some(params_form))),
            }
        }
    }

    fn sf_define(&mut self, rest: Value, env: &mut Env) -> Result<Value, Signal> {
        let (target, rest) = self.uncons(rest)?;
        if target.as_cell_id().is_some_and(|id| self.heap.type_code(id) == self.cons_type) {
            // (define (name . params) . body) => (define name (lambda params . body))
            let (name, params) = self.uncons(target)?;
            let lambda_body = self.cons(params, rest);
            let lambda_sym = self.intern("lambda");
            let lambda_form = self.cons(lambda_sym, lambda_body);
            let value = self.eval(lambda_form, env, false)?;
            self.name_if_closure(value, name);
            self.set_value(name, value);
            return Ok(name);
        }
        let (value_form, _) = self.uncons(rest)?;
        let value = self.eval(value_form, env, false)?;
        self.name_if_closure(value, target);
        self.set_value(target, value);
        Ok(target)
    }

    fn name_if_closure(&mut self, value: Value, name: Value) {
        if let Some(id) = value.as_cell_id() {
            if self.heap.is_live(id) && self.heap.type_code(id) == self.closure_type {
                if let Some(closure) = self.heap.cell_mut(id).as_any_mut().downcast_mut::<crate::callable::Closure>() {
                    if closure.name.is_none() {
                        closure.name = Some(name);
                    }
                }
            }
        }
    }

    fn sf_progn(&mut self, rest: Value, env: &mut Env, tail: bool) -> Result<Value, Signal> {
        let items = self.list_values(rest)?;
        let mut result = Ok(self.nil);
        for (i, &form) in items.iter().enumerate() {
            let is_last = i + 1 == items.len();
            result = self.eval(form, env, is_last && tail);
            if result.is_err() {
                break;
            }
        }
        result
    }

    fn sf_setq(&mut self, rest: Value, env: &mut Env) -> Result<Value, Signal> {
        let (symbol, rest) = self.uncons(rest)?;
        let (value_form, _) = self.uncons(rest)?;
        let value = self.eval(value_form, env, false)?;
        if let Some(entry) = env.iter_mut().rev().find(|(k, _)| *k == symbol) {
            entry.1 = value;
        } else {
            self.set_value(symbol, value);
        }
        Ok(value)
    }

    fn sf_catch(&mut self, rest: Value, env: &mut Env) -> Result<Value, Signal> {
        let (tag_form, body_form) = self.uncons(rest)?;
        let tag = self.eval(tag_form, env, false)?;
        let body = self.list_values(body_form)?;
        let mut result = Ok(self.nil);
        for &form in &body {
            result = self.eval(form, env, false);
            if result.is_err() {
                break;
            }
        }
        match result {
            Err(Signal::Throw { tag: thrown_tag, value }) if thrown_tag == tag => {
                self.pending = None;
                Ok(value)
            }
            other => other,
        }
    }

    fn sf_throw(&mut self, rest: Value, env: &mut Env) -> Result<Value, Signal> {
        let (tag_form, rest) = self.uncons(rest)?;
        let tag = self.eval(tag_form, env, false)?;
        let value = match self.uncons(rest) {
            Ok((value_form, _)) => self.eval(value_form, env, false)?,
            Err(_) => self.nil,
        };
        Err(Signal::Throw { tag, value })
    }
}
