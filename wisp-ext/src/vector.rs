//! Fixed-length vectors (§4.6): the first illustrative instance of the
//! type-hook contract — a container with O(1) indexed access and a
//! one-way freeze bit, built entirely on public `wisp_core` API.

use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use wisp_core::header::CellFlags;
use wisp_core::types::{Cell, CompareResult, TypeDescriptor};
use wisp_core::value::{CellId, TypeCode};
use wisp_core::{Interpreter, LispError, Signal, Value};

pub const TYPE_NAME: &str = "vector";

#[derive(Debug)]
pub struct Vector {
    elements: Vec<Value>,
    type_code: TypeCode,
}

impl Vector {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.elements
    }
}

impl Cell for Vector {
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

pub struct VectorDescriptor;

impl TypeDescriptor for VectorDescriptor {
    fn name(&self) -> &str {
        TYPE_NAME
    }

    fn compare(&self, a: &dyn Cell, b: &dyn Cell) -> CompareResult {
        let a = a.as_any().downcast_ref::<Vector>().expect("vector cell");
        let b = b.as_any().downcast_ref::<Vector>().expect("vector cell");
        if a.elements == b.elements {
            CompareResult::Order(std::cmp::Ordering::Equal)
        } else {
            CompareResult::Incomparable
        }
    }

    fn print(&self, cell: &dyn Cell, out: &mut dyn fmt::Write) -> fmt::Result {
        let vector = cell.as_any().downcast_ref::<Vector>().expect("vector cell");
        write!(out, "#(")?;
        for (i, element) in vector.elements.iter().enumerate() {
            if i > 0 {
                write!(out, " ")?;
            }
            write!(out, "{element}")?;
        }
        write!(out, ")")
    }

    fn children(&self, cell: &dyn Cell) -> SmallVec<[Value; 4]> {
        let vector = cell.as_any().downcast_ref::<Vector>().expect("vector cell");
        SmallVec::from_slice(&vector.elements)
    }
}

fn type_code(interp: &Interpreter) -> TypeCode {
    interp
        .registry
        .find_by_name(TYPE_NAME)
        .expect("vector type registered")
}

fn downcast<'a>(interp: &'a Interpreter, value: Value, arg_index: usize) -> Result<&'a Vector, Signal> {
    let tc = type_code(interp);
    let id = value
        .as_cell_id()
        .filter(|id| interp.heap.is_live(*id) && interp.heap.type_code(*id) == tc)
        .ok_or_else(|| Signal::bad_arg(arg_index, value))?;
    Ok(interp.heap.cell(id).as_any().downcast_ref::<Vector>().expect("vector cell"))
}

fn cell_id_of(interp: &Interpreter, value: Value, arg_index: usize) -> Result<CellId, Signal> {
    let tc = type_code(interp);
    value
        .as_cell_id()
        .filter(|id| interp.heap.is_live(*id) && interp.heap.type_code(*id) == tc)
        .ok_or_else(|| Signal::bad_arg(arg_index, value))
}

/// Register the vector type and its primitives against `interp`.
pub fn install(interp: &mut Interpreter) {
    let tc = interp.register_type(Box::new(VectorDescriptor));
    debug_assert_eq!(interp.registry.find_by_name(TYPE_NAME), Some(tc));

    interp.define_subr("make-vector", wisp_core::callable::Arity::V, prim_make_vector);
    interp.define_subr("vector", wisp_core::callable::Arity::V, prim_vector);
    interp.define_subr("vector?", wisp_core::callable::Arity::Fixed(1), prim_vector_p);
    interp.define_subr("vector-length", wisp_core::callable::Arity::Fixed(1), prim_vector_length);
    interp.define_subr("vector-ref", wisp_core::callable::Arity::Fixed(2), prim_vector_ref);
    interp.define_subr("vector-set!", wisp_core::callable::Arity::Fixed(3), prim_vector_set);
    interp.define_subr(
        "make-vector-immutable!",
        wisp_core::callable::Arity::Fixed(1),
        prim_freeze,
    );
    interp.define_subr("vector->list", wisp_core::callable::Arity::Fixed(1), prim_to_list);
    interp.define_subr("list->vector", wisp_core::callable::Arity::Fixed(1), prim_from_list);
    interp.define_subr("vector-map", wisp_core::callable::Arity::V, prim_vector_map);
    interp.define_subr("vector-for-each", wisp_core::callable::Arity::V, prim_vector_for_each);
    interp.define_subr("vector-compare", wisp_core::callable::Arity::Fixed(2), prim_vector_compare);
}

fn alloc_vector(interp: &mut Interpreter, elements: Vec<Value>) -> Value {
    let tc = type_code(interp);
    let id = interp.heap.alloc(tc, Box::new(Vector { elements, type_code: tc }));
    Value::Ref(id)
}

fn prim_make_vector(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let size = args.first().and_then(|v| v.as_int()).ok_or_else(|| Signal::bad_arg(1, args.first().copied().unwrap_or(interp.nil)))?;
    if size < 0 {
        return Err(Signal::bad_arg(1, args[0]));
    }
    let fill = args.get(1).copied().unwrap_or(interp.nil);
    Ok(alloc_vector(interp, vec![fill; size as usize]))
}

fn prim_vector(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(alloc_vector(interp, args.to_vec()))
}

fn prim_vector_p(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    Ok(if downcast(interp, args[0], 1).is_ok() { interp.t } else { interp.nil })
}

fn prim_vector_length(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let vector = downcast(interp, args[0], 1)?;
    Ok(Value::Int(vector.len() as i64))
}

fn prim_vector_ref(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let index = args[1].as_int().filter(|n| *n >= 0).ok_or_else(|| Signal::bad_arg(2, args[1]))?;
    let vector = downcast(interp, args[0], 1)?;
    vector
        .elements
        .get(index as usize)
        .copied()
        .ok_or_else(|| Signal::bad_arg(2, args[1]))
}

fn prim_vector_set(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let index = args[1].as_int().filter(|n| *n >= 0).ok_or_else(|| Signal::bad_arg(2, args[1]))?;
    let id = cell_id_of(interp, args[0], 1)?;
    if interp.heap.flags(id).contains(CellFlags::IMMUTABLE) {
        return Err(Signal::error(LispError::SettingConstant { value: args[0] }));
    }
    let vector = interp
        .heap
        .cell_mut(id)
        .as_any_mut()
        .downcast_mut::<Vector>()
        .expect("vector cell");
    let slot = vector
        .elements
        .get_mut(index as usize)
        .ok_or_else(|| Signal::bad_arg(2, args[1]))?;
    *slot = args[2];
    Ok(args[2])
}

fn prim_freeze(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let id = cell_id_of(interp, args[0], 1)?;
    interp.heap.set_flags(id, CellFlags::IMMUTABLE);
    Ok(args[0])
}

fn prim_to_list(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let elements = downcast(interp, args[0], 1)?.elements.clone();
    Ok(wisp_core::cons::vec_to_list(&mut interp.heap, interp.cons_type, interp.nil, &elements))
}

fn prim_from_list(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let elements = wisp_core::cons::list_to_vec(&interp.heap, interp.cons_type, interp.nil, args[0])
        .ok_or_else(|| Signal::bad_arg(1, args[0]))?;
    Ok(alloc_vector(interp, elements))
}

/// `vector-map` and `vector-for-each` both stop at the shortest vector
/// (§4.6 edge case), mirroring Scheme/rep's `N`-ary map convention.
fn collect_parallel(interp: &Interpreter, vectors: &[Value], first_arg_index: usize) -> Result<(usize, Vec<&Vector>), Signal> {
    let mut refs = Vec::with_capacity(vectors.len());
    for (i, v) in vectors.iter().enumerate() {
        refs.push(downcast(interp, *v, first_arg_index + i)?);
    }
    let shortest = refs.iter().map(|v| v.len()).min().unwrap_or(0);
    Ok((shortest, refs))
}

/// Each `interp.apply` below can trigger a GC cycle, and a reclaimed-but-
/// not-yet-consumed result would otherwise be reachable only from this
/// plain `Vec` — not from any root the collector walks. `guard` roots the
/// accumulator across the whole loop; each result is pushed onto it the
/// moment it's produced, before the next `apply` call can collect.
fn prim_vector_map(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let (fun, vectors) = args.split_first().ok_or_else(|| Signal::error(LispError::MissingArg { index: 1 }))?;
    let (shortest, refs) = collect_parallel(interp, vectors, 2)?;
    let rows: Vec<SmallVec<[Value; 4]>> = (0..shortest)
        .map(|i| refs.iter().map(|v| v.as_slice()[i]).collect())
        .collect();
    let mut results = Vec::with_capacity(shortest);
    let guard = interp.root_scope(&[]);
    for row in rows {
        let value = interp.apply(*fun, &row, false)?;
        guard.push(value);
        results.push(value);
    }
    Ok(alloc_vector(interp, results))
}

fn prim_vector_compare(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    use wisp_core::types::CompareResult;
    downcast(interp, args[0], 1)?;
    downcast(interp, args[1], 2)?;
    Ok(match interp.value_compare(args[0], args[1]) {
        CompareResult::Order(ordering) => Value::Int(match ordering {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }),
        CompareResult::Incomparable => interp.nil,
    })
}

fn prim_vector_for_each(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let (fun, vectors) = args.split_first().ok_or_else(|| Signal::error(LispError::MissingArg { index: 1 }))?;
    let (shortest, refs) = collect_parallel(interp, vectors, 2)?;
    let rows: Vec<SmallVec<[Value; 4]>> = (0..shortest)
        .map(|i| refs.iter().map(|v| v.as_slice()[i]).collect())
        .collect();
    for row in rows {
        interp.apply(*fun, &row, false)?;
    }
    Ok(interp.nil)
}

