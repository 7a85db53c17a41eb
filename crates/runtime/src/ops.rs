//! Primitive operations called by generated code.
//!
//! These are the only entry points generated programs use to touch values:
//! checked variable access, type checks for arithmetic, calls, subscripts,
//! array and function construction, truthiness, and uplift.
//!
//! All of them either return normally or terminate the process through
//! [`crate::error::fatal`]; no error state crosses the FFI boundary.

use crate::error::{display_cstr, fatal};
use crate::heap::mem_alloc;
use crate::value::{
    TY_ARRAY, TY_FUNCTION, TY_INT, TY_STRING, TYX_REFERENCE, TYX_UNINITIALIZED, RillArray,
    RillFn, RillFunction, Value,
};
use std::ffi::c_char;
use std::mem;
use std::ptr;

/// Resolve a frame cell for reading or assignment.
///
/// Follows an uplifted cell to its shared heap target, then fails if the
/// storage is still uninitialized (the declaration has not executed yet).
/// Returns a pointer to the live storage so the same helper serves both
/// sides of an assignment.
///
/// # Safety
/// `cell` must point at a live frame cell; `name` must be a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_check_var(
    line: i64,
    cell: *mut Value,
    name: *const c_char,
) -> *mut Value {
    unsafe {
        let mut cell = cell;
        if (*cell).tag == TYX_REFERENCE {
            cell = (*cell).payload.cell;
        }
        if (*cell).tag == TYX_UNINITIALIZED {
            fatal(line, &format!("name {} is not defined", display_cstr(name)));
        }
        cell
    }
}

/// Lowering of a name that did not resolve at compile time. Never returns;
/// the pointer return type lets the call site stand in for an l-value.
///
/// # Safety
/// `name` must be a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_undefined_var(line: i64, name: *const c_char) -> *mut Value {
    unsafe { fatal(line, &format!("name {} is not defined", display_cstr(name))) }
}

/// Range-check a value's tag, returning the value unchanged. The `BINOP`
/// and `INT_UNARY` macros use the `TY_NULL..=TY_INT` range: null, bool and
/// int all carry their payload in `bits`.
#[unsafe(no_mangle)]
pub extern "C" fn rill_check_type(line: i64, min_tag: i64, max_tag: i64, value: Value) -> Value {
    if value.tag < min_tag || value.tag > max_tag {
        fatal(line, "wrong type");
    }
    value
}

/// Call a value. Verifies callability and arity, then dispatches to the
/// generated function with the closure environment and the argument array.
///
/// # Safety
/// `args` must point at `argcount` valid values (null is allowed when
/// `argcount` is 0).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_call(
    line: i64,
    callee: Value,
    argcount: i64,
    args: *const Value,
) -> Value {
    if callee.tag == TYX_UNINITIALIZED {
        fatal(line, "function is not yet initialized");
    }
    if callee.tag != TY_FUNCTION {
        fatal(line, "callee is not callable");
    }

    unsafe {
        let func = callee.payload.func;
        if (*func).arity != argcount {
            fatal(
                line,
                &format!(
                    "callee needs {} arguments but got {}",
                    (*func).arity,
                    argcount
                ),
            );
        }
        ((*func).fn_ptr)(RillFunction::enclosed_ptr(func), args)
    }
}

/// Subscript an array, returning a pointer to the element so the result is
/// an l-value.
///
/// # Safety
/// If `array` carries the array tag its payload must point at a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_subscript(line: i64, array: Value, index: Value) -> *mut Value {
    if array.tag != TY_ARRAY {
        fatal(line, "this is not an array");
    }
    if index.tag != TY_INT {
        fatal(line, "subscript index is not an integer");
    }

    unsafe {
        let array = array.payload.array;
        let index = index.payload.bits;
        if index < 0 || index >= (*array).length {
            fatal(line, "array index out of range");
        }
        RillArray::items_ptr(array).add(index as usize)
    }
}

/// Allocate an array of `length` items copied from `items`. The caller must
/// keep the items' heap objects rooted (generated code stages them in scope
/// temporary slots) because the allocation runs a collection.
///
/// # Safety
/// `items` must point at `length` valid values (null allowed for length 0).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_new_array(length: i64, items: *const Value) -> Value {
    unsafe {
        let size = mem::size_of::<RillArray>() + length as usize * mem::size_of::<Value>();
        let array = mem_alloc(size).cast::<RillArray>();
        (*array).length = length;
        if length > 0 {
            ptr::copy_nonoverlapping(items, RillArray::items_ptr(array), length as usize);
        }
        Value::array(array)
    }
}

/// Uplift a frame cell in place: replace a direct value with a reference to
/// a heap cell holding the original contents. Idempotent; an already
/// uplifted cell is left untouched so every party keeps sharing the same
/// target.
///
/// # Safety
/// `cell` must point at a live, GC-rooted frame cell.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_uplift_var(cell: *mut Value) {
    unsafe {
        if (*cell).tag == TYX_REFERENCE {
            return;
        }
        let target = mem_alloc(mem::size_of::<Value>()).cast::<Value>();
        *target = *cell;
        *cell = Value::reference(target);
    }
}

/// Construct a function value. Each captured cell is uplifted first, then
/// the resulting reference is copied into the function's enclosed array, so
/// the defining scope and the closure share one mutable target per capture.
///
/// # Safety
/// `captures` must point at `capture_count` pointers to live, GC-rooted
/// frame cells; `name` must be a C string literal living for the program.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_new_function(
    fn_ptr: RillFn,
    arity: i64,
    name: *const c_char,
    capture_count: i64,
    captures: *const *mut Value,
) -> Value {
    unsafe {
        for i in 0..capture_count {
            rill_uplift_var(*captures.add(i as usize));
        }

        let size = mem::size_of::<RillFunction>() + capture_count as usize * mem::size_of::<Value>();
        let func = mem_alloc(size).cast::<RillFunction>();
        (*func).fn_ptr = fn_ptr;
        (*func).arity = arity;
        (*func).name = name;
        (*func).capture_count = capture_count;

        let enclosed = RillFunction::enclosed_ptr(func);
        for i in 0..capture_count {
            *enclosed.add(i as usize) = **captures.add(i as usize);
        }

        Value::function(func)
    }
}

/// Truthiness: empty strings and arrays are false, functions are true,
/// null/bool/int test their integer payload.
///
/// # Safety
/// String and array payloads must point at live data.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_truthy(value: Value) -> bool {
    unsafe {
        match value.tag {
            TY_STRING => *value.payload.string != 0,
            TY_ARRAY => (*value.payload.array).length != 0,
            TY_FUNCTION => true,
            _ => value.payload.bits != 0,
        }
    }
}
