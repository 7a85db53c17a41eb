//! Unit tests for closure construction and uplift.
//!
//! These exercise the runtime pieces the compiler leans on for capture
//! semantics: uplift is idempotent, and a scope cell and a closure's
//! enclosed entry resolve to the same storage once the variable has been
//! uplifted.

use rill_runtime::frames::{ScopeFrame, rill_pop_scope, rill_push_scope};
use rill_runtime::ops::{rill_call, rill_check_var, rill_new_function, rill_uplift_var};
use rill_runtime::value::{RillFunction, TYX_REFERENCE, Value};
use std::ptr;

unsafe extern "C" fn return_null(_enclosed: *mut Value, _args: *const Value) -> Value {
    Value::NULL
}

unsafe extern "C" fn add_one(_enclosed: *mut Value, args: *const Value) -> Value {
    unsafe { Value::int((*args).payload.bits + 1) }
}

fn rooted_frame(values: *mut Value, length: i64) -> ScopeFrame {
    ScopeFrame {
        parent: ptr::null_mut(),
        funcframe: ptr::null_mut(),
        values,
        length,
        funcname: ptr::null(),
    }
}

#[test]
fn test_uplift_is_idempotent() {
    let mut locals = [Value::int(7)];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 1);

    unsafe {
        rill_push_scope(&mut frame, false);

        rill_uplift_var(values);
        assert_eq!((*values).tag, TYX_REFERENCE);
        let target = (*values).payload.cell;
        assert_eq!((*target).payload.bits, 7);

        // A second uplift must keep the same shared target.
        rill_uplift_var(values);
        assert_eq!((*values).payload.cell, target);

        rill_pop_scope();
    }
}

#[test]
fn test_scope_and_closure_share_one_cell() {
    let mut locals = [Value::int(1), Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 2);

    unsafe {
        rill_push_scope(&mut frame, false);

        let captures = [values];
        *values.add(1) =
            rill_new_function(return_null, 0, c"f".as_ptr(), 1, captures.as_ptr());

        // The scope cell was uplifted in place.
        assert_eq!((*values).tag, TYX_REFERENCE);

        let func = (*values.add(1)).payload.func;
        let enclosed = RillFunction::enclosed_ptr(func);
        assert_eq!((*enclosed).tag, TYX_REFERENCE);

        // Both sides resolve to the same storage.
        let scope_cell = rill_check_var(1, values, c"x".as_ptr());
        let closure_cell = rill_check_var(1, enclosed, c"x".as_ptr());
        assert_eq!(scope_cell, closure_cell);

        // An assignment through one side is visible through the other.
        *scope_cell = Value::int(42);
        assert_eq!((*closure_cell).payload.bits, 42);

        rill_pop_scope();
    }
}

#[test]
fn test_second_closure_shares_existing_uplift() {
    let mut locals = [Value::int(5), Value::UNINITIALIZED, Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 3);

    unsafe {
        rill_push_scope(&mut frame, false);

        let captures = [values];
        *values.add(1) =
            rill_new_function(return_null, 0, c"f".as_ptr(), 1, captures.as_ptr());
        let target = (*values).payload.cell;

        *values.add(2) =
            rill_new_function(return_null, 0, c"g".as_ptr(), 1, captures.as_ptr());

        let second = (*values.add(2)).payload.func;
        let enclosed = RillFunction::enclosed_ptr(second);
        assert_eq!((*enclosed).payload.cell, target);

        rill_pop_scope();
    }
}

#[test]
fn test_call_dispatches_with_arguments() {
    let mut locals = [Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 1);

    unsafe {
        rill_push_scope(&mut frame, false);

        *values = rill_new_function(add_one, 1, c"add-one".as_ptr(), 0, ptr::null());

        let args = [Value::int(41)];
        let result = rill_call(3, *values, 1, args.as_ptr());
        assert_eq!(result.tag, rill_runtime::value::TY_INT);
        assert_eq!(result.payload.bits, 42);

        rill_pop_scope();
    }
}
