//! Mark-sweep collector tests.
//!
//! Liveness is observed through `rill_block_count`: every array, function
//! and uplifted cell occupies exactly one heap block. Tests run on their own
//! threads, so the thread-local heap starts empty in each.

use rill_runtime::frames::{ScopeFrame, rill_pop_scope, rill_push_scope};
use rill_runtime::heap::{rill_block_count, rill_collect_garbage};
use rill_runtime::ops::{rill_new_array, rill_new_function, rill_subscript, rill_truthy};
use rill_runtime::value::Value;
use std::ptr;

unsafe extern "C" fn return_null(_enclosed: *mut Value, _args: *const Value) -> Value {
    Value::NULL
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
fn test_unrooted_block_is_collected() {
    unsafe {
        let _ = rill_new_array(0, ptr::null());
        assert_eq!(rill_block_count(), 1);
        rill_collect_garbage();
        assert_eq!(rill_block_count(), 0);
    }
}

#[test]
fn test_rooted_block_survives_collection() {
    let mut locals = [Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 1);

    unsafe {
        rill_push_scope(&mut frame, false);
        *values = rill_new_array(0, ptr::null());

        rill_collect_garbage();
        assert_eq!(rill_block_count(), 1);

        rill_pop_scope();
        rill_collect_garbage();
        assert_eq!(rill_block_count(), 0);
    }
}

#[test]
fn test_array_elements_are_traced() {
    let mut locals = [Value::UNINITIALIZED, Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 2);

    unsafe {
        rill_push_scope(&mut frame, false);

        *values = rill_new_array(0, ptr::null());
        let inner = *values;
        *values.add(1) = rill_new_array(1, &inner);

        // Drop the direct root; the inner array stays reachable through the
        // outer one.
        *values = Value::NULL;
        rill_collect_garbage();
        assert_eq!(rill_block_count(), 2);

        rill_pop_scope();
        rill_collect_garbage();
        assert_eq!(rill_block_count(), 0);
    }
}

#[test]
fn test_closure_environment_is_traced() {
    let mut locals = [Value::UNINITIALIZED, Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 2);

    unsafe {
        rill_push_scope(&mut frame, false);

        *values = rill_new_array(0, ptr::null());
        let captures = [values];
        *values.add(1) =
            rill_new_function(return_null, 0, c"f".as_ptr(), 1, captures.as_ptr());

        // Blocks: the array, the uplifted cell, the function.
        assert_eq!(rill_block_count(), 3);

        // Remove the scope's reference; the chain function -> enclosed
        // reference -> cell -> array keeps everything alive.
        *values = Value::NULL;
        rill_collect_garbage();
        assert_eq!(rill_block_count(), 3);

        // Dropping the function frees the whole chain.
        *values.add(1) = Value::NULL;
        rill_collect_garbage();
        assert_eq!(rill_block_count(), 0);

        rill_pop_scope();
    }
}

#[test]
fn test_subscript_reads_and_writes_elements() {
    let mut locals = [Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 1);

    unsafe {
        rill_push_scope(&mut frame, false);

        let items = [Value::int(10), Value::int(20)];
        *values = rill_new_array(2, items.as_ptr());

        let slot = rill_subscript(1, *values, Value::int(1));
        assert_eq!((*slot).payload.bits, 20);

        *slot = Value::int(99);
        let slot = rill_subscript(1, *values, Value::int(1));
        assert_eq!((*slot).payload.bits, 99);

        rill_pop_scope();
    }
}

#[test]
fn test_truthiness() {
    let mut locals = [Value::UNINITIALIZED];
    let values = locals.as_mut_ptr();
    let mut frame = rooted_frame(values, 1);

    unsafe {
        rill_push_scope(&mut frame, false);

        assert!(!rill_truthy(Value::NULL));
        assert!(!rill_truthy(Value::bool(false)));
        assert!(rill_truthy(Value::bool(true)));
        assert!(!rill_truthy(Value::int(0)));
        assert!(rill_truthy(Value::int(-3)));
        assert!(!rill_truthy(Value::string(c"".as_ptr())));
        assert!(rill_truthy(Value::string(c"x".as_ptr())));

        *values = rill_new_array(0, ptr::null());
        assert!(!rill_truthy(*values));
        let item = Value::int(1);
        *values = rill_new_array(1, &item);
        assert!(rill_truthy(*values));

        rill_pop_scope();
    }
}
