//! Scope-frame stack.
//!
//! Generated code allocates a `ScopeFrame` on the C stack for every executed
//! block that owns values and links it into a thread-local LIFO. The garbage
//! collector walks this list to find its roots; the error reporter walks it
//! to print the call trace; `return` unwinds it to the enclosing function's
//! caller.

use crate::value::Value;
use std::cell::Cell;
use std::ffi::c_char;
use std::ptr;

/// One executed block. `values` points at the block's scope struct in the
/// generated function (declarations first, then temporary slots), `length`
/// counts both. `funcframe` is the frame of the nearest enclosing function
/// body, used by `return` unwinding; `funcname` is non-null only on function
/// body frames and feeds the error trace.
#[repr(C)]
pub struct ScopeFrame {
    pub parent: *mut ScopeFrame,
    pub funcframe: *mut ScopeFrame,
    pub values: *mut Value,
    pub length: i64,
    pub funcname: *const c_char,
}

thread_local! {
    static CUR_SCOPE_FRAME: Cell<*mut ScopeFrame> = const { Cell::new(ptr::null_mut()) };
}

pub(crate) fn current_frame() -> *mut ScopeFrame {
    CUR_SCOPE_FRAME.with(Cell::get)
}

fn set_current_frame(frame: *mut ScopeFrame) {
    CUR_SCOPE_FRAME.with(|cur| cur.set(frame));
}

/// Push a frame. The caller initializes `values`, `length` and `funcname`;
/// `parent` and `funcframe` are fixed up here. A function body frame becomes
/// its own `funcframe`; any other frame inherits the enclosing one.
///
/// # Safety
/// `frame` must outlive every runtime call made until the matching
/// [`rill_pop_scope`] (generated code allocates it in the enclosing C block).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_push_scope(frame: *mut ScopeFrame, is_function: bool) {
    let cur = current_frame();
    unsafe {
        (*frame).parent = cur;
        (*frame).funcframe = if is_function {
            frame
        } else if cur.is_null() {
            ptr::null_mut()
        } else {
            (*cur).funcframe
        };
    }
    set_current_frame(frame);
}

/// Pop the top frame.
///
/// # Safety
/// The stack must be non-empty; only generated code balanced against
/// [`rill_push_scope`] may call this.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_pop_scope() {
    let cur = current_frame();
    debug_assert!(!cur.is_null(), "rill_pop_scope on empty scope stack");
    unsafe {
        set_current_frame((*cur).parent);
    }
}

/// Unwind for `return`: pop every frame down to, but not including, the
/// parent of the current function's body frame.
///
/// # Safety
/// Must only run inside a generated function body (so `funcframe` is
/// non-null).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rill_return_scope() {
    let cur = current_frame();
    debug_assert!(!cur.is_null(), "rill_return_scope outside any scope");
    unsafe {
        let funcframe = (*cur).funcframe;
        debug_assert!(!funcframe.is_null(), "rill_return_scope outside a function");
        set_current_frame((*funcframe).parent);
    }
}
