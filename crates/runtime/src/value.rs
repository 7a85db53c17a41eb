//! Tagged value representation shared with generated code.
//!
//! Every Rill value is a 16-byte `Value`: an `i64` tag followed by an 8-byte
//! payload union. The layout mirrors `struct Value` in `rill_runtime.h`
//! exactly; generated C constructs values with static initializers and the
//! runtime reads them back through the union accessors here.
//!
//! Two tags are internal and never user-observable:
//! - `TYX_UNINITIALIZED` marks frame cells before their declaration has
//!   executed (read through [`crate::ops::rill_check_var`]).
//! - `TYX_REFERENCE` marks an uplifted cell: the payload points at a
//!   heap-allocated `Value` shared between a scope and the closures that
//!   captured it.

use std::ffi::c_char;

pub const TY_NULL: i64 = 0;
pub const TY_BOOL: i64 = 1;
pub const TY_INT: i64 = 2;
pub const TY_STRING: i64 = 3;
pub const TY_ARRAY: i64 = 4;
pub const TY_FUNCTION: i64 = 5;
pub const TYX_UNINITIALIZED: i64 = 6;
pub const TYX_REFERENCE: i64 = 7;

/// Signature of a generated function: the closure environment followed by
/// the argument array. Arity is validated by [`crate::ops::rill_call`]
/// before dispatch.
pub type RillFn = unsafe extern "C" fn(enclosed: *mut Value, args: *const Value) -> Value;

#[repr(C)]
#[derive(Clone, Copy)]
pub union Payload {
    pub bits: i64,
    pub string: *const c_char,
    pub array: *mut RillArray,
    pub func: *mut RillFunction,
    pub cell: *mut Value,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct Value {
    pub tag: i64,
    pub payload: Payload,
}

impl Value {
    pub const NULL: Value = Value {
        tag: TY_NULL,
        payload: Payload { bits: 0 },
    };

    pub const UNINITIALIZED: Value = Value {
        tag: TYX_UNINITIALIZED,
        payload: Payload { bits: 0 },
    };

    pub fn int(value: i64) -> Value {
        Value {
            tag: TY_INT,
            payload: Payload { bits: value },
        }
    }

    pub fn bool(value: bool) -> Value {
        Value {
            tag: TY_BOOL,
            payload: Payload {
                bits: i64::from(value),
            },
        }
    }

    pub fn string(text: *const c_char) -> Value {
        Value {
            tag: TY_STRING,
            payload: Payload { string: text },
        }
    }

    pub(crate) fn array(array: *mut RillArray) -> Value {
        Value {
            tag: TY_ARRAY,
            payload: Payload { array },
        }
    }

    pub(crate) fn function(func: *mut RillFunction) -> Value {
        Value {
            tag: TY_FUNCTION,
            payload: Payload { func },
        }
    }

    pub(crate) fn reference(cell: *mut Value) -> Value {
        Value {
            tag: TYX_REFERENCE,
            payload: Payload { cell },
        }
    }
}

/// Heap array object. Allocated with its items inline; `items` is a
/// flexible-array stand-in, the real storage follows the header.
#[repr(C)]
pub struct RillArray {
    pub length: i64,
    pub items: [Value; 0],
}

impl RillArray {
    /// Pointer to the first item.
    ///
    /// # Safety
    /// `this` must point at a live `RillArray` allocated by
    /// [`crate::ops::rill_new_array`].
    pub unsafe fn items_ptr(this: *mut RillArray) -> *mut Value {
        unsafe { (&raw mut (*this).items).cast::<Value>() }
    }

    /// Read item `index` without a bounds check.
    ///
    /// # Safety
    /// `this` must be live and `index` in `0..length`.
    pub unsafe fn item(this: *mut RillArray, index: i64) -> Value {
        unsafe { *RillArray::items_ptr(this).add(index as usize) }
    }
}

/// Heap function object. The captured environment is stored inline after the
/// header; every entry is a `TYX_REFERENCE` value installed by uplift.
#[repr(C)]
pub struct RillFunction {
    pub fn_ptr: RillFn,
    pub arity: i64,
    pub name: *const c_char,
    pub capture_count: i64,
    pub enclosed: [Value; 0],
}

impl RillFunction {
    /// Pointer to the first enclosed cell.
    ///
    /// # Safety
    /// `this` must point at a live `RillFunction`.
    pub unsafe fn enclosed_ptr(this: *mut RillFunction) -> *mut Value {
        unsafe { (&raw mut (*this).enclosed).cast::<Value>() }
    }
}
