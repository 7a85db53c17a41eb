//! Rill runtime: the library generated programs link against.
//!
//! The compiler lowers a Rill module to a C translation unit that includes
//! `rill_runtime.h` and links this crate's staticlib. Everything the
//! generated code touches goes through the `extern "C"` surface exported
//! here:
//!
//! - [`value`]: the tagged 16-byte `Value`, heap array and function objects
//! - [`frames`]: the scope-frame stack (GC roots, error traces, `return`)
//! - [`heap`]: heap blocks and the mark-sweep collector
//! - [`ops`]: checked variable access, calls, subscripts, construction,
//!   uplift, truthiness
//! - [`print`]: cycle-safe value printing
//! - [`error`]: fatal error reporting with a function trace
//!
//! The runtime is single-threaded by design: the current scope frame, the
//! heap block list and the print-frame stack are thread-local, and a
//! generated program only ever runs on its main thread.

pub mod error;
pub mod frames;
pub mod heap;
pub mod ops;
pub mod print;
pub mod value;

pub use frames::{ScopeFrame, rill_pop_scope, rill_push_scope, rill_return_scope};
pub use heap::{rill_block_count, rill_collect_garbage};
pub use ops::{
    rill_call, rill_check_type, rill_check_var, rill_new_array, rill_new_function,
    rill_subscript, rill_truthy, rill_undefined_var, rill_uplift_var,
};
pub use print::rill_print;
pub use value::{Payload, RillArray, RillFn, RillFunction, Value};
