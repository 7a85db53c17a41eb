//! C code generation.
//!
//! Lowers an analyzed module to one C translation unit targeting
//! `rill_runtime.h`. The scheme:
//!
//! - Every scope with values becomes a struct of `Value` fields with a
//!   compile-time-constant initializer, plus a `ScopeFrame` registered with
//!   the runtime so the fields are GC roots (`statements.rs`).
//! - Allocating subexpressions are staged into `tmp_N` fields of their
//!   owning scope before the surrounding expression is built (`exprs.rs`).
//! - Each source function becomes a file-scope C function taking its
//!   closure environment and argument array; closure construction passes
//!   the captured cells so the runtime can uplift them (`program.rs`,
//!   `statements.rs`).
//!
//! # Module Structure
//!
//! - `state.rs`: the CodeGen struct and shared text helpers
//! - `exprs.rs`: expression lowering and temporary staging
//! - `statements.rs`: statements, blocks, frame structs
//! - `program.rs`: prototypes, function impls, `main`
//! - `error.rs`: error types

mod error;
mod exprs;
mod program;
mod state;
mod statements;

pub use error::CodeGenError;
pub use state::CodeGen;

use crate::ast::Module;

/// Generate the C translation unit for an analyzed module.
pub fn generate(module: &Module) -> Result<String, CodeGenError> {
    CodeGen::new(module).generate()
}
