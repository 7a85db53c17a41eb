//! CodeGen state and shared emission helpers.

use crate::ast::{DeclId, DeclKind, Module, ScopeId};
use std::fmt::Write as _;

use super::CodeGenError;

pub struct CodeGen<'a> {
    pub(super) module: &'a Module,
    pub(super) output: String,
    pub(super) level: usize,
    /// Function whose body is being emitted; `None` while emitting `main`.
    pub(super) cur_func: Option<DeclId>,
}

impl<'a> CodeGen<'a> {
    pub fn new(module: &'a Module) -> Self {
        CodeGen {
            module,
            output: String::new(),
            level: 0,
            cur_func: None,
        }
    }

    /// Write one indented line of C.
    pub(super) fn line(&mut self, text: &str) -> Result<(), CodeGenError> {
        for _ in 0..self.level {
            self.output.push('\t');
        }
        writeln!(&mut self.output, "{}", text)?;
        Ok(())
    }

    pub(super) fn blank(&mut self) {
        self.output.push('\n');
    }

    pub(super) fn decl_name(&self, decl: DeclId) -> &str {
        self.module.name(self.module.decl(decl).name)
    }

    /// Frame struct member holding the declaration's cell.
    pub(super) fn member(&self, decl: DeclId) -> String {
        format!(
            "scope{}.m_{}",
            self.module.decl(decl).scope.0,
            self.decl_name(decl)
        )
    }

    /// C symbol of the generated function for a function declaration.
    pub(super) fn func_c_name(&self, decl: DeclId) -> String {
        let DeclKind::Func { func_id, .. } = &self.module.decl(decl).kind else {
            unreachable!("func_c_name on a non-function declaration");
        };
        format!("func{}_{}", func_id, self.decl_name(decl))
    }

    /// Index of `decl` in the current function's enclosed array, if captured.
    pub(super) fn capture_index(&self, decl: DeclId) -> Option<usize> {
        let func = self.cur_func?;
        let DeclKind::Func { captures, .. } = &self.module.decl(func).kind else {
            unreachable!();
        };
        captures.iter().position(|&c| c == decl)
    }

    /// Whether a reference from `ref_scope` must resolve through
    /// `rill_check_var`: the cell may have been uplifted, or it may still be
    /// uninitialized when another function reads it early.
    pub(super) fn needs_check(&self, decl: DeclId, ref_scope: ScopeId) -> bool {
        let decl = self.module.decl(decl);
        if decl.is_captured {
            return true;
        }
        decl.init_deferred
            && self.module.scope(decl.scope).hosting_func
                != self.module.scope(ref_scope).hosting_func
    }
}

/// Quote text as a C string literal.
pub(super) fn c_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render an integer as a C constant. `i64::MIN` has no literal form in C,
/// so it is spelled as an expression.
pub(super) fn c_int(value: i64) -> String {
    if value == i64::MIN {
        "(-9223372036854775807 - 1)".to_string()
    } else {
        value.to_string()
    }
}
