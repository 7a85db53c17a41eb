//! Expression lowering and temporary staging.
//!
//! Expressions lower to C expression text; any subexpression that allocates
//! (a call or an array literal) is first staged into a `tmp_N` slot of its
//! owning scope with [`CodeGen::emit_tmp_assigns`], in post-order, so every
//! in-flight allocation is a GC root. The expression text then refers to the
//! staged slot by name.

use crate::ast::{Expr, ExprKind, OpLevel, ScopeId};
use crate::lexer::punct_display;

use super::state::{c_int, c_quote};
use super::{CodeGen, CodeGenError};

impl<'a> CodeGen<'a> {
    /// The staged slot an allocating expression was assigned to.
    fn tmp_ref(&self, expr: &Expr) -> String {
        format!("scope{}.tmp_{}", expr.scope.0, expr.tmp_id)
    }

    /// C l-value for a variable reference.
    ///
    /// Unresolved names become an unconditional runtime error call. A
    /// captured outer variable resolves through the current function's
    /// `enclosed` array. Everything else is a direct frame member, wrapped
    /// in `rill_check_var` when the cell may be uplifted or read before
    /// initialization.
    fn var_access(
        &self,
        line: u32,
        decl: Option<crate::ast::DeclId>,
        name: &str,
        ref_scope: ScopeId,
    ) -> String {
        let Some(decl) = decl else {
            return format!("(*rill_undefined_var({}, {}))", line, c_quote(name));
        };

        if let Some(index) = self.capture_index(decl) {
            return format!(
                "(*rill_check_var({}, &enclosed[{}], {}))",
                line,
                index,
                c_quote(name)
            );
        }

        let member = self.member(decl);
        if self.needs_check(decl, ref_scope) {
            format!("(*rill_check_var({}, &{}, {}))", line, member, c_quote(name))
        } else {
            member
        }
    }

    /// Lower an expression to C text. Staging for contained calls and
    /// arrays must already have been emitted.
    pub(super) fn emit_expr(&self, expr: &Expr) -> String {
        let line = expr.span.line;
        match &expr.kind {
            ExprKind::Null => "NULL_VALUE".to_string(),
            ExprKind::Bool(b) => format!("BOOL_VALUE({})", i32::from(*b)),
            ExprKind::Int(v) => format!("INT_VALUE({})", c_int(*v)),
            ExprKind::Str(s) => format!("STRING_VALUE({})", c_quote(s)),
            ExprKind::Var { name, decl } => self.var_access(
                line,
                *decl,
                self.module.interner.resolve(*name),
                expr.scope,
            ),
            ExprKind::Unary { op, sub } => format!(
                "INT_UNARY({}, {}, {})",
                line,
                punct_display(*op),
                self.emit_expr(sub)
            ),
            ExprKind::Binary {
                op,
                level,
                left,
                right,
            } => {
                let result_tag = match level {
                    OpLevel::Cmp => "TY_BOOL",
                    _ => "TY_INT",
                };
                format!(
                    "BINOP({}, {}, {}, {}, {})",
                    line,
                    result_tag,
                    self.emit_expr(left),
                    punct_display(*op),
                    self.emit_expr(right)
                )
            }
            ExprKind::Call { .. } | ExprKind::Array { .. } => self.tmp_ref(expr),
            ExprKind::Subscript { array, index } => format!(
                "(*rill_subscript({}, {}, {}))",
                line,
                self.emit_expr(array),
                self.emit_expr(index)
            ),
        }
    }

    /// Lower a call expression to its `rill_call` invocation. Used both for
    /// staged calls and for statement-position calls, whose result is
    /// discarded and which therefore have no slot of their own.
    pub(super) fn emit_call(&self, expr: &Expr) -> String {
        let ExprKind::Call { callee, args } = &expr.kind else {
            unreachable!("emit_call on a non-call expression");
        };

        let args_text = if args.is_empty() {
            "0".to_string()
        } else {
            let items: Vec<String> = args.iter().map(|arg| self.emit_expr(arg)).collect();
            format!("(Value[]){{{}}}", items.join(", "))
        };

        format!(
            "rill_call({}, {}, {}, {})",
            expr.span.line,
            self.emit_expr(callee),
            args.len(),
            args_text
        )
    }

    fn emit_new_array(&self, expr: &Expr) -> String {
        let ExprKind::Array { items } = &expr.kind else {
            unreachable!("emit_new_array on a non-array expression");
        };

        if items.is_empty() {
            return "rill_new_array(0, 0)".to_string();
        }
        let texts: Vec<String> = items.iter().map(|item| self.emit_expr(item)).collect();
        format!(
            "rill_new_array({}, (Value[]){{{}}})",
            items.len(),
            texts.join(", ")
        )
    }

    /// Emit staging assignments for every allocating subexpression, in
    /// post-order: inner allocations are staged before the expressions that
    /// consume them.
    pub(super) fn emit_tmp_assigns(&mut self, expr: &Expr) -> Result<(), CodeGenError> {
        if !expr.has_tmps {
            return Ok(());
        }

        match &expr.kind {
            ExprKind::Unary { sub, .. } => self.emit_tmp_assigns(sub)?,
            ExprKind::Binary { left, right, .. } => {
                self.emit_tmp_assigns(left)?;
                self.emit_tmp_assigns(right)?;
            }
            ExprKind::Subscript { array, index } => {
                self.emit_tmp_assigns(array)?;
                self.emit_tmp_assigns(index)?;
            }
            ExprKind::Call { callee, args } => {
                self.emit_tmp_assigns(callee)?;
                for arg in args {
                    self.emit_tmp_assigns(arg)?;
                }
                if expr.tmp_id != 0 {
                    let text = format!("{} = {};", self.tmp_ref(expr), self.emit_call(expr));
                    self.line(&text)?;
                }
            }
            ExprKind::Array { items } => {
                for item in items {
                    self.emit_tmp_assigns(item)?;
                }
                if expr.tmp_id != 0 {
                    let text = format!("{} = {};", self.tmp_ref(expr), self.emit_new_array(expr));
                    self.line(&text)?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}
