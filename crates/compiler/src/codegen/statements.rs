//! Statement and block lowering.
//!
//! Every executed block that owns values materializes as a local struct of
//! `Value` fields (declarations first, then temporary slots) plus a
//! `ScopeFrame` pushed onto the runtime's scope stack; the frame's length
//! covers the temporaries so staged allocations are GC roots. Function
//! bodies always push a frame, even when empty, so `return` can unwind and
//! error traces can name the function.

use crate::ast::{Block, ConstValue, DeclId, DeclKind, ScopeId, Stmt, StmtKind};

use super::state::{c_int, c_quote};
use super::{CodeGen, CodeGenError};

impl<'a> CodeGen<'a> {
    /// Emit the frame struct for a scope at the current level. Returns the
    /// number of value fields (declarations plus temporaries).
    pub(super) fn gen_scope_struct(
        &mut self,
        scope_id: ScopeId,
        file_scope: bool,
    ) -> Result<i64, CodeGenError> {
        let scope = self.module.scope(scope_id);
        let field_count = scope.decls.len() as i64 + scope.tmp_count;
        if field_count == 0 {
            return Ok(0);
        }

        let decls: Vec<DeclId> = scope.decls.clone();
        let tmp_count = scope.tmp_count;

        let head = if file_scope { "static struct {" } else { "struct {" };
        self.line(head)?;
        self.level += 1;
        for &decl in &decls {
            let text = format!("Value m_{};", self.decl_name(decl));
            self.line(&text)?;
        }
        for tmp in 1..=tmp_count {
            self.line(&format!("Value tmp_{};", tmp))?;
        }
        self.level -= 1;
        self.line(&format!("}} scope{} = {{", scope_id.0))?;

        self.level += 1;
        for &decl in &decls {
            let init = self.decl_initializer(decl);
            self.line(&format!("{},", init))?;
        }
        for _ in 0..tmp_count {
            self.line("UNINITIALIZED,")?;
        }
        self.level -= 1;
        self.line("};")?;

        Ok(field_count)
    }

    /// Static frame initializer for one declaration. Deferred declarations
    /// and parameters start uninitialized and are written at run time;
    /// everything else gets its constant, or null.
    fn decl_initializer(&self, decl: DeclId) -> String {
        let d = self.module.decl(decl);
        if d.init_deferred || d.is_param() {
            return "UNINITIALIZED".to_string();
        }
        match &d.kind {
            DeclKind::Var {
                const_init: Some(value),
                ..
            } => match value {
                ConstValue::Null => "NULL_VALUE_INIT".to_string(),
                ConstValue::Bool(b) => format!("BOOL_VALUE_INIT({})", i32::from(*b)),
                ConstValue::Int(v) => format!("INT_VALUE_INIT({})", c_int(*v)),
                ConstValue::Str(s) => format!("STRING_VALUE_INIT({})", c_quote(s)),
            },
            _ => "NULL_VALUE_INIT".to_string(),
        }
    }

    /// Emit a block's body: frame struct, scope push, statements, scope pop.
    /// `func` is set when the block is that function's body.
    pub(super) fn gen_block(
        &mut self,
        block: &Block,
        func: Option<DeclId>,
    ) -> Result<(), CodeGenError> {
        let is_global = block.scope == self.module.body.scope;
        let field_count = if is_global {
            // The global struct is emitted at file scope; only its frame is
            // pushed here.
            let scope = self.module.scope(block.scope);
            scope.decls.len() as i64 + scope.tmp_count
        } else {
            self.gen_scope_struct(block.scope, false)?
        };

        let pushed = field_count > 0 || func.is_some();
        if pushed {
            let values = if field_count > 0 {
                format!("(Value*)&scope{}", block.scope.0)
            } else {
                "0".to_string()
            };
            let funcname = match func {
                Some(decl) => c_quote(self.decl_name(decl)),
                None => "0".to_string(),
            };
            self.line(&format!(
                "ScopeFrame frame{} = {{0, 0, {}, {}, {}}};",
                block.scope.0, values, field_count, funcname
            ))?;
            self.line(&format!(
                "rill_push_scope(&frame{}, {});",
                block.scope.0,
                if func.is_some() { "true" } else { "false" }
            ))?;
        }

        if func.is_some() {
            self.bind_params(block.scope)?;
        }

        for stmt in &block.stmts {
            self.gen_stmt(stmt)?;
        }

        if pushed {
            self.line("rill_pop_scope();")?;
        }
        Ok(())
    }

    /// Function prologue: copy arguments into the body frame's parameter
    /// cells, in parameter order.
    fn bind_params(&mut self, scope: ScopeId) -> Result<(), CodeGenError> {
        let params: Vec<DeclId> = self
            .module
            .scope(scope)
            .decls
            .iter()
            .copied()
            .filter(|&d| self.module.decl(d).is_param())
            .collect();

        for (index, param) in params.iter().enumerate() {
            let text = format!("{} = args[{}];", self.member(*param), index);
            self.line(&text)?;
        }
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodeGenError> {
        match &stmt.kind {
            StmtKind::VarDecl { decl, init } => {
                if !self.module.decl(*decl).init_deferred {
                    // Covered by the frame's static initializer.
                    return Ok(());
                }
                let value = match init {
                    Some(init) => {
                        self.emit_tmp_assigns(init)?;
                        self.emit_expr(init)
                    }
                    None => "NULL_VALUE".to_string(),
                };
                // The declaration's own write goes straight to the cell: it
                // is the point where the cell stops being uninitialized.
                let text = format!("{} = {};", self.member(*decl), value);
                self.line(&text)
            }

            StmtKind::FuncDecl { decl, .. } => {
                let d = self.module.decl(*decl);
                let DeclKind::Func {
                    arity, captures, ..
                } = &d.kind
                else {
                    unreachable!();
                };
                let arity = *arity;
                let captures = captures.clone();

                let cells = if captures.is_empty() {
                    "0".to_string()
                } else {
                    let cells: Vec<String> = captures
                        .iter()
                        .map(|&c| self.capture_cell(c))
                        .collect();
                    format!("(Value *[]){{{}}}", cells.join(", "))
                };

                let text = format!(
                    "{} = rill_new_function({}, {}, {}, {}, {});",
                    self.member(*decl),
                    self.func_c_name(*decl),
                    arity,
                    c_quote(self.decl_name(*decl)),
                    captures.len(),
                    cells
                );
                self.line(&text)
            }

            StmtKind::Assign { target, value } => {
                self.emit_tmp_assigns(target)?;
                self.emit_tmp_assigns(value)?;
                let text = format!("{} = {};", self.emit_expr(target), self.emit_expr(value));
                self.line(&text)
            }

            StmtKind::Print { values } => {
                for value in values {
                    self.emit_tmp_assigns(value)?;
                }
                let items: Vec<String> = values.iter().map(|v| self.emit_expr(v)).collect();
                let text = format!(
                    "rill_print({}, (Value[]){{{}}});",
                    values.len(),
                    items.join(", ")
                );
                self.line(&text)
            }

            StmtKind::Call { call } => {
                self.emit_tmp_assigns(call)?;
                let text = format!("{};", self.emit_call(call));
                self.line(&text)
            }

            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.emit_tmp_assigns(value)?;
                }
                self.line("rill_return_scope();")?;
                let text = match value {
                    Some(value) => format!("return {};", self.emit_expr(value)),
                    None => "return NULL_VALUE;".to_string(),
                };
                self.line(&text)
            }

            StmtKind::If {
                cond,
                body,
                else_body,
            } => {
                self.emit_tmp_assigns(cond)?;
                let text = format!("if (rill_truthy({})) {{", self.emit_expr(cond));
                self.line(&text)?;
                self.level += 1;
                self.gen_block(body, None)?;
                self.level -= 1;
                match else_body {
                    Some(else_body) => {
                        self.line("} else {")?;
                        self.level += 1;
                        self.gen_block(else_body, None)?;
                        self.level -= 1;
                        self.line("}")
                    }
                    None => self.line("}"),
                }
            }

            StmtKind::While { cond, body } => {
                self.emit_tmp_assigns(cond)?;
                let text = format!("while (rill_truthy({})) {{", self.emit_expr(cond));
                self.line(&text)?;
                self.level += 1;
                self.gen_block(body, None)?;
                // Restage the condition's temporaries for the next test.
                self.emit_tmp_assigns(cond)?;
                self.level -= 1;
                self.line("}")
            }
        }
    }

    /// Cell pointer handed to `rill_new_function` for one captured
    /// declaration, as reachable from the constructing context.
    fn capture_cell(&self, decl: DeclId) -> String {
        match self.capture_index(decl) {
            Some(index) => format!("&enclosed[{}]", index),
            None => format!("&{}", self.member(decl)),
        }
    }
}
