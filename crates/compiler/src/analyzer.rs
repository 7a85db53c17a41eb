//! Name resolution and semantic analysis.
//!
//! One walk over the parsed tree, carrying the current scope and the current
//! function declaration. It resolves every `Var` to its declaration (or
//! deliberately leaves it unresolved for code generation to turn into a
//! runtime error), enforces the forward-reference rules, records captured
//! outer variables on each function along the whole chain of enclosing
//! functions, assigns temporary staging slots to allocating expressions, and
//! finishes the constant folding the parser started.
//!
//! The walk is idempotent: running it a second time resolves nothing new,
//! adds no captures and allocates no further temporaries.

use crate::ast::{
    Block, ConstValue, Decl, DeclId, DeclKind, Expr, ExprKind, Module, Scope, ScopeId, Stmt,
    StmtKind, fold_binary, literal_int, lookup,
};
use crate::diagnostics::error_at;
use crate::lexer::{Interner, ipunct};

/// Analyze the module in place. With `strict_undefined`, names that do not
/// resolve are compile errors instead of deferred runtime errors.
pub fn analyze(module: &mut Module, strict_undefined: bool) -> Result<(), String> {
    let Module {
        source,
        interner,
        scopes,
        decls,
        body,
        ..
    } = module;

    let mut analyzer = Analyzer {
        source,
        interner,
        scopes,
        decls,
        strict_undefined,
        cur_scope: None,
        cur_func: None,
    };
    analyzer.a_block(body)
}

struct Analyzer<'a> {
    source: &'a str,
    interner: &'a Interner,
    scopes: &'a mut Vec<Scope>,
    decls: &'a mut Vec<Decl>,
    strict_undefined: bool,
    cur_scope: Option<ScopeId>,
    cur_func: Option<DeclId>,
}

impl<'a> Analyzer<'a> {
    fn a_block(&mut self, block: &mut Block) -> Result<(), String> {
        // Function bodies get their hosting function assigned by
        // `a_funcdecl` before this runs; every other block inherits it.
        if self.scopes[block.scope.0].hosting_func.is_none() {
            let inherited = self
                .cur_scope
                .and_then(|scope| self.scopes[scope.0].hosting_func);
            self.scopes[block.scope.0].hosting_func = inherited;
        }

        let saved = self.cur_scope.replace(block.scope);
        for stmt in &mut block.stmts {
            self.a_stmt(stmt)?;
        }
        self.cur_scope = saved;
        Ok(())
    }

    fn a_stmt(&mut self, stmt: &mut Stmt) -> Result<(), String> {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::VarDecl { decl, init } => self.a_vardecl(*decl, init),
            StmtKind::FuncDecl { decl, body } => self.a_funcdecl(*decl, body),
            StmtKind::Assign { target, value } => {
                self.a_expr(target)?;
                self.a_expr(value)?;
                if !target.is_lvalue {
                    return Err(error_at(self.source, span, "target is not assignable"));
                }
                Ok(())
            }
            StmtKind::Print { values } => {
                for value in values {
                    self.a_expr(value)?;
                }
                Ok(())
            }
            StmtKind::Call { call } => {
                self.a_expr(call)?;
                // A call in statement position discards its result; it needs
                // no staging slot of its own. Its slot was the scope's last,
                // so it can be reclaimed.
                if call.tmp_id != 0 && call.tmp_id == self.scopes[call.scope.0].tmp_count {
                    self.scopes[call.scope.0].tmp_count -= 1;
                }
                call.tmp_id = 0;
                Ok(())
            }
            StmtKind::Return { value } => {
                if self.cur_func.is_none() {
                    return Err(error_at(
                        self.source,
                        span,
                        "return can only be used inside a function",
                    ));
                }
                if let Some(value) = value {
                    self.a_expr(value)?;
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                body,
                else_body,
            } => {
                self.a_expr(cond)?;
                self.a_block(body)?;
                if let Some(else_body) = else_body {
                    self.a_block(else_body)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.a_expr(cond)?;
                self.a_block(body)
            }
        }
    }

    fn a_vardecl(&mut self, decl: DeclId, init: &mut Option<Expr>) -> Result<(), String> {
        let Some(init) = init else {
            return Ok(());
        };
        self.a_expr(init)?;

        if !self.decls[decl.0].init_deferred {
            // A non-deferred declaration gets a static frame initializer;
            // anything that did not fold down to a literal falls back to a
            // runtime assignment at the declaration's program point.
            match const_value(init) {
                Some(value) => {
                    if let DeclKind::Var { const_init, .. } = &mut self.decls[decl.0].kind {
                        *const_init = Some(value);
                    }
                }
                None => self.decls[decl.0].init_deferred = true,
            }
        }
        Ok(())
    }

    fn a_funcdecl(&mut self, decl: DeclId, body: &mut Block) -> Result<(), String> {
        self.scopes[body.scope.0].hosting_func = Some(decl);
        let saved = self.cur_func.replace(decl);
        self.a_block(body)?;
        self.cur_func = saved;
        Ok(())
    }

    fn a_expr(&mut self, expr: &mut Expr) -> Result<(), String> {
        match &mut expr.kind {
            ExprKind::Null | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Str(_) => {}

            ExprKind::Var { name, decl } => {
                let name = *name;
                let resolved = lookup(self.scopes, self.decls, expr.scope, name);
                *decl = resolved;

                let Some(d) = resolved else {
                    if self.strict_undefined {
                        return Err(error_at(
                            self.source,
                            expr.span,
                            &format!("{} is not declared", self.interner.resolve(name)),
                        ));
                    }
                    // Deliberately deferred: code generation emits a runtime
                    // "name is not defined" call for this reference.
                    return Ok(());
                };

                let d_scope = self.decls[d.0].scope;
                let d_end = self.decls[d.0].end_pos;
                let global = self.scopes[d_scope.0].parent.is_none();

                if expr.pos < d_end {
                    if d_scope == expr.scope {
                        return Err(error_at(
                            self.source,
                            expr.span,
                            &format!("{} is declared later", self.interner.resolve(name)),
                        ));
                    }
                    if !global {
                        return Err(error_at(
                            self.source,
                            expr.span,
                            &format!(
                                "variable {} declared later in enclosing scope",
                                self.interner.resolve(name)
                            ),
                        ));
                    }
                }

                if !global {
                    let decl_host = self.scopes[d_scope.0].hosting_func;
                    let cur_host = self.scopes[expr.scope.0].hosting_func;
                    if decl_host != cur_host {
                        // Record the capture on every function between the
                        // reference and the declaration's hosting function,
                        // so each closure constructor on the way can reach
                        // the cell.
                        let mut host = cur_host;
                        while host != decl_host {
                            let func =
                                host.expect("capture chain must reach the declaring function");
                            self.add_capture(func, d);
                            host = self.scopes[self.decls[func.0].scope.0].hosting_func;
                        }
                        self.decls[d.0].is_captured = true;
                    }
                }
            }

            ExprKind::Unary { op, sub } => {
                let op = *op;
                self.a_expr(sub)?;
                let sub_has_tmps = sub.has_tmps;
                let folded = literal_int(sub).map(|value| {
                    ExprKind::Int(if op == ipunct("-") {
                        value.wrapping_neg()
                    } else {
                        value
                    })
                });
                match folded {
                    Some(kind) => {
                        expr.kind = kind;
                        expr.is_const = true;
                        expr.has_tmps = false;
                    }
                    None => {
                        expr.is_const = false;
                        expr.has_tmps = sub_has_tmps;
                    }
                }
            }

            ExprKind::Binary {
                op,
                level,
                left,
                right,
            } => {
                let (op, level) = (*op, *level);
                self.a_expr(left)?;
                self.a_expr(right)?;
                let has_tmps = left.has_tmps || right.has_tmps;
                match fold_binary(op, level, left, right) {
                    Some(kind) => {
                        expr.kind = kind;
                        expr.is_const = true;
                        expr.has_tmps = false;
                    }
                    None => {
                        expr.is_const = false;
                        expr.has_tmps = has_tmps;
                    }
                }
            }

            ExprKind::Call { callee, args } => {
                self.a_expr(callee)?;
                for arg in args {
                    self.a_expr(arg)?;
                }
            }

            ExprKind::Array { items } => {
                for item in items {
                    self.a_expr(item)?;
                }
            }

            ExprKind::Subscript { array, index } => {
                self.a_expr(array)?;
                self.a_expr(index)?;
                let has_tmps = array.has_tmps || index.has_tmps;

                let folded = match (&mut array.kind, &index.kind) {
                    (ExprKind::Array { items }, ExprKind::Int(i))
                        if index.is_const && *i >= 0 && (*i as usize) < items.len() =>
                    {
                        Some(items[*i as usize].clone())
                    }
                    _ => None,
                };

                match folded {
                    Some(item) => *expr = item,
                    None => expr.has_tmps = has_tmps,
                }
            }
        }

        // Calls and arrays allocate; their results are staged in a slot of
        // the owning scope so the collector sees them as roots for the rest
        // of the statement.
        if matches!(expr.kind, ExprKind::Call { .. } | ExprKind::Array { .. }) {
            if expr.tmp_id == 0 {
                let scope = expr.scope;
                self.scopes[scope.0].tmp_count += 1;
                expr.tmp_id = self.scopes[scope.0].tmp_count;
            }
            expr.has_tmps = true;
        }

        Ok(())
    }

    fn add_capture(&mut self, func: DeclId, var: DeclId) {
        let DeclKind::Func { captures, .. } = &mut self.decls[func.0].kind else {
            unreachable!("capture recorded on a non-function declaration");
        };
        if !captures.contains(&var) {
            captures.push(var);
        }
    }
}

fn const_value(expr: &Expr) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::Null => Some(ConstValue::Null),
        ExprKind::Bool(b) => Some(ConstValue::Bool(*b)),
        ExprKind::Int(v) => Some(ConstValue::Int(*v)),
        ExprKind::Str(s) => Some(ConstValue::Str(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Decl;
    use crate::lexer::lex;
    use crate::parser::parse;
    use std::path::PathBuf;

    fn analyzed(source: &str) -> Result<Module, String> {
        let (tokens, interner) = lex(source)?;
        let mut module = Module {
            filename: PathBuf::from("test.rill"),
            path_id: String::new(),
            source: source.to_string(),
            tokens,
            interner,
            scopes: Vec::new(),
            decls: Vec::new(),
            body: Block::default(),
        };
        parse(&mut module)?;
        analyze(&mut module, false)?;
        Ok(module)
    }

    fn func_decl<'m>(module: &'m Module, name: &str) -> &'m Decl {
        module
            .decls
            .iter()
            .find(|d| d.is_func() && module.name(d.name) == name)
            .unwrap_or_else(|| panic!("no function {}", name))
    }

    fn captures<'m>(module: &'m Module, name: &str) -> &'m [DeclId] {
        match &func_decl(module, name).kind {
            DeclKind::Func { captures, .. } => captures,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_local_capture_is_recorded() {
        let module =
            analyzed("function make() { var c = 0; function inc() { c = c + 1; return c; } return inc; }")
                .unwrap();
        let inc_captures = captures(&module, "inc");
        assert_eq!(inc_captures.len(), 1);
        let captured = module.decl(inc_captures[0]);
        assert_eq!(module.name(captured.name), "c");
        assert!(captured.is_captured);
    }

    #[test]
    fn test_global_references_are_not_captures() {
        let module = analyzed("var x = 10; function f() { print x; } f();").unwrap();
        assert!(captures(&module, "f").is_empty());
        let x = module
            .decls
            .iter()
            .find(|d| module.name(d.name) == "x")
            .unwrap();
        assert!(!x.is_captured);
    }

    #[test]
    fn test_transitive_capture_reaches_intermediate_functions() {
        let module = analyzed(
            "function outer() { var c = 0; function mid() { function inner() { print c; } inner(); } mid(); }",
        )
        .unwrap();
        assert_eq!(captures(&module, "inner").len(), 1);
        assert_eq!(captures(&module, "mid").len(), 1);
        assert!(captures(&module, "outer").is_empty());
    }

    #[test]
    fn test_unresolved_name_is_deferred_to_runtime() {
        let module = analyzed("print x;").unwrap();
        match &module.body.stmts[0].kind {
            StmtKind::Print { values } => match &values[0].kind {
                ExprKind::Var { decl, .. } => assert!(decl.is_none()),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_strict_mode_rejects_unresolved_names() {
        let source = "print x;";
        let (tokens, interner) = lex(source).unwrap();
        let mut module = Module {
            filename: PathBuf::from("test.rill"),
            path_id: String::new(),
            source: source.to_string(),
            tokens,
            interner,
            scopes: Vec::new(),
            decls: Vec::new(),
            body: Block::default(),
        };
        parse(&mut module).unwrap();
        let err = analyze(&mut module, true).unwrap_err();
        assert!(err.contains("x is not declared"));
    }

    #[test]
    fn test_same_scope_forward_reference_is_fatal() {
        let err = analyzed("print x; var x = 1;").unwrap_err();
        assert!(err.contains("x is declared later"));
    }

    #[test]
    fn test_enclosing_scope_forward_reference_is_fatal() {
        let err =
            analyzed("function outer() { function f() { print c; } var c = 1; }").unwrap_err();
        assert!(err.contains("variable c declared later in enclosing scope"));
    }

    #[test]
    fn test_global_forward_reference_is_allowed() {
        // Resolved at compile time, checked at run time via the
        // uninitialized-cell path.
        assert!(analyzed("function f() { print x; } var x = 1; f();").is_ok());
    }

    #[test]
    fn test_return_at_top_level_is_fatal() {
        let err = analyzed("return 1;").unwrap_err();
        assert!(err.contains("return can only be used inside a function"));
    }

    #[test]
    fn test_non_lvalue_assignment_is_fatal() {
        let err = analyzed("var a = 1; a + 1 = 2;").unwrap_err();
        assert!(err.contains("target is not assignable"));
    }

    #[test]
    fn test_folded_subscript_is_not_assignable() {
        let err = analyzed("[1, 2][0] = 5;").unwrap_err();
        assert!(err.contains("target is not assignable"));
    }

    #[test]
    fn test_subscript_of_literal_array_folds() {
        let module = analyzed("print [1, 2, 3][1];").unwrap();
        match &module.body.stmts[0].kind {
            StmtKind::Print { values } => assert_eq!(values[0].kind, ExprKind::Int(2)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unary_folding_feeds_static_initializers() {
        let module = analyzed("var x = -5;").unwrap();
        let x = module
            .decls
            .iter()
            .find(|d| module.name(d.name) == "x")
            .unwrap();
        assert!(!x.init_deferred);
        match &x.kind {
            DeclKind::Var { const_init, .. } => {
                assert_eq!(*const_init, Some(ConstValue::Int(-5)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_call_expressions_get_staging_slots() {
        let module = analyzed("print f(g());").unwrap();
        let scope = module.scope(module.body.scope);
        assert_eq!(scope.tmp_count, 2);
    }

    #[test]
    fn test_statement_calls_need_no_slot_of_their_own() {
        let module = analyzed("f();").unwrap();
        match &module.body.stmts[0].kind {
            StmtKind::Call { call } => assert_eq!(call.tmp_id, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_analysis_is_a_fixpoint() {
        let source = "var a = 1; function make() { var c = 0; function inc() { c = c + 1; return c; } return inc; } var g = make(); print g(), a;";
        let mut module = analyzed(source).unwrap();
        let scopes = module.scopes.clone();
        let decls = module.decls.clone();
        let body = module.body.clone();

        analyze(&mut module, false).unwrap();
        assert_eq!(module.scopes, scopes);
        assert_eq!(module.decls, decls);
        assert_eq!(module.body, body);
    }
}
