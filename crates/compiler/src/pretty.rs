//! Token and AST dumps for the `inspect` subcommand.
//!
//! The AST dump reconstructs source-like text from the parsed tree, with a
//! `# scope` header line per block listing its declarations, which makes
//! scope construction and declaration ordering visible without reading the
//! generated C.

use crate::ast::{Block, Expr, ExprKind, Module, StmtKind};
use crate::lexer::{Token, TokenKind, punct_display};
use std::fmt::Write as _;

/// One line per token: line number, kind, text.
pub fn format_tokens(module: &Module) -> String {
    let mut out = String::new();
    for token in &module.tokens {
        let Token { kind, span } = token;
        match kind {
            TokenKind::Keyword(keyword) => {
                let _ = writeln!(out, "{}: KEYWORD: {}", span.line, keyword.as_str());
            }
            TokenKind::Ident(symbol) => {
                let _ = writeln!(out, "{}: IDENT: {}", span.line, module.name(*symbol));
            }
            TokenKind::Int(value) => {
                let _ = writeln!(out, "{}: INT: {}", span.line, value);
            }
            TokenKind::Str(text) => {
                let _ = writeln!(out, "{}: STRING: {:?}", span.line, text);
            }
            TokenKind::Punct(code) => {
                let _ = writeln!(out, "{}: PUNCT: {}", span.line, punct_display(*code));
            }
            TokenKind::Eof => {}
        }
    }
    out
}

/// Source-like rendering of the parsed module.
pub fn format_module(module: &Module) -> String {
    let mut printer = Printer {
        module,
        out: String::new(),
        level: 0,
    };
    printer.block(&module.body);
    printer.out
}

struct Printer<'a> {
    module: &'a Module,
    out: String,
    level: usize,
}

impl<'a> Printer<'a> {
    fn indent(&mut self) {
        for _ in 0..self.level {
            self.out.push('\t');
        }
    }

    fn block(&mut self, block: &Block) {
        self.indent();
        self.out.push_str("# scope ");
        let _ = write!(self.out, "{}:", block.scope.0);
        for &decl in &self.module.scope(block.scope).decls {
            let _ = write!(self.out, " {}", self.module.name(self.module.decl(decl).name));
        }
        self.out.push('\n');

        for stmt in &block.stmts {
            self.indent();
            self.stmt(stmt);
            self.out.push('\n');
        }
    }

    fn stmt(&mut self, stmt: &crate::ast::Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl { decl, init } => {
                let _ = write!(
                    self.out,
                    "var {}",
                    self.module.name(self.module.decl(*decl).name)
                );
                if let Some(init) = init {
                    self.out.push_str(" = ");
                    self.expr(init);
                }
                self.out.push(';');
            }
            StmtKind::FuncDecl { decl, body } => {
                let d = self.module.decl(*decl);
                let _ = write!(self.out, "function {}(", self.module.name(d.name));
                let params: Vec<&str> = self
                    .module
                    .scope(body.scope)
                    .decls
                    .iter()
                    .filter(|&&p| self.module.decl(p).is_param())
                    .map(|&p| self.module.name(self.module.decl(p).name))
                    .collect();
                self.out.push_str(&params.join(", "));
                self.out.push_str(") {\n");
                self.level += 1;
                self.block(body);
                self.level -= 1;
                self.indent();
                self.out.push('}');
            }
            StmtKind::Assign { target, value } => {
                self.expr(target);
                self.out.push_str(" = ");
                self.expr(value);
                self.out.push(';');
            }
            StmtKind::Print { values } => {
                self.out.push_str("print ");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(value);
                }
                self.out.push(';');
            }
            StmtKind::Call { call } => {
                self.expr(call);
                self.out.push(';');
            }
            StmtKind::Return { value } => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value);
                }
                self.out.push(';');
            }
            StmtKind::If {
                cond,
                body,
                else_body,
            } => {
                self.out.push_str("if ");
                self.expr(cond);
                self.out.push_str(" {\n");
                self.level += 1;
                self.block(body);
                self.level -= 1;
                self.indent();
                self.out.push('}');
                if let Some(else_body) = else_body {
                    self.out.push_str("\n");
                    self.indent();
                    self.out.push_str("else {\n");
                    self.level += 1;
                    self.block(else_body);
                    self.level -= 1;
                    self.indent();
                    self.out.push('}');
                }
            }
            StmtKind::While { cond, body } => {
                self.out.push_str("while ");
                self.expr(cond);
                self.out.push_str(" {\n");
                self.level += 1;
                self.block(body);
                self.level -= 1;
                self.indent();
                self.out.push('}');
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Null => self.out.push_str("null"),
            ExprKind::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            ExprKind::Int(v) => {
                let _ = write!(self.out, "{}", v);
            }
            ExprKind::Str(s) => {
                let _ = write!(self.out, "{:?}", s);
            }
            ExprKind::Var { name, .. } => self.out.push_str(self.module.name(*name)),
            ExprKind::Unary { op, sub } => {
                self.out.push_str(&punct_display(*op));
                self.expr(sub);
            }
            ExprKind::Binary {
                op, left, right, ..
            } => {
                self.expr(left);
                let _ = write!(self.out, " {} ", punct_display(*op));
                self.expr(right);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(arg);
                }
                self.out.push(')');
            }
            ExprKind::Array { items } => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(item);
                }
                self.out.push(']');
            }
            ExprKind::Subscript { array, index } => {
                self.expr(array);
                self.out.push('[');
                self.expr(index);
                self.out.push(']');
            }
        }
    }
}
