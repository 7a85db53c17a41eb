//! Recursive-descent parser for Rill.
//!
//! One token of lookahead; the `eat_*` helpers return the matched token's
//! index and advance, or return `None` without advancing. Statement parsers
//! return `Ok(None)` when the lookahead does not start their production, so
//! [`Parser::stmt`] can try them in order.
//!
//! The parser also builds the lexical scope tree, rejects duplicate
//! declarations per scope, folds constant binary operations on the fly, and
//! records which scopes have seen a side-effecting expression (a call): any
//! `var` declared after that point in the same scope defers its
//! initialization to run time, which keeps global-scope ordering observable.

use crate::ast::{
    Block, Decl, DeclId, DeclKind, Expr, ExprKind, Module, OpLevel, Scope, ScopeId, Stmt,
    StmtKind, fold_binary, lookup_flat,
};
use crate::diagnostics::{Span, error_at};
use crate::lexer::{Interner, Keyword, Token, TokenKind, ipunct, punct_display};

const LEVELS: [OpLevel; 3] = [OpLevel::Cmp, OpLevel::Add, OpLevel::Mul];

/// Parse the module's token stream into `module.body`, populating the scope
/// and declaration arenas.
pub fn parse(module: &mut Module) -> Result<(), String> {
    let Module {
        source,
        tokens,
        interner,
        scopes,
        decls,
        body,
        ..
    } = module;

    let mut parser = Parser {
        source,
        tokens,
        interner,
        scopes,
        decls,
        pos: 0,
        cur_scope: None,
        next_func_id: 0,
    };

    let block = parser.block(&[])?;
    if !parser.at_eof() {
        return Err(parser.err("unknown statement"));
    }
    *body = block;
    Ok(())
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    interner: &'a Interner,
    scopes: &'a mut Vec<Scope>,
    decls: &'a mut Vec<Decl>,
    pos: usize,
    cur_scope: Option<ScopeId>,
    next_func_id: i64,
}

impl<'a> Parser<'a> {
    fn token(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn at_eof(&self) -> bool {
        matches!(self.token().kind, TokenKind::Eof)
    }

    fn err(&self, msg: &str) -> String {
        error_at(self.source, self.token().span, msg)
    }

    /// Error pointing just past the previous token, for "expected X after Y".
    fn err_after(&self, msg: &str) -> String {
        let span = self.tokens[self.pos.saturating_sub(1)].span.after();
        error_at(self.source, span, msg)
    }

    fn err_span(&self, span: Span, msg: &str) -> String {
        error_at(self.source, span, msg)
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> Option<usize> {
        if self.token().kind == TokenKind::Keyword(keyword) {
            self.pos += 1;
            Some(self.pos - 1)
        } else {
            None
        }
    }

    fn see_punct(&self, text: &str) -> bool {
        self.token().kind == TokenKind::Punct(ipunct(text))
    }

    fn eat_punct(&mut self, text: &str) -> Option<usize> {
        if self.see_punct(text) {
            self.pos += 1;
            Some(self.pos - 1)
        } else {
            None
        }
    }

    fn eat_ident(&mut self) -> Option<usize> {
        if matches!(self.token().kind, TokenKind::Ident(_)) {
            self.pos += 1;
            Some(self.pos - 1)
        } else {
            None
        }
    }

    fn ident_symbol(&self, pos: usize) -> crate::lexer::Symbol {
        match self.tokens[pos].kind {
            TokenKind::Ident(symbol) => symbol,
            _ => unreachable!("token {} is not an identifier", pos),
        }
    }

    fn cur_scope(&self) -> ScopeId {
        self.cur_scope.expect("expression outside any scope")
    }

    fn new_expr(&self, kind: ExprKind, pos: usize) -> Expr {
        Expr {
            kind,
            span: self.tokens[pos].span,
            pos,
            scope: self.cur_scope(),
            is_const: false,
            is_lvalue: false,
            has_tmps: false,
            tmp_id: 0,
        }
    }

    fn declare(&mut self, decl: Decl) -> Option<DeclId> {
        let scope = decl.scope;
        if lookup_flat(self.scopes, self.decls, scope, decl.name).is_some() {
            return None;
        }
        let id = DeclId(self.decls.len());
        self.decls.push(decl);
        self.scopes[scope.0].decls.push(id);
        Some(id)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn array_literal(&mut self) -> Result<Option<Expr>, String> {
        let Some(start) = self.eat_punct("[") else {
            return Ok(None);
        };

        let mut items = Vec::new();
        if let Some(first) = self.expr()? {
            items.push(first);
            while self.eat_punct(",").is_some() {
                match self.expr()? {
                    Some(item) => items.push(item),
                    None => return Err(self.err_after("expected another array item after ','")),
                }
            }
        }

        if self.eat_punct("]").is_none() {
            return Err(self.err_after("expected ']' at the end of array literal"));
        }

        let mut expr = self.new_expr(ExprKind::Array { items }, start);
        expr.has_tmps = true;
        Ok(Some(expr))
    }

    fn atom(&mut self) -> Result<Option<Expr>, String> {
        if let Some(array) = self.array_literal()? {
            return Ok(Some(array));
        }

        let pos = self.pos;
        let kind = match &self.token().kind {
            TokenKind::Int(value) => {
                let value = *value;
                self.pos += 1;
                let mut expr = self.new_expr(ExprKind::Int(value), pos);
                expr.is_const = true;
                return Ok(Some(expr));
            }
            TokenKind::Str(text) => {
                let text = text.clone();
                self.pos += 1;
                let mut expr = self.new_expr(ExprKind::Str(text), pos);
                expr.is_const = true;
                return Ok(Some(expr));
            }
            TokenKind::Ident(symbol) => {
                let name = *symbol;
                self.pos += 1;
                let mut expr = self.new_expr(ExprKind::Var { name, decl: None }, pos);
                expr.is_lvalue = true;
                return Ok(Some(expr));
            }
            TokenKind::Keyword(Keyword::True) => ExprKind::Bool(true),
            TokenKind::Keyword(Keyword::False) => ExprKind::Bool(false),
            TokenKind::Keyword(Keyword::Null) => ExprKind::Null,
            _ => return Ok(None),
        };

        self.pos += 1;
        let mut expr = self.new_expr(kind, pos);
        expr.is_const = true;
        Ok(Some(expr))
    }

    fn call_arguments(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if let Some(first) = self.expr()? {
            args.push(first);
            while self.eat_punct(",").is_some() {
                match self.expr()? {
                    Some(arg) => args.push(arg),
                    None => return Err(self.err_after("expected another argument after ','")),
                }
            }
        }

        if self.eat_punct(")").is_none() {
            return Err(self.err_after("expected ')' after argument list"));
        }
        Ok(args)
    }

    fn postfix(&mut self) -> Result<Option<Expr>, String> {
        let Some(mut expr) = self.atom()? else {
            return Ok(None);
        };

        loop {
            if self.eat_punct("(").is_some() {
                let args = self.call_arguments()?;
                let pos = expr.pos;
                let mut call = self.new_expr(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    pos,
                );
                call.has_tmps = true;
                let cur_scope = self.cur_scope().0;
                self.scopes[cur_scope].had_side_effects = true;
                expr = call;
            } else if self.eat_punct("[").is_some() {
                let index = match self.expr()? {
                    Some(index) => index,
                    None => return Err(self.err_after("expected index expression in []")),
                };
                if self.eat_punct("]").is_none() {
                    return Err(self.err_after("expected ']' after index"));
                }
                let pos = expr.pos;
                let has_tmps = expr.has_tmps || index.has_tmps;
                let mut subscript = self.new_expr(
                    ExprKind::Subscript {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
                subscript.is_lvalue = true;
                subscript.has_tmps = has_tmps;
                expr = subscript;
            } else {
                return Ok(Some(expr));
            }
        }
    }

    fn unary(&mut self) -> Result<Option<Expr>, String> {
        let op_pos = match self.eat_punct("+").or_else(|| self.eat_punct("-")) {
            Some(pos) => pos,
            None => return self.postfix(),
        };
        let op = match self.tokens[op_pos].kind {
            TokenKind::Punct(code) => code,
            _ => unreachable!(),
        };

        let sub = match self.unary()? {
            Some(sub) => sub,
            None => {
                return Err(self.err_after(&format!(
                    "expected expression after unary {}",
                    punct_display(op)
                )));
            }
        };

        let is_const = sub.is_const;
        let has_tmps = sub.has_tmps;
        let mut expr = self.new_expr(
            ExprKind::Unary {
                op,
                sub: Box::new(sub),
            },
            op_pos,
        );
        expr.is_const = is_const;
        expr.has_tmps = has_tmps;
        Ok(Some(expr))
    }

    fn operator(&mut self, level: OpLevel) -> Option<usize> {
        let ops: &[&str] = match level {
            OpLevel::Cmp => &["<", ">", "==", "!=", "<=", ">="],
            OpLevel::Add => &["+", "-"],
            OpLevel::Mul => &["*", "%"],
        };
        ops.iter().find_map(|op| self.eat_punct(op))
    }

    fn binop(&mut self, level: usize) -> Result<Option<Expr>, String> {
        if level == LEVELS.len() {
            return self.unary();
        }
        let oplevel = LEVELS[level];

        let Some(mut left) = self.binop(level + 1)? else {
            return Ok(None);
        };

        let mut seen_op = false;
        while let Some(op_pos) = self.operator(oplevel) {
            if oplevel == OpLevel::Cmp && seen_op {
                return Err(
                    self.err_span(self.tokens[op_pos].span, "can not chain comparisons")
                );
            }
            seen_op = true;

            let op = match self.tokens[op_pos].kind {
                TokenKind::Punct(code) => code,
                _ => unreachable!(),
            };

            let right = match self.binop(level + 1)? {
                Some(right) => right,
                None => {
                    return Err(self.err_after(&format!(
                        "expected right side of {}",
                        punct_display(op)
                    )));
                }
            };

            for operand in [&left, &right] {
                if matches!(operand.kind, ExprKind::Str(_)) {
                    return Err(self.err_span(
                        operand.span,
                        &format!("strings can not be used with {}", punct_display(op)),
                    ));
                }
                if matches!(operand.kind, ExprKind::Array { .. }) {
                    return Err(self.err_span(
                        operand.span,
                        &format!("arrays can not be used with {}", punct_display(op)),
                    ));
                }
            }

            let both_const = left.is_const && right.is_const;
            let folded = if both_const {
                fold_binary(op, oplevel, &left, &right)
            } else {
                None
            };

            left = match folded {
                Some(kind) => {
                    let pos = left.pos;
                    let span = left.span;
                    let mut expr = self.new_expr(kind, pos);
                    expr.span = span;
                    expr.is_const = true;
                    expr
                }
                None => {
                    let pos = left.pos;
                    let span = left.span;
                    let has_tmps = left.has_tmps || right.has_tmps;
                    let mut expr = self.new_expr(
                        ExprKind::Binary {
                            op,
                            level: oplevel,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        pos,
                    );
                    expr.span = span;
                    expr.has_tmps = has_tmps;
                    expr
                }
            };
        }

        Ok(Some(left))
    }

    fn expr(&mut self) -> Result<Option<Expr>, String> {
        self.binop(0)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn vardecl(&mut self) -> Result<Option<Stmt>, String> {
        let Some(start) = self.eat_keyword(Keyword::Var) else {
            return Ok(None);
        };

        let Some(ident) = self.eat_ident() else {
            return Err(self.err("expected identifier to declare"));
        };

        let init = if self.eat_punct("=").is_some() {
            match self.expr()? {
                Some(init) => Some(init),
                None => return Err(self.err_after("expected initializer after '='")),
            }
        } else {
            None
        };

        if self.eat_punct(";").is_none() {
            return Err(self.err_after("expected ';' after variable declaration"));
        }

        let scope = self.cur_scope();
        let deferred = self.scopes[scope.0].had_side_effects
            || init.as_ref().is_some_and(|init| !init.is_const);

        let name = self.ident_symbol(ident);
        let decl = Decl {
            name,
            span: self.tokens[ident].span,
            end_pos: self.pos,
            scope,
            init_deferred: deferred,
            is_captured: false,
            kind: DeclKind::Var {
                is_param: false,
                const_init: None,
            },
        };

        let Some(decl) = self.declare(decl) else {
            return Err(self.err_span(
                self.tokens[ident].span,
                &format!("name {} already declared", self.interner.resolve(name)),
            ));
        };

        Ok(Some(Stmt {
            kind: StmtKind::VarDecl { decl, init },
            span: self.tokens[start].span,
            end_pos: self.pos,
        }))
    }

    fn funcdecl(&mut self) -> Result<Option<Stmt>, String> {
        let Some(start) = self.eat_keyword(Keyword::Function) else {
            return Ok(None);
        };

        let func_id = self.next_func_id;
        self.next_func_id += 1;

        let Some(ident) = self.eat_ident() else {
            return Err(self.err("expected function identifier"));
        };

        if self.eat_punct("(").is_none() {
            return Err(self.err_after("expected '(' after function name"));
        }

        let mut params = Vec::new();
        if let Some(param) = self.eat_ident() {
            params.push(param);
            while self.eat_punct(",").is_some() {
                match self.eat_ident() {
                    Some(param) => params.push(param),
                    None => return Err(self.err_after("expected another parameter after ','")),
                }
            }
        }

        if self.eat_punct(")").is_none() {
            return Err(self.err_after("expected ')'"));
        }
        if self.eat_punct("{").is_none() {
            return Err(self.err_after("expected '{'"));
        }

        let body = self.block(&params)?;

        if self.eat_punct("}").is_none() {
            return Err(self.err("expected '}' or another statement"));
        }

        let name = self.ident_symbol(ident);
        let decl = Decl {
            name,
            span: self.tokens[ident].span,
            end_pos: self.pos,
            scope: self.cur_scope(),
            // Constructed at its program point so the closure captures the
            // then-current cells.
            init_deferred: true,
            is_captured: false,
            kind: DeclKind::Func {
                func_id,
                arity: params.len() as i64,
                captures: Vec::new(),
            },
        };

        let Some(decl) = self.declare(decl) else {
            return Err(self.err_span(
                self.tokens[ident].span,
                &format!("name {} already declared", self.interner.resolve(name)),
            ));
        };

        Ok(Some(Stmt {
            kind: StmtKind::FuncDecl { decl, body },
            span: self.tokens[start].span,
            end_pos: self.pos,
        }))
    }

    fn print_stmt(&mut self) -> Result<Option<Stmt>, String> {
        let Some(start) = self.eat_keyword(Keyword::Print) else {
            return Ok(None);
        };

        let mut values = Vec::new();
        match self.expr()? {
            Some(value) => values.push(value),
            None => return Err(self.err_after("expected value to print")),
        }
        while self.eat_punct(",").is_some() {
            match self.expr()? {
                Some(value) => values.push(value),
                None => return Err(self.err_after("expected another value after ',' to print")),
            }
        }

        if self.eat_punct(";").is_none() {
            return Err(self.err_after("expected ';' after print statement"));
        }

        Ok(Some(Stmt {
            kind: StmtKind::Print { values },
            span: self.tokens[start].span,
            end_pos: self.pos,
        }))
    }

    fn return_stmt(&mut self) -> Result<Option<Stmt>, String> {
        let Some(start) = self.eat_keyword(Keyword::Return) else {
            return Ok(None);
        };

        let value = self.expr()?;

        if self.eat_punct(";").is_none() {
            return Err(self.err_after("expected ';' after return statement"));
        }

        Ok(Some(Stmt {
            kind: StmtKind::Return { value },
            span: self.tokens[start].span,
            end_pos: self.pos,
        }))
    }

    fn braced_block(&mut self) -> Result<Block, String> {
        if self.eat_punct("{").is_none() {
            return Err(self.err("expected '{'"));
        }
        let body = self.block(&[])?;
        if self.eat_punct("}").is_none() {
            return Err(self.err("expected '}' or another statement"));
        }
        Ok(body)
    }

    fn if_stmt(&mut self) -> Result<Option<Stmt>, String> {
        let Some(start) = self.eat_keyword(Keyword::If) else {
            return Ok(None);
        };

        let Some(cond) = self.expr()? else {
            return Err(self.err("expected a condition expression"));
        };

        let body = self.braced_block()?;

        let else_body = if self.eat_keyword(Keyword::Else).is_some() {
            Some(self.braced_block()?)
        } else {
            None
        };

        Ok(Some(Stmt {
            kind: StmtKind::If {
                cond,
                body,
                else_body,
            },
            span: self.tokens[start].span,
            end_pos: self.pos,
        }))
    }

    fn while_stmt(&mut self) -> Result<Option<Stmt>, String> {
        let Some(start) = self.eat_keyword(Keyword::While) else {
            return Ok(None);
        };

        let Some(cond) = self.expr()? else {
            return Err(self.err("expected a condition expression"));
        };

        let body = self.braced_block()?;

        Ok(Some(Stmt {
            kind: StmtKind::While { cond, body },
            span: self.tokens[start].span,
            end_pos: self.pos,
        }))
    }

    fn assign_or_call(&mut self) -> Result<Option<Stmt>, String> {
        let Some(expr) = self.expr()? else {
            return Ok(None);
        };
        let span = expr.span;

        if matches!(expr.kind, ExprKind::Call { .. }) && self.see_punct(";") {
            self.pos += 1;
            return Ok(Some(Stmt {
                kind: StmtKind::Call { call: expr },
                span,
                end_pos: self.pos,
            }));
        }

        if self.eat_punct("=").is_some() {
            let value = match self.expr()? {
                Some(value) => value,
                None => return Err(self.err_after("expected right side of assignment")),
            };
            if self.eat_punct(";").is_none() {
                return Err(self.err_after("expected ';' after assignment"));
            }
            return Ok(Some(Stmt {
                kind: StmtKind::Assign {
                    target: expr,
                    value,
                },
                span,
                end_pos: self.pos,
            }));
        }

        if matches!(expr.kind, ExprKind::Call { .. }) {
            return Err(self.err_after("expected ';' after function call"));
        }
        Err(self.err_after("expected '=' or '('"))
    }

    fn stmt(&mut self) -> Result<Option<Stmt>, String> {
        if let Some(stmt) = self.vardecl()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.print_stmt()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.funcdecl()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.return_stmt()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.if_stmt()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.while_stmt()? {
            return Ok(Some(stmt));
        }
        self.assign_or_call()
    }

    fn block(&mut self, params: &[usize]) -> Result<Block, String> {
        let scope_id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: self.cur_scope,
            decls: Vec::new(),
            hosting_func: None,
            had_side_effects: false,
            tmp_count: 0,
        });
        let saved = self.cur_scope.replace(scope_id);

        for &param in params {
            let name = self.ident_symbol(param);
            let decl = Decl {
                name,
                span: self.tokens[param].span,
                end_pos: param + 1,
                scope: scope_id,
                init_deferred: false,
                is_captured: false,
                kind: DeclKind::Var {
                    is_param: true,
                    const_init: None,
                },
            };
            if self.declare(decl).is_none() {
                return Err(self.err_span(
                    self.tokens[param].span,
                    &format!(
                        "parameter {} already declared",
                        self.interner.resolve(name)
                    ),
                ));
            }
        }

        let mut stmts = Vec::new();
        while let Some(stmt) = self.stmt()? {
            stmts.push(stmt);
        }

        self.cur_scope = saved;
        Ok(Block {
            stmts,
            scope: scope_id,
        })
    }
}
