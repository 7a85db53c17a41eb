//! Translation-unit assembly.
//!
//! One C file per module: the runtime include, prototypes for every
//! generated function, the file-scope global frame struct, the function
//! implementations, and `main` running the top-level block.

use crate::ast::{Block, DeclId, Module, StmtKind};

use super::{CodeGen, CodeGenError};

/// Collect every function declaration in the module, depth-first in source
/// order, paired with its body block.
fn collect_functions<'m>(block: &'m Block, out: &mut Vec<(DeclId, &'m Block)>) {
    for stmt in &block.stmts {
        match &stmt.kind {
            StmtKind::FuncDecl { decl, body } => {
                out.push((*decl, body));
                collect_functions(body, out);
            }
            StmtKind::If {
                body, else_body, ..
            } => {
                collect_functions(body, out);
                if let Some(else_body) = else_body {
                    collect_functions(else_body, out);
                }
            }
            StmtKind::While { body, .. } => collect_functions(body, out),
            _ => {}
        }
    }
}

impl<'a> CodeGen<'a> {
    pub fn generate(mut self) -> Result<String, CodeGenError> {
        let module: &Module = self.module;

        let mut functions = Vec::new();
        collect_functions(&module.body, &mut functions);

        self.line("#include \"rill_runtime.h\"")?;
        self.blank();

        self.line("// function prototypes:")?;
        for &(decl, _) in &functions {
            let text = format!(
                "static Value {}(Value *enclosed, const Value *args);",
                self.func_c_name(decl)
            );
            self.line(&text)?;
        }
        self.blank();

        self.line("// global scope:")?;
        self.gen_scope_struct(module.body.scope, true)?;
        self.blank();

        self.line("// function implementations:")?;
        for &(decl, body) in &functions {
            self.gen_function(decl, body)?;
            self.blank();
        }

        self.line("// main function:")?;
        self.line("int main(void) {")?;
        self.level += 1;
        self.gen_block(&module.body, None)?;
        self.line("return 0;")?;
        self.level -= 1;
        self.line("}")?;

        Ok(self.output)
    }

    fn gen_function(&mut self, decl: DeclId, body: &Block) -> Result<(), CodeGenError> {
        let head = format!(
            "static Value {}(Value *enclosed, const Value *args) {{",
            self.func_c_name(decl)
        );
        self.line(&head)?;
        self.level += 1;

        let d = self.module.decl(decl);
        let (arity, has_captures) = match &d.kind {
            crate::ast::DeclKind::Func {
                arity, captures, ..
            } => (*arity, !captures.is_empty()),
            _ => unreachable!("generating a non-function declaration"),
        };
        if !has_captures {
            self.line("(void)enclosed;")?;
        }
        if arity == 0 {
            self.line("(void)args;")?;
        }

        let saved = self.cur_func.replace(decl);
        self.gen_block(body, Some(decl))?;
        self.cur_func = saved;

        self.line("return NULL_VALUE;")?;
        self.level -= 1;
        self.line("}")?;
        Ok(())
    }
}
