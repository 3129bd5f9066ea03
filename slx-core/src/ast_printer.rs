//! Compact AST dump for the `show_ast` option.
//!
//! Produces an indented outline of the decorated tree, one node per
//! line, with resolved types where the analyzer computed them.

use crate::ast::*;
use std::fmt::Write;

pub struct AstPrinter {
    output: String,
    indent: usize,
}

impl Default for AstPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl AstPrinter {
    pub fn new() -> Self {
        AstPrinter {
            output: String::new(),
            indent: 0,
        }
    }

    pub fn print_program(program: &Program) -> String {
        let mut printer = AstPrinter::new();
        for stmt in &program.global_stmts {
            printer.write_stmt(stmt);
        }
        printer.output
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.output, "{}{}", "  ".repeat(self.indent), text);
    }

    fn nested(&mut self, header: &str, f: impl FnOnce(&mut Self)) {
        self.line(header);
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    fn write_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Null { .. } => self.line("NullStmt"),
            Stmt::CodeBlock { block, .. } => {
                self.nested("CodeBlock", |p| {
                    for stmt in &block.stmts {
                        p.write_stmt(stmt);
                    }
                });
            }
            Stmt::FunctionDecl(decl) => {
                let header = format!(
                    "FunctionDecl '{}' : {} ({} params){}",
                    decl.ident.final_name(),
                    decl.return_type.ty,
                    decl.parameters.len(),
                    if decl.flags.contains(Flags::IS_ENTRY_POINT) {
                        " [entry]"
                    } else {
                        ""
                    }
                );
                self.nested(&header, |p| {
                    if let Some(body) = &decl.body {
                        for stmt in &body.stmts {
                            p.write_stmt(stmt);
                        }
                    }
                });
            }
            Stmt::StructDecl { decl, .. } => {
                self.line(&format!(
                    "StructDecl '{}' ({} members)",
                    decl.ident.final_name(),
                    decl.members.len()
                ));
            }
            Stmt::UniformBufferDecl(decl) => {
                self.line(&format!(
                    "UniformBufferDecl '{}' ({} members)",
                    decl.ident.final_name(),
                    decl.members.len()
                ));
            }
            Stmt::BufferDecls(buffer_stmt) => {
                for decl in &buffer_stmt.buffer_decls {
                    self.line(&format!("BufferDecl '{}'", decl.ident.final_name()));
                }
            }
            Stmt::SamplerDecls(sampler_stmt) => {
                for decl in &sampler_stmt.sampler_decls {
                    self.line(&format!("SamplerDecl '{}'", decl.ident.final_name()));
                }
            }
            Stmt::AliasDecls(alias_stmt) => {
                for decl in &alias_stmt.aliases {
                    self.line(&format!("AliasDecl '{}' = {}", decl.ident.final_name(), decl.ty));
                }
            }
            Stmt::VarDecls(var_stmt) => {
                for var_decl in &var_stmt.var_decls {
                    let ty = var_decl
                        .ty
                        .as_ref()
                        .map(|ty| ty.to_string())
                        .unwrap_or_else(|| var_stmt.type_spec.ty.to_string());
                    self.line(&format!("VarDecl '{}' : {}", var_decl.ident.final_name(), ty));
                }
            }
            Stmt::For(for_stmt) => {
                self.nested("ForStmt", |p| p.write_stmt(&for_stmt.body));
            }
            Stmt::While(while_stmt) => {
                self.nested("WhileStmt", |p| p.write_stmt(&while_stmt.body));
            }
            Stmt::DoWhile(do_while_stmt) => {
                self.nested("DoWhileStmt", |p| p.write_stmt(&do_while_stmt.body));
            }
            Stmt::If(if_stmt) => {
                self.nested("IfStmt", |p| {
                    p.write_stmt(&if_stmt.then_branch);
                    if let Some(else_branch) = &if_stmt.else_branch {
                        p.write_stmt(else_branch);
                    }
                });
            }
            Stmt::Switch(switch_stmt) => {
                self.line(&format!("SwitchStmt ({} cases)", switch_stmt.cases.len()));
            }
            Stmt::Expr(expr_stmt) => {
                let ty = expr_stmt
                    .expr
                    .ty
                    .as_ref()
                    .map(|ty| format!(" : {}", ty))
                    .unwrap_or_default();
                self.line(&format!("ExprStmt{}", ty));
            }
            Stmt::Return(return_stmt) => {
                let ty = return_stmt
                    .expr
                    .as_ref()
                    .and_then(|e| e.ty.as_ref())
                    .map(|ty| format!(" : {}", ty))
                    .unwrap_or_default();
                self.line(&format!("ReturnStmt{}", ty));
            }
            Stmt::CtrlTransfer { transfer, .. } => {
                self.line(&format!("CtrlTransferStmt '{}'", transfer.to_str()));
            }
        }
    }
}
