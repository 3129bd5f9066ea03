//! AST visitor for read-only traversal passes.
//!
//! Passes that only inspect the decorated tree (reachability edges,
//! struct usage, reflection) implement `Visitor` and override the hooks
//! they need; the `walk_*` functions perform the canonical traversal.
//! Passes that rewrite the tree (analyzer, converters) recurse directly.

use crate::ast::*;
use std::ops::ControlFlow;

pub trait Visitor: Sized {
    type Break;

    fn visit_program(&mut self, program: &Program) -> ControlFlow<Self::Break> {
        walk_program(self, program)
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> ControlFlow<Self::Break> {
        walk_stmt(self, stmt)
    }

    fn visit_code_block(&mut self, block: &CodeBlock) -> ControlFlow<Self::Break> {
        walk_code_block(self, block)
    }

    fn visit_function_decl(&mut self, decl: &FunctionDecl) -> ControlFlow<Self::Break> {
        walk_function_decl(self, decl)
    }

    fn visit_struct_decl(&mut self, decl: &StructDecl) -> ControlFlow<Self::Break> {
        walk_struct_decl(self, decl)
    }

    fn visit_uniform_buffer_decl(&mut self, decl: &UniformBufferDecl) -> ControlFlow<Self::Break> {
        walk_uniform_buffer_decl(self, decl)
    }

    fn visit_buffer_decls(&mut self, stmt: &BufferDeclStmt) -> ControlFlow<Self::Break> {
        walk_buffer_decls(self, stmt)
    }

    fn visit_sampler_decls(&mut self, stmt: &SamplerDeclStmt) -> ControlFlow<Self::Break> {
        walk_sampler_decls(self, stmt)
    }

    fn visit_alias_decls(&mut self, stmt: &AliasDeclStmt) -> ControlFlow<Self::Break> {
        let _ = stmt;
        ControlFlow::Continue(())
    }

    fn visit_var_decls(&mut self, stmt: &VarDeclStmt) -> ControlFlow<Self::Break> {
        walk_var_decls(self, stmt)
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) -> ControlFlow<Self::Break> {
        walk_var_decl(self, decl)
    }

    fn visit_type_specifier(&mut self, spec: &TypeSpecifier) -> ControlFlow<Self::Break> {
        walk_type_specifier(self, spec)
    }

    fn visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        walk_expr(self, expr)
    }

    fn visit_object_expr(&mut self, expr: &ObjectExpr) -> ControlFlow<Self::Break> {
        walk_object_expr(self, expr)
    }

    fn visit_call_expr(&mut self, expr: &CallExpr) -> ControlFlow<Self::Break> {
        walk_call_expr(self, expr)
    }
}

pub fn walk_program<V: Visitor>(v: &mut V, program: &Program) -> ControlFlow<V::Break> {
    for stmt in &program.global_stmts {
        v.visit_stmt(stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_stmt<V: Visitor>(v: &mut V, stmt: &Stmt) -> ControlFlow<V::Break> {
    match stmt {
        Stmt::Null { .. } => ControlFlow::Continue(()),
        Stmt::CodeBlock { block, .. } => v.visit_code_block(block),
        Stmt::FunctionDecl(decl) => v.visit_function_decl(decl),
        Stmt::StructDecl { decl, .. } => v.visit_struct_decl(decl),
        Stmt::UniformBufferDecl(decl) => v.visit_uniform_buffer_decl(decl),
        Stmt::BufferDecls(stmt) => v.visit_buffer_decls(stmt),
        Stmt::SamplerDecls(stmt) => v.visit_sampler_decls(stmt),
        Stmt::AliasDecls(stmt) => v.visit_alias_decls(stmt),
        Stmt::VarDecls(stmt) => v.visit_var_decls(stmt),
        Stmt::For(stmt) => {
            if let Some(init) = &stmt.init {
                v.visit_stmt(init)?;
            }
            if let Some(condition) = &stmt.condition {
                v.visit_expr(condition)?;
            }
            if let Some(iteration) = &stmt.iteration {
                v.visit_expr(iteration)?;
            }
            v.visit_stmt(&stmt.body)
        }
        Stmt::While(stmt) => {
            v.visit_expr(&stmt.condition)?;
            v.visit_stmt(&stmt.body)
        }
        Stmt::DoWhile(stmt) => {
            v.visit_stmt(&stmt.body)?;
            v.visit_expr(&stmt.condition)
        }
        Stmt::If(stmt) => {
            v.visit_expr(&stmt.condition)?;
            v.visit_stmt(&stmt.then_branch)?;
            if let Some(else_branch) = &stmt.else_branch {
                v.visit_stmt(else_branch)?;
            }
            ControlFlow::Continue(())
        }
        Stmt::Switch(stmt) => {
            v.visit_expr(&stmt.selector)?;
            for case in &stmt.cases {
                if let Some(expr) = &case.expr {
                    v.visit_expr(expr)?;
                }
                for stmt in &case.stmts {
                    v.visit_stmt(stmt)?;
                }
            }
            ControlFlow::Continue(())
        }
        Stmt::Expr(stmt) => v.visit_expr(&stmt.expr),
        Stmt::Return(stmt) => {
            if let Some(expr) = &stmt.expr {
                v.visit_expr(expr)?;
            }
            ControlFlow::Continue(())
        }
        Stmt::CtrlTransfer { .. } => ControlFlow::Continue(()),
    }
}

pub fn walk_code_block<V: Visitor>(v: &mut V, block: &CodeBlock) -> ControlFlow<V::Break> {
    for stmt in &block.stmts {
        v.visit_stmt(stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_function_decl<V: Visitor>(v: &mut V, decl: &FunctionDecl) -> ControlFlow<V::Break> {
    v.visit_type_specifier(&decl.return_type)?;
    for param in &decl.parameters {
        v.visit_var_decls(param)?;
    }
    if let Some(body) = &decl.body {
        v.visit_code_block(body)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_struct_decl<V: Visitor>(v: &mut V, decl: &StructDecl) -> ControlFlow<V::Break> {
    for member in &decl.members {
        v.visit_var_decls(member)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_uniform_buffer_decl<V: Visitor>(v: &mut V, decl: &UniformBufferDecl) -> ControlFlow<V::Break> {
    for member in &decl.members {
        v.visit_var_decls(member)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_buffer_decls<V: Visitor>(v: &mut V, stmt: &BufferDeclStmt) -> ControlFlow<V::Break> {
    for decl in &stmt.buffer_decls {
        for dim in &decl.array_dims {
            if let Some(expr) = &dim.expr {
                v.visit_expr(expr)?;
            }
        }
    }
    ControlFlow::Continue(())
}

pub fn walk_sampler_decls<V: Visitor>(v: &mut V, stmt: &SamplerDeclStmt) -> ControlFlow<V::Break> {
    for decl in &stmt.sampler_decls {
        for value in &decl.values {
            v.visit_expr(&value.value)?;
        }
    }
    ControlFlow::Continue(())
}

pub fn walk_var_decls<V: Visitor>(v: &mut V, stmt: &VarDeclStmt) -> ControlFlow<V::Break> {
    v.visit_type_specifier(&stmt.type_spec)?;
    for decl in &stmt.var_decls {
        v.visit_var_decl(decl)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_var_decl<V: Visitor>(v: &mut V, decl: &VarDecl) -> ControlFlow<V::Break> {
    for dim in &decl.array_dims {
        if let Some(expr) = &dim.expr {
            v.visit_expr(expr)?;
        }
    }
    if let Some(init) = &decl.initializer {
        v.visit_expr(init)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_type_specifier<V: Visitor>(v: &mut V, spec: &TypeSpecifier) -> ControlFlow<V::Break> {
    if let Some(decl) = &spec.struct_decl {
        v.visit_struct_decl(decl)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &Expr) -> ControlFlow<V::Break> {
    match &expr.kind {
        ExprKind::Literal(_) => ControlFlow::Continue(()),
        ExprKind::Sequence(exprs) | ExprKind::Initializer(exprs) => {
            for expr in exprs {
                v.visit_expr(expr)?;
            }
            ControlFlow::Continue(())
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            v.visit_expr(cond)?;
            v.visit_expr(then_expr)?;
            v.visit_expr(else_expr)
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            v.visit_expr(lhs)?;
            v.visit_expr(rhs)
        }
        ExprKind::Unary { operand, .. } | ExprKind::PostUnary { operand, .. } => {
            v.visit_expr(operand)
        }
        ExprKind::Call(call) => v.visit_call_expr(call),
        ExprKind::Bracket(inner) => v.visit_expr(inner),
        ExprKind::Object(object) => v.visit_object_expr(object),
        ExprKind::Array { prefix, indices } => {
            v.visit_expr(prefix)?;
            for index in indices {
                v.visit_expr(index)?;
            }
            ControlFlow::Continue(())
        }
        ExprKind::Cast { type_spec, operand } => {
            v.visit_type_specifier(type_spec)?;
            v.visit_expr(operand)
        }
        ExprKind::Assign { lhs, rhs, .. } => {
            v.visit_expr(lhs)?;
            v.visit_expr(rhs)
        }
    }
}

pub fn walk_object_expr<V: Visitor>(v: &mut V, expr: &ObjectExpr) -> ControlFlow<V::Break> {
    if let Some(prefix) = &expr.prefix {
        v.visit_expr(prefix)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_call_expr<V: Visitor>(v: &mut V, expr: &CallExpr) -> ControlFlow<V::Break> {
    if let Some(prefix) = &expr.prefix {
        v.visit_expr(prefix)?;
    }
    for arg in &expr.args {
        v.visit_expr(arg)?;
    }
    ControlFlow::Continue(())
}
