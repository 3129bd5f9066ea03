//! In-place AST rewriters that run between analysis and code generation.

pub mod converter;
pub mod func_names;
pub mod optimizer;
pub mod reference;
pub mod struct_params;

use crate::ast::{Expr, ExprKind, Stmt};

/// Apply `f` to every expression node under `stmt`, children first, so a
/// rewrite sees its operands already transformed.
pub(crate) fn visit_stmt_exprs(stmt: &mut Stmt, f: &mut impl FnMut(&mut Expr)) {
    match stmt {
        Stmt::Null { .. } | Stmt::CtrlTransfer { .. } => {}
        Stmt::CodeBlock { block, .. } => {
            for stmt in &mut block.stmts {
                visit_stmt_exprs(stmt, f);
            }
        }
        Stmt::FunctionDecl(decl) => {
            for param in &mut decl.parameters {
                for var_decl in &mut param.var_decls {
                    if let Some(init) = &mut var_decl.initializer {
                        visit_expr_tree(init, f);
                    }
                }
            }
            if let Some(body) = &mut decl.body {
                for stmt in &mut body.stmts {
                    visit_stmt_exprs(stmt, f);
                }
            }
        }
        Stmt::StructDecl { .. } => {}
        Stmt::UniformBufferDecl(decl) => {
            for member in &mut decl.members {
                for var_decl in &mut member.var_decls {
                    if let Some(init) = &mut var_decl.initializer {
                        visit_expr_tree(init, f);
                    }
                }
            }
        }
        Stmt::BufferDecls(_) | Stmt::SamplerDecls(_) | Stmt::AliasDecls(_) => {}
        Stmt::VarDecls(var_stmt) => {
            for var_decl in &mut var_stmt.var_decls {
                if let Some(init) = &mut var_decl.initializer {
                    visit_expr_tree(init, f);
                }
            }
        }
        Stmt::For(for_stmt) => {
            if let Some(init) = &mut for_stmt.init {
                visit_stmt_exprs(init, f);
            }
            if let Some(condition) = &mut for_stmt.condition {
                visit_expr_tree(condition, f);
            }
            if let Some(iteration) = &mut for_stmt.iteration {
                visit_expr_tree(iteration, f);
            }
            visit_stmt_exprs(&mut for_stmt.body, f);
        }
        Stmt::While(while_stmt) => {
            visit_expr_tree(&mut while_stmt.condition, f);
            visit_stmt_exprs(&mut while_stmt.body, f);
        }
        Stmt::DoWhile(do_while_stmt) => {
            visit_stmt_exprs(&mut do_while_stmt.body, f);
            visit_expr_tree(&mut do_while_stmt.condition, f);
        }
        Stmt::If(if_stmt) => {
            visit_expr_tree(&mut if_stmt.condition, f);
            visit_stmt_exprs(&mut if_stmt.then_branch, f);
            if let Some(else_branch) = &mut if_stmt.else_branch {
                visit_stmt_exprs(else_branch, f);
            }
        }
        Stmt::Switch(switch_stmt) => {
            visit_expr_tree(&mut switch_stmt.selector, f);
            for case in &mut switch_stmt.cases {
                if let Some(expr) = &mut case.expr {
                    visit_expr_tree(expr, f);
                }
                for stmt in &mut case.stmts {
                    visit_stmt_exprs(stmt, f);
                }
            }
        }
        Stmt::Expr(expr_stmt) => visit_expr_tree(&mut expr_stmt.expr, f),
        Stmt::Return(return_stmt) => {
            if let Some(expr) = &mut return_stmt.expr {
                visit_expr_tree(expr, f);
            }
        }
    }
}

pub(crate) fn visit_expr_tree(expr: &mut Expr, f: &mut impl FnMut(&mut Expr)) {
    match &mut expr.kind {
        ExprKind::Literal(_) => {}
        ExprKind::Sequence(exprs) | ExprKind::Initializer(exprs) => {
            for expr in exprs {
                visit_expr_tree(expr, f);
            }
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            visit_expr_tree(cond, f);
            visit_expr_tree(then_expr, f);
            visit_expr_tree(else_expr, f);
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            visit_expr_tree(lhs, f);
            visit_expr_tree(rhs, f);
        }
        ExprKind::Unary { operand, .. } | ExprKind::PostUnary { operand, .. } => {
            visit_expr_tree(operand, f);
        }
        ExprKind::Call(call) => {
            if let Some(prefix) = &mut call.prefix {
                visit_expr_tree(prefix, f);
            }
            for arg in &mut call.args {
                visit_expr_tree(arg, f);
            }
        }
        ExprKind::Bracket(inner) => visit_expr_tree(inner, f),
        ExprKind::Object(object) => {
            if let Some(prefix) = &mut object.prefix {
                visit_expr_tree(prefix, f);
            }
        }
        ExprKind::Array { prefix, indices } => {
            visit_expr_tree(prefix, f);
            for index in indices {
                visit_expr_tree(index, f);
            }
        }
        ExprKind::Cast { operand, .. } => visit_expr_tree(operand, f),
        ExprKind::Assign { lhs, rhs, .. } => {
            visit_expr_tree(lhs, f);
            visit_expr_tree(rhs, f);
        }
    }
    f(expr);
}
