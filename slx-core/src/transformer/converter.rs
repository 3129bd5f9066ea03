//! Expression and type rewrites for targets without an HLSL equivalent.
//!
//! The GLSL family multiplies matrices with `*` in reversed operand
//! order, writes casts as constructor calls, and has no implicit
//! scalar-to-vector initialization. These rewrites run in place after
//! analysis; everything else is handled by the keyword maps at emission.

use crate::ast::*;
use crate::transformer::visit_stmt_exprs;
use std::rc::Rc;
use crate::type_denoter::TypeDenoter;

pub struct Converter;

impl Converter {
    pub fn convert_for_glsl(program: &mut Program) {
        for stmt in &mut program.global_stmts {
            visit_stmt_exprs(stmt, &mut convert_expr);
        }
        // Scalar initializers of vector and matrix typed declarations
        // become explicit constructor calls.
        for stmt in &mut program.global_stmts {
            convert_var_initializers_in_stmt(stmt);
        }
    }
}

fn convert_expr(expr: &mut Expr) {
    let replacement = match &mut expr.kind {
        // mul(a, b) becomes (b * a): HLSL treats vectors as rows, GLSL as
        // columns, so the operand order flips.
        ExprKind::Call(call)
            if call.intrinsic == Some(Intrinsic::Mul) && call.args.len() == 2 =>
        {
            let rhs = call.args.pop().expect("two arguments checked");
            let lhs = call.args.pop().expect("two arguments checked");
            let area = expr.area;
            let mut product = Expr::new(
                area,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(rhs),
                    rhs: Box::new(lhs),
                },
            );
            product.ty = expr.ty.clone();
            let mut bracket = Expr::new(area, ExprKind::Bracket(Box::new(product)));
            bracket.ty = expr.ty.clone();
            Some(bracket.kind)
        }
        // (T)x becomes T(x) for base types; same-type struct casts drop.
        ExprKind::Cast { type_spec, operand } => {
            if type_spec.ty.as_base().is_some() {
                let operand = std::mem::replace(
                    operand,
                    Box::new(Expr::new(expr.area, ExprKind::Sequence(Vec::new()))),
                );
                Some(ExprKind::Call(CallExpr {
                    prefix: None,
                    ident: None,
                    type_ctor: Some(Rc::clone(&type_spec.ty)),
                    args: vec![*operand],
                    func_ref: None,
                    intrinsic: None,
                }))
            } else {
                let operand = std::mem::replace(
                    operand,
                    Box::new(Expr::new(expr.area, ExprKind::Sequence(Vec::new()))),
                );
                Some(operand.kind)
            }
        }
        _ => None,
    };
    if let Some(kind) = replacement {
        expr.kind = kind;
    }
}

fn convert_var_initializers_in_stmt(stmt: &mut Stmt) {
    match stmt {
        Stmt::VarDecls(var_stmt) => {
            for var_decl in &mut var_stmt.var_decls {
                convert_initializer(var_decl);
            }
        }
        Stmt::FunctionDecl(decl) => {
            if let Some(body) = &mut decl.body {
                for stmt in &mut body.stmts {
                    convert_var_initializers_in_stmt(stmt);
                }
            }
        }
        Stmt::CodeBlock { block, .. } => {
            for stmt in &mut block.stmts {
                convert_var_initializers_in_stmt(stmt);
            }
        }
        Stmt::For(for_stmt) => {
            if let Some(init) = &mut for_stmt.init {
                convert_var_initializers_in_stmt(init);
            }
            convert_var_initializers_in_stmt(&mut for_stmt.body);
        }
        Stmt::While(while_stmt) => convert_var_initializers_in_stmt(&mut while_stmt.body),
        Stmt::DoWhile(do_while_stmt) => convert_var_initializers_in_stmt(&mut do_while_stmt.body),
        Stmt::If(if_stmt) => {
            convert_var_initializers_in_stmt(&mut if_stmt.then_branch);
            if let Some(else_branch) = &mut if_stmt.else_branch {
                convert_var_initializers_in_stmt(else_branch);
            }
        }
        Stmt::Switch(switch_stmt) => {
            for case in &mut switch_stmt.cases {
                for stmt in &mut case.stmts {
                    convert_var_initializers_in_stmt(stmt);
                }
            }
        }
        _ => {}
    }
}

/// `float3 v = 0;` becomes `float3 v = float3(0);` so the broadcast is
/// explicit in the output.
fn convert_initializer(var_decl: &mut VarDecl) {
    let Some(target_ty) = &var_decl.ty else {
        return;
    };
    let resolved = target_ty.get_aliased();
    let needs_ctor = resolved
        .as_base()
        .map(|dt| !dt.is_scalar())
        .unwrap_or(false);
    if !needs_ctor {
        return;
    }
    let Some(init) = &mut var_decl.initializer else {
        return;
    };
    let init_is_scalar = init
        .ty
        .as_ref()
        .map(|ty| ty.is_scalar())
        .unwrap_or(false);
    if !init_is_scalar {
        return;
    }
    let area = init.area;
    let inner = std::mem::replace(init, Expr::new(area, ExprKind::Sequence(Vec::new())));
    let mut call = Expr::new(
        area,
        ExprKind::Call(CallExpr {
            prefix: None,
            ident: None,
            type_ctor: Some(Rc::clone(&resolved)),
            args: vec![inner],
            func_ref: None,
            intrinsic: None,
        }),
    );
    call.ty = Some(Rc::clone(&resolved));
    *init = call;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analyzer, AnalyzerContext};
    use crate::lexer::tokenize;
    use crate::options::{NameMangling, OutputShaderVersion, ShaderTarget};
    use crate::parser::Parser;

    fn run(source: &str, entry: &str) -> Program {
        let (tokens, _) = tokenize(source, false);
        let mut parser = Parser::new(tokens, None);
        let mut program = parser.parse_program().expect("parse failed");
        let mangling = NameMangling::default();
        let mut analyzer = Analyzer::new(None);
        let ctx = AnalyzerContext {
            entry_point: entry,
            secondary_entry_point: None,
            shader_target: ShaderTarget::VertexShader,
            output_version: OutputShaderVersion::GLSL450,
            name_mangling: &mangling,
            warnings_enabled: false,
        };
        assert!(analyzer.decorate(&mut program, &ctx));
        Converter::convert_for_glsl(&mut program);
        program
    }

    fn entry_return_expr(program: &Program) -> Expr {
        for stmt in &program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if decl.flags.contains(Flags::IS_ENTRY_POINT) {
                    for stmt in &decl.body.as_ref().unwrap().stmts {
                        if let Stmt::Return(ret) = stmt {
                            return ret.expr.clone().unwrap();
                        }
                    }
                }
            }
        }
        panic!("entry return not found");
    }

    #[test]
    fn test_mul_becomes_reversed_product() {
        let program = run(
            "float4x4 world;\n\
             float4 main(float4 pos : POSITION) : SV_Position { return mul(world, pos); }",
            "main",
        );
        let ret = entry_return_expr(&program);
        let ExprKind::Bracket(inner) = &ret.kind else {
            panic!("expected bracketed product, got {:?}", ret.kind);
        };
        let ExprKind::Binary { op, lhs, rhs } = &inner.kind else {
            panic!("expected binary product");
        };
        assert_eq!(*op, BinaryOp::Mul);
        // Operands are swapped: the vector comes first.
        let ExprKind::Object(lhs_obj) = &lhs.kind else {
            panic!("expected object");
        };
        assert_eq!(lhs_obj.ident.original, "pos");
        let ExprKind::Object(rhs_obj) = &rhs.kind else {
            panic!("expected object");
        };
        assert_eq!(rhs_obj.ident.original, "world");
    }

    #[test]
    fn test_cast_becomes_constructor() {
        let program = run(
            "float4 main() : SV_Position { float x = (float)1; return x.xxxx; }",
            "main",
        );
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        let Stmt::VarDecls(var_stmt) = &decl.body.as_ref().unwrap().stmts[0] else {
            panic!("expected var decl");
        };
        let init = var_stmt.var_decls[0].initializer.as_ref().unwrap();
        let ExprKind::Call(call) = &init.kind else {
            panic!("expected constructor call, got {:?}", init.kind);
        };
        assert!(call.type_ctor.is_some());
    }

    #[test]
    fn test_scalar_vector_initializer_broadcast() {
        let program = run(
            "float4 main() : SV_Position { float3 v = 0; return v.xyzx; }",
            "main",
        );
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        let Stmt::VarDecls(var_stmt) = &decl.body.as_ref().unwrap().stmts[0] else {
            panic!("expected var decl");
        };
        let init = var_stmt.var_decls[0].initializer.as_ref().unwrap();
        let ExprKind::Call(call) = &init.kind else {
            panic!("expected broadcast constructor, got {:?}", init.kind);
        };
        assert!(matches!(
            call.type_ctor.as_deref(),
            Some(TypeDenoter::Base(_))
        ));
        assert_eq!(call.args.len(), 1);
    }
}
