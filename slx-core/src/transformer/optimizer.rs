//! Opt-in AST level optimization: constant folding and removal of
//! statically dead statements. Anything beyond that is out of scope.

use crate::ast::*;
use crate::eval::{evaluate, Variant};
use crate::transformer::visit_stmt_exprs;

pub struct Optimizer;

impl Optimizer {
    pub fn optimize(program: &mut Program) {
        for stmt in &mut program.global_stmts {
            visit_stmt_exprs(stmt, &mut fold_expr);
        }
        for stmt in &mut program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if let Some(body) = &mut decl.body {
                    optimize_block(&mut body.stmts);
                }
            }
        }
    }
}

/// Replace a constant composite by its literal value. Only scalar
/// results fold; vector folding would lose constructor shapes.
fn fold_expr(expr: &mut Expr) {
    match expr.kind {
        ExprKind::Literal(_) | ExprKind::Object(_) => return,
        _ => {}
    }
    if expr.ty.as_ref().map(|ty| ty.is_scalar()) != Some(true) {
        return;
    }
    let Some(value) = evaluate(expr) else {
        return;
    };
    let literal = match value {
        Variant::Bool(b) => Literal {
            kind: LiteralKind::Bool,
            spell: b.to_string(),
        },
        Variant::Int(i) => Literal {
            kind: LiteralKind::Int,
            spell: i.to_string(),
        },
        Variant::Real(r) => Literal {
            kind: LiteralKind::Float,
            spell: format_float(r),
        },
    };
    expr.kind = ExprKind::Literal(literal);
}

fn format_float(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{}.0", text)
    }
}

fn optimize_block(stmts: &mut Vec<Stmt>) {
    for stmt in stmts.iter_mut() {
        optimize_stmt(stmt);
    }
    stmts.retain(|stmt| !matches!(stmt, Stmt::Null { .. }));
}

fn optimize_stmt(stmt: &mut Stmt) {
    match stmt {
        Stmt::CodeBlock { block, .. } => optimize_block(&mut block.stmts),
        Stmt::FunctionDecl(decl) => {
            if let Some(body) = &mut decl.body {
                optimize_block(&mut body.stmts);
            }
        }
        Stmt::For(for_stmt) => optimize_stmt(&mut for_stmt.body),
        Stmt::While(while_stmt) => optimize_stmt(&mut while_stmt.body),
        Stmt::DoWhile(do_while_stmt) => optimize_stmt(&mut do_while_stmt.body),
        Stmt::Switch(switch_stmt) => {
            for case in &mut switch_stmt.cases {
                optimize_block(&mut case.stmts);
            }
        }
        Stmt::If(_) => {
            // A constant condition selects one branch statically.
            let replacement = {
                let Stmt::If(if_stmt) = &mut *stmt else {
                    unreachable!("matched above");
                };
                optimize_stmt(&mut if_stmt.then_branch);
                if let Some(else_branch) = &mut if_stmt.else_branch {
                    optimize_stmt(else_branch);
                }
                match evaluate(&if_stmt.condition) {
                    Some(value) if value.to_bool() => {
                        Some(std::mem::replace(
                            &mut *if_stmt.then_branch,
                            Stmt::Null { area: if_stmt.area },
                        ))
                    }
                    Some(_) => Some(match &mut if_stmt.else_branch {
                        Some(else_branch) => std::mem::replace(
                            &mut **else_branch,
                            Stmt::Null { area: if_stmt.area },
                        ),
                        None => Stmt::Null { area: if_stmt.area },
                    }),
                    None => None,
                }
            };
            if let Some(replacement) = replacement {
                *stmt = replacement;
            }
        }
        _ => {}
    }
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
            shader_target: ShaderTarget::FragmentShader,
            output_version: OutputShaderVersion::GLSL450,
            name_mangling: &mangling,
            warnings_enabled: false,
        };
        assert!(analyzer.decorate(&mut program, &ctx));
        Optimizer::optimize(&mut program);
        program
    }

    fn entry_body(program: &Program) -> &Vec<Stmt> {
        for stmt in &program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if decl.flags.contains(Flags::IS_ENTRY_POINT) {
                    return &decl.body.as_ref().unwrap().stmts;
                }
            }
        }
        panic!("entry not found");
    }

    #[test]
    fn test_constant_folding() {
        let program = run(
            "float4 main() : SV_Target { float x = 1.0 + 2.0 * 3.0; return x.xxxx; }",
            "main",
        );
        let Stmt::VarDecls(var_stmt) = &entry_body(&program)[0] else {
            panic!("expected var decl");
        };
        let init = var_stmt.var_decls[0].initializer.as_ref().unwrap();
        let ExprKind::Literal(literal) = &init.kind else {
            panic!("expected folded literal, got {:?}", init.kind);
        };
        assert_eq!(literal.spell, "7.0");
    }

    #[test]
    fn test_dead_branch_removed() {
        let program = run(
            "float4 main() : SV_Target {\n\
               float x = 0.0;\n\
               if (false) { x = 1.0; } else { x = 2.0; }\n\
               return x.xxxx;\n\
             }",
            "main",
        );
        let body = entry_body(&program);
        // The if statement collapsed into its else branch.
        assert!(matches!(body[1], Stmt::CodeBlock { .. }));
    }

    #[test]
    fn test_null_statements_removed() {
        let program = run(
            "float4 main() : SV_Target { ;;; return float4(0, 0, 0, 0); }",
            "main",
        );
        assert_eq!(entry_body(&program).len(), 1);
    }
}
