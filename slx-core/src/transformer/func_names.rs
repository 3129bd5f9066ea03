//! Function name mangling for overload sets.
//!
//! Output dialects have no overloading, so every overloaded function gets
//! a unique name built from the configured prefixes and its parameter
//! types. Call sites follow their resolved declaration back references.

use crate::ast::*;
use crate::options::NameMangling;
use crate::transformer::visit_stmt_exprs;
use crate::type_denoter::{DataType, TypeDenoter};
use std::collections::HashMap;
use std::rc::Rc;

pub struct FuncNameConverter;

impl FuncNameConverter {
    pub fn convert_function_names(program: &mut Program, mangling: &NameMangling) {
        // Group declarations by their original name.
        let mut groups: HashMap<String, Vec<NodeId>> = HashMap::new();
        for stmt in &program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                groups
                    .entry(decl.ident.original.clone())
                    .or_default()
                    .push(decl.id);
            }
        }

        let mut renames: HashMap<NodeId, String> = HashMap::new();
        for stmt in &mut program.global_stmts {
            let Stmt::FunctionDecl(decl) = stmt else {
                continue;
            };
            let overloaded = groups
                .get(&decl.ident.original)
                .map(|ids| ids.len() > 1)
                .unwrap_or(false);
            let is_entry = decl.flags.contains(Flags::IS_ENTRY_POINT)
                || decl.flags.contains(Flags::IS_SECONDARY_ENTRY_POINT);
            if !overloaded || is_entry {
                continue;
            }
            let suffix = decl
                .parameters
                .iter()
                .map(|param| {
                    param
                        .var_decls
                        .first()
                        .and_then(|v| v.ty.clone())
                        .map(|ty| type_suffix(&ty))
                        .unwrap_or_else(|| "x".into())
                })
                .collect::<Vec<_>>()
                .join("_");
            let mangled = format!(
                "{}{}{}_{}",
                mangling.namespace_prefix, mangling.temporary_prefix, decl.ident.original, suffix
            );
            decl.ident.rename(mangled.clone());
            renames.insert(decl.id, mangled);
        }

        if renames.is_empty() {
            return;
        }

        // Redirect every resolved call site to the mangled name.
        for stmt in &mut program.global_stmts {
            visit_stmt_exprs(stmt, &mut |expr| {
                if let ExprKind::Call(call) = &mut expr.kind {
                    if let Some(func) = call.func_ref {
                        if let (Some(name), Some(ident)) = (renames.get(&func), call.ident.as_mut()) {
                            ident.rename(name.clone());
                        }
                    }
                }
            });
        }
    }
}

/// Short type code used in mangled names, e.g. `f4` or `m44`.
fn type_suffix(ty: &Rc<TypeDenoter>) -> String {
    match ty.get_aliased().as_ref() {
        TypeDenoter::Base(data_type) => {
            let scalar = match data_type.scalar_type().to_hlsl() {
                "bool" => "b",
                "int" => "i",
                "uint" => "u",
                "half" => "h",
                "double" => "d",
                _ => "f",
            };
            match data_type {
                DataType::Scalar(_) => format!("{}1", scalar),
                DataType::Vector(_, n) => format!("{}{}", scalar, n),
                DataType::Matrix(_, n, m) => format!("m{}{}{}", scalar, n, m),
            }
        }
        TypeDenoter::Struct { ident, .. } => format!("s{}", ident),
        TypeDenoter::Array { base, dimensions } => {
            format!("a{}{}", dimensions.len(), type_suffix(base))
        }
        TypeDenoter::Buffer { .. } => "t".into(),
        TypeDenoter::Sampler { .. } => "sp".into(),
        _ => "v".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analyzer, AnalyzerContext};
    use crate::lexer::tokenize;
    use crate::options::{OutputShaderVersion, ShaderTarget};
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
        FuncNameConverter::convert_function_names(&mut program, &NameMangling::default());
        program
    }

    #[test]
    fn test_overloads_get_distinct_names() {
        let program = run(
            "float f(float x) { return x; }\n\
             float f(int x) { return 1.0; }\n\
             float4 main() : SV_Target { return f(1.5f).xxxx + f(1).xxxx; }",
            "main",
        );
        let mut names = Vec::new();
        for stmt in &program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if decl.ident.original == "f" {
                    names.push(decl.ident.final_name().to_string());
                }
            }
        }
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
        assert!(names[0].contains("f_"));
    }

    #[test]
    fn test_call_sites_follow_renames() {
        let program = run(
            "float f(float x) { return x; }\n\
             float f(int x) { return 1.0; }\n\
             float4 main() : SV_Target { return f(1).xxxx; }",
            "main",
        );
        let Stmt::FunctionDecl(int_overload) = &program.global_stmts[1] else {
            panic!("expected function");
        };
        let mut called_name = None;
        for stmt in &program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if decl.flags.contains(Flags::IS_ENTRY_POINT) {
                    let mut stmt = Stmt::FunctionDecl(decl.clone());
                    visit_stmt_exprs(&mut stmt, &mut |expr| {
                        if let ExprKind::Call(call) = &expr.kind {
                            if let Some(ident) = &call.ident {
                                called_name = Some(ident.final_name().to_string());
                            }
                        }
                    });
                }
            }
        }
        assert_eq!(
            called_name.as_deref(),
            Some(int_overload.ident.final_name())
        );
    }

    #[test]
    fn test_unique_functions_keep_their_names() {
        let program = run(
            "float helper(float x) { return x; }\n\
             float4 main() : SV_Target { return helper(1.0).xxxx; }",
            "main",
        );
        for stmt in &program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if decl.ident.original == "helper" {
                    assert_eq!(decl.ident.final_name(), "helper");
                }
            }
        }
    }
}
