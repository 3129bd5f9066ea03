//! Struct usage analysis for entry point IO flattening.
//!
//! Structs that only ever describe the entry point interface dissolve
//! into global IO variables; structs that are also used as plain data
//! (locals, members, non-entry parameters, buffer generics) must survive
//! as nominal types in the output. This pass sets
//! `Flags::USED_OUTSIDE_ENTRY_IO` on the survivors.

use crate::ast::*;
use crate::visitor::{self, Visitor};
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::rc::Rc;
use crate::type_denoter::TypeDenoter;

pub struct StructParameterAnalyzer;

impl StructParameterAnalyzer {
    pub fn mark_non_io_struct_usage(program: &mut Program) {
        let mut collector = UsageCollector {
            entry_point: program.entry_point,
            used: HashSet::new(),
            in_entry_signature: false,
        };
        let _ = collector.visit_program(program);

        // The generated wrapper declares locals of the entry IO structs,
        // so struct typed entry parameters and return values survive too.
        if let Some(entry) = program.entry_point {
            for stmt in &program.global_stmts {
                let Stmt::FunctionDecl(decl) = stmt else {
                    continue;
                };
                if decl.id != entry {
                    continue;
                }
                if let Some(id) = decl.return_type.ty.struct_decl() {
                    collector.used.insert(id);
                }
                for param in &decl.parameters {
                    if let Some(id) = param.type_spec.ty.struct_decl() {
                        collector.used.insert(id);
                    }
                }
            }
        }

        let used = collector.used;
        for stmt in &mut program.global_stmts {
            match stmt {
                Stmt::StructDecl { decl, .. } => {
                    if used.contains(&decl.id) {
                        decl.flags.insert(Flags::USED_OUTSIDE_ENTRY_IO);
                    }
                }
                Stmt::VarDecls(var_stmt) => {
                    if let Some(decl) = &mut var_stmt.type_spec.struct_decl {
                        if used.contains(&decl.id) {
                            decl.flags.insert(Flags::USED_OUTSIDE_ENTRY_IO);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

struct UsageCollector {
    entry_point: Option<NodeId>,
    used: HashSet<NodeId>,
    in_entry_signature: bool,
}

impl UsageCollector {
    fn note_type(&mut self, ty: &Rc<TypeDenoter>) {
        if self.in_entry_signature {
            return;
        }
        let mut ty = Rc::clone(ty);
        loop {
            match ty.as_ref().clone() {
                TypeDenoter::Struct { decl: Some(id), .. } => {
                    self.used.insert(id);
                    return;
                }
                TypeDenoter::Alias { aliased, .. } => ty = aliased,
                TypeDenoter::Array { base, .. } => ty = base,
                TypeDenoter::Buffer {
                    generic: Some(generic),
                    ..
                } => ty = generic,
                _ => return,
            }
        }
    }
}

impl Visitor for UsageCollector {
    type Break = ();

    fn visit_function_decl(&mut self, decl: &FunctionDecl) -> ControlFlow<()> {
        let is_entry = Some(decl.id) == self.entry_point;
        self.in_entry_signature = is_entry;
        // Signature types of the entry point are pure IO; everything in
        // the body is real usage.
        if !is_entry {
            self.note_type(&decl.return_type.ty);
        }
        for param in &decl.parameters {
            if !is_entry {
                self.note_type(&param.type_spec.ty);
            }
        }
        self.in_entry_signature = false;
        if let Some(body) = &decl.body {
            self.visit_code_block(body)?;
        }
        ControlFlow::Continue(())
    }

    fn visit_struct_decl(&mut self, decl: &StructDecl) -> ControlFlow<()> {
        for member in &decl.members {
            self.note_type(&member.type_spec.ty);
        }
        visitor::walk_struct_decl(self, decl)
    }

    fn visit_var_decls(&mut self, stmt: &VarDeclStmt) -> ControlFlow<()> {
        self.note_type(&stmt.type_spec.ty);
        visitor::walk_var_decls(self, stmt)
    }

    fn visit_buffer_decls(&mut self, stmt: &BufferDeclStmt) -> ControlFlow<()> {
        if let Some(generic) = &stmt.generic {
            self.note_type(generic);
        }
        visitor::walk_buffer_decls(self, stmt)
    }

    fn visit_call_expr(&mut self, expr: &CallExpr) -> ControlFlow<()> {
        if let Some(ctor) = &expr.type_ctor {
            self.note_type(ctor);
        }
        visitor::walk_call_expr(self, expr)
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
            shader_target: ShaderTarget::VertexShader,
            output_version: OutputShaderVersion::GLSL450,
            name_mangling: &mangling,
            warnings_enabled: false,
        };
        assert!(analyzer.decorate(&mut program, &ctx));
        StructParameterAnalyzer::mark_non_io_struct_usage(&mut program);
        program
    }

    fn struct_flag(program: &Program, name: &str) -> bool {
        program.global_stmts.iter().any(|stmt| match stmt {
            Stmt::StructDecl { decl, .. } => {
                decl.ident.original == name && decl.flags.contains(Flags::USED_OUTSIDE_ENTRY_IO)
            }
            _ => false,
        })
    }

    #[test]
    fn test_local_usage_marks_struct() {
        let program = run(
            "struct Light { float3 dir; };\n\
             float4 main() : SV_Target { Light l; l.dir = float3(0, 1, 0); return l.dir.xyzx; }",
            "main",
        );
        assert!(struct_flag(&program, "Light"));
    }

    #[test]
    fn test_entry_io_struct_survives_for_wrapper() {
        let program = run(
            "struct VsIn { float4 pos : POSITION; };\n\
             float4 main(VsIn v) : SV_Position { return v.pos; }",
            "main",
        );
        // Used by the generated wrapper main, so it must be emitted.
        assert!(struct_flag(&program, "VsIn"));
    }

    #[test]
    fn test_non_entry_param_marks_struct() {
        let program = run(
            "struct Payload { float x; };\n\
             float read_payload(Payload p) { return p.x; }\n\
             float4 main() : SV_Target { Payload p; p.x = 1.0; return read_payload(p).xxxx; }",
            "main",
        );
        assert!(struct_flag(&program, "Payload"));
    }
}
