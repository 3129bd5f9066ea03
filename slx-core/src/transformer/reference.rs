//! Reachability marking, starting at the entry point.
//!
//! A first (read-only) pass collects the reference edges between
//! declarations: calls, variable uses, and type uses. The transitive
//! closure from the entry point then marks every reachable declaration;
//! everything unmarked is skipped during emission.

use crate::ast::*;
use crate::visitor::{self, Visitor};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::rc::Rc;
use crate::type_denoter::TypeDenoter;

pub struct ReferenceAnalyzer;

impl ReferenceAnalyzer {
    /// Mark all declarations reachable from the entry point (and the
    /// secondary entry point, if one is flagged).
    pub fn mark_references_from_entry_point(program: &mut Program) {
        let mut collector = EdgeCollector::default();
        let _ = collector.visit_program(program);

        let mut roots = Vec::new();
        if let Some(entry) = program.entry_point {
            roots.push(entry);
        }
        for stmt in &program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if decl.flags.contains(Flags::IS_SECONDARY_ENTRY_POINT) {
                    roots.push(decl.id);
                }
            }
        }

        let mut reachable: HashSet<NodeId> = HashSet::new();
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(targets) = collector.edges.get(&id) {
                stack.extend(targets.iter().copied());
            }
        }

        mark_program(program, &reachable);
    }
}

/// Collects declaration-to-declaration edges. `current` is the owning
/// declaration while its subtree is visited.
#[derive(Default)]
struct EdgeCollector {
    edges: HashMap<NodeId, HashSet<NodeId>>,
    current: Vec<NodeId>,
}

impl EdgeCollector {
    fn add_edge(&mut self, target: NodeId) {
        if let Some(&owner) = self.current.last() {
            self.edges.entry(owner).or_default().insert(target);
        }
    }

    fn add_type_refs(&mut self, ty: &Rc<TypeDenoter>) {
        let mut ids = Vec::new();
        collect_type_refs(ty, &mut ids);
        for id in ids {
            self.add_edge(id);
        }
    }
}

fn collect_type_refs(ty: &Rc<TypeDenoter>, out: &mut Vec<NodeId>) {
    match ty.as_ref() {
        TypeDenoter::Struct { decl: Some(id), .. } => out.push(*id),
        TypeDenoter::Alias { decl, aliased, .. } => {
            if let Some(id) = decl {
                out.push(*id);
            }
            collect_type_refs(aliased, out);
        }
        TypeDenoter::Array { base, .. } => collect_type_refs(base, out),
        TypeDenoter::Buffer {
            generic: Some(generic),
            ..
        } => collect_type_refs(generic, out),
        _ => {}
    }
}

impl Visitor for EdgeCollector {
    type Break = ();

    fn visit_function_decl(&mut self, decl: &FunctionDecl) -> ControlFlow<()> {
        self.current.push(decl.id);
        self.add_type_refs(&decl.return_type.ty);
        for param in &decl.parameters {
            self.add_type_refs(&param.type_spec.ty);
        }
        visitor::walk_function_decl(self, decl)?;
        self.current.pop();
        ControlFlow::Continue(())
    }

    fn visit_struct_decl(&mut self, decl: &StructDecl) -> ControlFlow<()> {
        self.current.push(decl.id);
        for member in &decl.members {
            self.add_type_refs(&member.type_spec.ty);
        }
        visitor::walk_struct_decl(self, decl)?;
        self.current.pop();
        ControlFlow::Continue(())
    }

    fn visit_uniform_buffer_decl(&mut self, decl: &UniformBufferDecl) -> ControlFlow<()> {
        // Use of any member pulls in the whole buffer.
        for member in &decl.members {
            for var_decl in &member.var_decls {
                self.edges.entry(var_decl.id).or_default().insert(decl.id);
            }
        }
        self.current.push(decl.id);
        visitor::walk_uniform_buffer_decl(self, decl)?;
        self.current.pop();
        ControlFlow::Continue(())
    }

    fn visit_var_decls(&mut self, stmt: &VarDeclStmt) -> ControlFlow<()> {
        // A global variable owns its own type and initializer references;
        // locals attach them to the enclosing declaration.
        let is_global = self.current.is_empty();
        if !is_global {
            self.add_type_refs(&stmt.type_spec.ty);
        }
        for var_decl in &stmt.var_decls {
            if is_global {
                self.current.push(var_decl.id);
                self.add_type_refs(&stmt.type_spec.ty);
            }
            if let Some(init) = &var_decl.initializer {
                self.visit_expr(init)?;
            }
            if is_global {
                self.current.pop();
            }
        }
        ControlFlow::Continue(())
    }

    fn visit_object_expr(&mut self, expr: &ObjectExpr) -> ControlFlow<()> {
        if let Some(symbol) = expr.symbol_ref {
            self.add_edge(symbol);
        }
        visitor::walk_object_expr(self, expr)
    }

    fn visit_call_expr(&mut self, expr: &CallExpr) -> ControlFlow<()> {
        if let Some(func) = expr.func_ref {
            self.add_edge(func);
        }
        if let Some(ctor) = &expr.type_ctor {
            self.add_type_refs(ctor);
        }
        visitor::walk_call_expr(self, expr)
    }
}

fn mark_program(program: &mut Program, reachable: &HashSet<NodeId>) {
    for stmt in &mut program.global_stmts {
        match stmt {
            Stmt::FunctionDecl(decl) => {
                if reachable.contains(&decl.id) {
                    decl.flags.insert(Flags::REACHABLE);
                }
            }
            Stmt::StructDecl { decl, .. } => {
                if reachable.contains(&decl.id) {
                    decl.flags.insert(Flags::REACHABLE);
                }
            }
            Stmt::UniformBufferDecl(decl) => {
                let hit = reachable.contains(&decl.id)
                    || decl
                        .members
                        .iter()
                        .flat_map(|m| &m.var_decls)
                        .any(|v| reachable.contains(&v.id));
                if hit {
                    decl.flags.insert(Flags::REACHABLE);
                    for member in &mut decl.members {
                        for var_decl in &mut member.var_decls {
                            var_decl.flags.insert(Flags::REACHABLE);
                        }
                    }
                }
            }
            Stmt::BufferDecls(buffer_stmt) => {
                for decl in &mut buffer_stmt.buffer_decls {
                    if reachable.contains(&decl.id) {
                        decl.flags.insert(Flags::REACHABLE);
                    }
                }
            }
            Stmt::SamplerDecls(sampler_stmt) => {
                for decl in &mut sampler_stmt.sampler_decls {
                    if reachable.contains(&decl.id) {
                        decl.flags.insert(Flags::REACHABLE);
                    }
                }
            }
            Stmt::AliasDecls(alias_stmt) => {
                for decl in &mut alias_stmt.aliases {
                    if reachable.contains(&decl.id) {
                        decl.flags.insert(Flags::REACHABLE);
                    }
                }
            }
            Stmt::VarDecls(var_stmt) => {
                for var_decl in &mut var_stmt.var_decls {
                    if reachable.contains(&var_decl.id) {
                        var_decl.flags.insert(Flags::REACHABLE);
                    }
                }
                if let Some(decl) = &mut var_stmt.type_spec.struct_decl {
                    if reachable.contains(&decl.id) {
                        decl.flags.insert(Flags::REACHABLE);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analyzer, AnalyzerContext};
    use crate::lexer::tokenize;
    use crate::options::{NameMangling, OutputShaderVersion, ShaderTarget};
    use crate::parser::Parser;

    fn analyze_and_mark(source: &str, entry: &str) -> Program {
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
        ReferenceAnalyzer::mark_references_from_entry_point(&mut program);
        program
    }

    fn function_reachable(program: &Program, name: &str) -> bool {
        program.global_stmts.iter().any(|stmt| match stmt {
            Stmt::FunctionDecl(decl) => {
                decl.ident.original == name && decl.flags.contains(Flags::REACHABLE)
            }
            _ => false,
        })
    }

    #[test]
    fn test_transitive_calls_marked() {
        let program = analyze_and_mark(
            "float helper_inner(float x) { return x * 2.0; }\n\
             float helper_outer(float x) { return helper_inner(x); }\n\
             float unused_helper(float x) { return x; }\n\
             float4 main() : SV_Target { return helper_outer(1.0).xxxx; }",
            "main",
        );
        assert!(function_reachable(&program, "main"));
        assert!(function_reachable(&program, "helper_outer"));
        assert!(function_reachable(&program, "helper_inner"));
        assert!(!function_reachable(&program, "unused_helper"));
    }

    #[test]
    fn test_cbuffer_marked_through_member_use() {
        let program = analyze_and_mark(
            "cbuffer Used { float4 used_color; };\n\
             cbuffer Unused { float4 unused_color; };\n\
             float4 main() : SV_Target { return used_color; }",
            "main",
        );
        let mut used = false;
        let mut unused = false;
        for stmt in &program.global_stmts {
            if let Stmt::UniformBufferDecl(decl) = stmt {
                match decl.ident.original.as_str() {
                    "Used" => used = decl.flags.contains(Flags::REACHABLE),
                    "Unused" => unused = decl.flags.contains(Flags::REACHABLE),
                    _ => {}
                }
            }
        }
        assert!(used);
        assert!(!unused);
    }

    #[test]
    fn test_struct_marked_through_type_use() {
        let program = analyze_and_mark(
            "struct Used { float x; };\n\
             struct Unused { float y; };\n\
             float4 main() : SV_Target { Used u; u.x = 1.0; return u.x.xxxx; }",
            "main",
        );
        for stmt in &program.global_stmts {
            if let Stmt::StructDecl { decl, .. } = stmt {
                match decl.ident.original.as_str() {
                    "Used" => assert!(decl.flags.contains(Flags::REACHABLE)),
                    "Unused" => assert!(!decl.flags.contains(Flags::REACHABLE)),
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_global_initializer_references_propagate() {
        let program = analyze_and_mark(
            "float base_value() { return 0.5; }\n\
             static float g_default = base_value();\n\
             float4 main() : SV_Target { return g_default.xxxx; }",
            "main",
        );
        assert!(function_reachable(&program, "base_value"));
    }
}
