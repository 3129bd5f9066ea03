//! GLSL / ESSL / VKSL code generation from the decorated AST.
//!
//! The generator is a pure reader: reachability gates what is emitted,
//! renames were already applied by the converters, and the entry point
//! interface arrives flattened in `Program::entry_io`. A wrapper `main`
//! is synthesized that feeds the original entry function from the
//! flattened globals.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::generator::glsl_keywords::*;
use crate::options::{Formatting, NameMangling, Options, OutputShaderVersion, SemanticBinding, ShaderTarget};
use crate::source::SourceArea;
use crate::type_denoter::{ScalarType, TypeDenoter};
use crate::writer::IndentedWriter;
use itertools::Itertools;
use std::rc::Rc;

pub struct GlslGenerator<'a> {
    writer: IndentedWriter,
    target: ShaderTarget,
    version: OutputShaderVersion,
    options: &'a Options,
    formatting: &'a Formatting,
    mangling: &'a NameMangling,
    vertex_semantics: &'a [SemanticBinding],
    fragment_semantics: &'a [SemanticBinding],
    next_binding: u32,
    next_in_location: u32,
    next_out_location: u32,
    comments: Vec<(u32, String)>,
    comment_index: usize,
}

impl<'a> GlslGenerator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target: ShaderTarget,
        version: OutputShaderVersion,
        options: &'a Options,
        formatting: &'a Formatting,
        mangling: &'a NameMangling,
        vertex_semantics: &'a [SemanticBinding],
        fragment_semantics: &'a [SemanticBinding],
    ) -> Self {
        GlslGenerator {
            writer: IndentedWriter::new(formatting.indent.clone()),
            target,
            version,
            options,
            formatting,
            mangling,
            vertex_semantics,
            fragment_semantics,
            next_binding: 0,
            next_in_location: 0,
            next_out_location: 0,
            comments: Vec::new(),
            comment_index: 0,
        }
    }

    pub fn generate_code(mut self, program: &Program) -> Result<String> {
        if self.options.preserve_comments {
            self.comments = program.comments.clone();
        }

        self.emit_version_directive();
        self.emit_extensions();
        self.emit_stage_layout(program);
        self.emit_entry_io(program);

        for stmt in &program.global_stmts {
            self.emit_global_stmt(stmt)?;
        }

        self.emit_wrapper_main(program)?;
        Ok(self.writer.into_string())
    }

    /* ----- Prologue ----- */

    fn emit_version_directive(&mut self) {
        let number = self.version.version_number();
        if self.version.is_essl() {
            self.writer.write_line(&format!("#version {} es", number));
            self.writer.write_line("precision mediump float;");
        } else {
            self.writer.write_line(&format!("#version {}", number));
        }
        if self.formatting.blanks {
            self.writer.blank_line();
        }
    }

    fn emit_extensions(&mut self) {
        if self.options.allow_extensions && self.options.separate_shaders && self.version.is_glsl() {
            self.writer
                .write_line("#extension GL_ARB_separate_shader_objects : enable");
            if self.formatting.blanks {
                self.writer.blank_line();
            }
        }
    }

    fn emit_stage_layout(&mut self, program: &Program) {
        match self.target {
            ShaderTarget::ComputeShader => {
                let [x, y, z] = program.compute_layout.num_threads;
                self.writer.write_line(&format!(
                    "layout(local_size_x = {}, local_size_y = {}, local_size_z = {}) in;",
                    x, y, z
                ));
                if self.formatting.blanks {
                    self.writer.blank_line();
                }
            }
            ShaderTarget::FragmentShader => {
                if program.fragment_layout.early_depth_stencil {
                    self.writer.write_line("layout(early_fragment_tests) in;");
                    if self.formatting.blanks {
                        self.writer.blank_line();
                    }
                }
            }
            ShaderTarget::GeometryShader => {
                let layout = &program.geometry_layout;
                if let Some(primitive) = &layout.input_primitive {
                    self.writer.write_line(&format!("layout({}) in;", primitive));
                }
                if layout.max_vertices > 0 {
                    let topology = layout.output_topology.as_deref().unwrap_or("triangle_strip");
                    self.writer.write_line(&format!(
                        "layout({}, max_vertices = {}) out;",
                        topology, layout.max_vertices
                    ));
                }
                if self.formatting.blanks {
                    self.writer.blank_line();
                }
            }
            ShaderTarget::TessellationControlShader => {
                let points = program.tess_control_layout.output_control_points;
                if points > 0 {
                    self.writer
                        .write_line(&format!("layout(vertices = {}) out;", points));
                    if self.formatting.blanks {
                        self.writer.blank_line();
                    }
                }
            }
            ShaderTarget::TessellationEvaluationShader => {
                let layout = &program.tess_eval_layout;
                if layout.domain.is_some() || layout.partitioning.is_some() {
                    let domain = match layout.domain.as_deref() {
                        Some("tri") => "triangles",
                        Some("quad") => "quads",
                        Some("isoline") => "isolines",
                        other => other.unwrap_or("triangles"),
                    };
                    let spacing = match layout.partitioning.as_deref() {
                        Some("integer") => "equal_spacing",
                        Some("fractional_even") => "fractional_even_spacing",
                        Some("fractional_odd") => "fractional_odd_spacing",
                        _ => "equal_spacing",
                    };
                    self.writer
                        .write_line(&format!("layout({}, {}, ccw) in;", domain, spacing));
                    if self.formatting.blanks {
                        self.writer.blank_line();
                    }
                }
            }
            _ => {}
        }
    }

    fn input_location(&mut self, semantic: &Semantic) -> Option<u32> {
        if !self.options.explicit_binding {
            return None;
        }
        if self.target == ShaderTarget::VertexShader {
            let name = semantic.to_string();
            if let Some(binding) = self
                .vertex_semantics
                .iter()
                .find(|b| b.semantic.eq_ignore_ascii_case(&name))
            {
                return Some(binding.location);
            }
        }
        let location = self.next_in_location;
        self.next_in_location += 1;
        Some(location)
    }

    fn output_location(&mut self, semantic: &Semantic) -> Option<u32> {
        if !self.options.explicit_binding {
            return None;
        }
        if self.target == ShaderTarget::FragmentShader {
            let name = semantic.to_string();
            if let Some(binding) = self
                .fragment_semantics
                .iter()
                .find(|b| b.semantic.eq_ignore_ascii_case(&name))
            {
                return Some(binding.location);
            }
        }
        let location = self.next_out_location;
        self.next_out_location += 1;
        Some(location)
    }

    fn emit_entry_io(&mut self, program: &Program) {
        let mut any = false;
        for io in &program.entry_io.inputs {
            if glsl_semantic_builtin(&io.semantic, self.target, true).is_some() {
                continue;
            }
            let location = self.input_location(&io.semantic);
            let mut line = String::new();
            if let Some(location) = location {
                line.push_str(&format!("layout(location = {}) ", location));
            }
            for modifier in &io.interp_modifiers {
                line.push_str(glsl_interp_modifier(*modifier));
                line.push(' ');
            }
            let (base, dims) = self.type_strings(&io.ty);
            line.push_str(&format!("in {} {}{};", base, io.name, dims));
            self.writer.write_line(&line);
            any = true;
        }
        for io in &program.entry_io.outputs {
            if glsl_semantic_builtin(&io.semantic, self.target, false).is_some() {
                continue;
            }
            let location = self.output_location(&io.semantic);
            let mut line = String::new();
            if let Some(location) = location {
                line.push_str(&format!("layout(location = {}) ", location));
            }
            let (base, dims) = self.type_strings(&io.ty);
            line.push_str(&format!("out {} {}{};", base, io.name, dims));
            self.writer.write_line(&line);
            any = true;
        }
        if any && self.formatting.blanks {
            self.writer.blank_line();
        }
    }

    /* ----- Globals ----- */

    fn emit_pending_comments(&mut self, before_line: u32) {
        while self.comment_index < self.comments.len() {
            let (line, text) = &self.comments[self.comment_index];
            if *line > before_line {
                break;
            }
            let text = text.clone();
            self.writer.write_line(&text);
            self.comment_index += 1;
        }
    }

    fn emit_line_mark(&mut self, area: SourceArea) {
        if self.formatting.line_marks && area.is_valid() {
            self.writer.write_line(&format!("#line {}", area.pos.line));
        }
    }

    fn emit_global_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        if self.options.preserve_comments {
            self.emit_pending_comments(stmt.area().pos.line);
        }
        match stmt {
            Stmt::Null { .. } => Ok(()),
            Stmt::FunctionDecl(decl) => self.emit_function_decl(decl),
            Stmt::StructDecl { decl, .. } => {
                self.emit_struct_decl(decl);
                Ok(())
            }
            Stmt::UniformBufferDecl(decl) => {
                self.emit_uniform_buffer_decl(decl);
                Ok(())
            }
            Stmt::BufferDecls(buffer_stmt) => {
                self.emit_buffer_decls(buffer_stmt);
                Ok(())
            }
            // Separate sampler states merge into the combined samplers.
            Stmt::SamplerDecls(_) => Ok(()),
            // Aliases were resolved structurally during analysis.
            Stmt::AliasDecls(_) => Ok(()),
            Stmt::VarDecls(var_stmt) => {
                self.emit_global_var_decls(var_stmt);
                Ok(())
            }
            other => Err(CompilerError::InternalError(format!(
                "unexpected global statement at {}",
                other.area()
            ))),
        }
    }

    fn emit_struct_decl(&mut self, decl: &StructDecl) {
        if !decl.flags.contains(Flags::REACHABLE)
            || !decl.flags.contains(Flags::USED_OUTSIDE_ENTRY_IO)
        {
            return;
        }
        self.emit_line_mark(decl.area);
        self.writer.write(&format!("struct {} ", self.ident_str(decl.ident.final_name())));
        self.writer.open_scope();
        for member in &decl.members {
            let line = self.var_decl_stmt_str(member, false);
            self.writer.write_line(&line);
        }
        self.writer.close_scope(";");
        if self.formatting.blanks {
            self.writer.blank_line();
        }
    }

    fn emit_uniform_buffer_decl(&mut self, decl: &UniformBufferDecl) {
        if !decl.flags.contains(Flags::REACHABLE) {
            return;
        }
        self.emit_line_mark(decl.area);
        let mut qualifiers = vec!["std140".to_string()];
        if self.options.row_major_alignment {
            qualifiers.push("row_major".into());
        }
        if self.options.explicit_binding {
            let slot = decl
                .registers
                .iter()
                .find(|r| r.slot_kind == 'b')
                .map(|r| r.slot)
                .unwrap_or_else(|| self.take_binding());
            qualifiers.push(format!("binding = {}", slot));
        }
        self.writer.write(&format!(
            "layout({}) uniform {} ",
            qualifiers.join(", "),
            self.ident_str(decl.ident.final_name())
        ));
        self.writer.open_scope();
        for member in &decl.members {
            let line = self.var_decl_stmt_str(member, false);
            self.writer.write_line(&line);
        }
        self.writer.close_scope(";");
        if self.formatting.blanks {
            self.writer.blank_line();
        }
    }

    fn take_binding(&mut self) -> u32 {
        let binding = self.next_binding;
        self.next_binding += 1;
        binding
    }

    fn emit_buffer_decls(&mut self, stmt: &BufferDeclStmt) {
        for decl in &stmt.buffer_decls {
            if !decl.flags.contains(Flags::REACHABLE) {
                continue;
            }
            let Some(sampler_type) = glsl_sampler_type(stmt.kind, stmt.generic.as_ref()) else {
                continue;
            };
            self.emit_line_mark(decl.area);
            let mut line = String::new();
            if self.options.explicit_binding {
                let slot = decl
                    .registers
                    .iter()
                    .find(|r| r.slot_kind == 't')
                    .map(|r| r.slot)
                    .unwrap_or_else(|| self.take_binding());
                line.push_str(&format!("layout(binding = {}) ", slot));
            }
            line.push_str(&format!(
                "uniform {} {}",
                sampler_type,
                self.ident_str(decl.ident.final_name())
            ));
            for dim in &decl.array_dims {
                match dim.size {
                    Some(n) => line.push_str(&format!("[{}]", n)),
                    None => line.push_str("[]"),
                }
            }
            line.push(';');
            self.writer.write_line(&line);
        }
        if self.formatting.blanks {
            self.writer.blank_line();
        }
    }

    fn emit_global_var_decls(&mut self, stmt: &VarDeclStmt) {
        if let Some(struct_decl) = &stmt.type_spec.struct_decl {
            self.emit_struct_decl(struct_decl);
        }
        let is_static = stmt
            .type_spec
            .storage_classes
            .contains(&StorageClass::Static);
        for var_decl in &stmt.var_decls {
            if !var_decl.flags.contains(Flags::REACHABLE) {
                continue;
            }
            self.emit_line_mark(var_decl.area);
            let mut line = String::new();
            if stmt.type_spec.is_const() {
                line.push_str("const ");
            } else if !is_static {
                // Globals without 'static' are uniforms in HLSL.
                line.push_str("uniform ");
            }
            let ty = var_decl
                .ty
                .clone()
                .unwrap_or_else(|| Rc::clone(&stmt.type_spec.ty));
            line.push_str(&self.declarator_str(&ty, var_decl.ident.final_name()));
            if let Some(init) = &var_decl.initializer {
                if let ExprKind::Initializer(elements) = &init.kind {
                    // Array initializers emit one element per line.
                    line.push_str(&format!(" = {}[](", self.array_base_type_str(&ty)));
                    self.writer.write_line(&line);
                    self.writer.push_indent();
                    for (index, element) in elements.iter().enumerate() {
                        let separator = if index + 1 < elements.len() { "," } else { "" };
                        let text = format!("{}{}", self.expr_str(element), separator);
                        self.writer.write_line(&text);
                    }
                    self.writer.pop_indent();
                    self.writer.write_line(");");
                    continue;
                }
                line.push_str(&format!(" = {}", self.expr_str(init)));
            }
            line.push(';');
            self.writer.write_line(&line);
        }
    }

    fn emit_function_decl(&mut self, decl: &FunctionDecl) -> Result<()> {
        if !decl.flags.contains(Flags::REACHABLE) {
            return Ok(());
        }
        let Some(body) = &decl.body else {
            return Ok(());
        };
        if self.formatting.blanks {
            self.writer.blank_line();
        }
        self.emit_line_mark(decl.area);
        let (return_type, _) = self.type_strings(&decl.return_type.ty);
        let params = decl
            .parameters
            .iter()
            .map(|param| self.parameter_str(param))
            .join(", ");
        self.writer.write(&format!(
            "{} {}({})",
            return_type,
            self.ident_str(decl.ident.final_name()),
            params
        ));
        self.writer.end_line();
        self.emit_code_block(body);
        Ok(())
    }

    fn parameter_str(&self, param: &VarDeclStmt) -> String {
        let var_decl = &param.var_decls[0];
        let mut text = String::new();
        match param.type_spec.input_modifier {
            Some(InputModifier::Out) => text.push_str("out "),
            Some(InputModifier::InOut) => text.push_str("inout "),
            _ => {}
        }
        if param.type_spec.is_const() {
            text.push_str("const ");
        }
        let ty = var_decl
            .ty
            .clone()
            .unwrap_or_else(|| Rc::clone(&param.type_spec.ty));
        text.push_str(&self.declarator_str(&ty, var_decl.ident.final_name()));
        text
    }

    /* ----- Statements ----- */

    fn emit_code_block(&mut self, block: &CodeBlock) {
        self.writer.open_scope();
        for stmt in &block.stmts {
            self.emit_stmt(stmt);
        }
        self.writer.close_scope("");
    }

    fn emit_body_stmt(&mut self, stmt: &Stmt) {
        if let Stmt::CodeBlock { block, .. } = stmt {
            self.emit_code_block(block);
        } else if self.formatting.always_braced_scopes {
            self.writer.open_scope();
            self.emit_stmt(stmt);
            self.writer.close_scope("");
        } else {
            self.writer.push_indent();
            self.emit_stmt(stmt);
            self.writer.pop_indent();
        }
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Null { .. } => self.writer.write_line(";"),
            Stmt::CodeBlock { block, .. } => self.emit_code_block(block),
            Stmt::VarDecls(var_stmt) => {
                if let Some(struct_decl) = &var_stmt.type_spec.struct_decl {
                    self.emit_struct_decl(struct_decl);
                }
                let line = self.var_decl_stmt_str(var_stmt, true);
                self.writer.write_line(&line);
            }
            Stmt::StructDecl { decl, .. } => self.emit_struct_decl(decl),
            Stmt::AliasDecls(_) => {}
            Stmt::Expr(expr_stmt) => {
                let text = self.expr_str(&expr_stmt.expr);
                self.writer.write_line(&format!("{};", text));
            }
            Stmt::Return(return_stmt) => match &return_stmt.expr {
                Some(expr) => {
                    let text = self.expr_str(expr);
                    self.writer.write_line(&format!("return {};", text));
                }
                None => self.writer.write_line("return;"),
            },
            Stmt::CtrlTransfer { transfer, .. } => {
                self.writer.write_line(&format!("{};", transfer.to_str()));
            }
            Stmt::If(if_stmt) => {
                let condition = self.expr_str(&if_stmt.condition);
                self.writer.write_line(&format!("if ({})", condition));
                self.emit_body_stmt(&if_stmt.then_branch);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.writer.write_line("else");
                    self.emit_body_stmt(else_branch);
                }
            }
            Stmt::While(while_stmt) => {
                let condition = self.expr_str(&while_stmt.condition);
                self.writer.write_line(&format!("while ({})", condition));
                self.emit_body_stmt(&while_stmt.body);
            }
            Stmt::DoWhile(do_while_stmt) => {
                self.writer.write_line("do");
                self.emit_body_stmt(&do_while_stmt.body);
                let condition = self.expr_str(&do_while_stmt.condition);
                self.writer.write_line(&format!("while ({});", condition));
            }
            Stmt::For(for_stmt) => {
                let init = match &for_stmt.init {
                    Some(stmt) => self.for_init_str(stmt),
                    None => ";".into(),
                };
                let condition = for_stmt
                    .condition
                    .as_ref()
                    .map(|expr| self.expr_str(expr))
                    .unwrap_or_default();
                let iteration = for_stmt
                    .iteration
                    .as_ref()
                    .map(|expr| self.expr_str(expr))
                    .unwrap_or_default();
                self.writer
                    .write_line(&format!("for ({} {}; {})", init, condition, iteration));
                self.emit_body_stmt(&for_stmt.body);
            }
            Stmt::Switch(switch_stmt) => {
                let selector = self.expr_str(&switch_stmt.selector);
                self.writer.write_line(&format!("switch ({})", selector));
                self.writer.open_scope();
                for case in &switch_stmt.cases {
                    match &case.expr {
                        Some(expr) => {
                            let text = self.expr_str(expr);
                            self.writer.write_line(&format!("case {}:", text));
                        }
                        None => self.writer.write_line("default:"),
                    }
                    self.writer.push_indent();
                    for stmt in &case.stmts {
                        self.emit_stmt(stmt);
                    }
                    self.writer.pop_indent();
                }
                self.writer.close_scope("");
            }
            Stmt::FunctionDecl(_)
            | Stmt::UniformBufferDecl(_)
            | Stmt::BufferDecls(_)
            | Stmt::SamplerDecls(_) => {
                // Rejected by the analyzer at local scope.
            }
        }
    }

    fn for_init_str(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::VarDecls(var_stmt) => self.var_decl_stmt_str(var_stmt, true),
            Stmt::Expr(expr_stmt) => format!("{};", self.expr_str(&expr_stmt.expr)),
            _ => ";".into(),
        }
    }

    fn var_decl_stmt_str(&self, stmt: &VarDeclStmt, allow_init: bool) -> String {
        let mut text = String::new();
        if stmt.type_spec.is_const() {
            text.push_str("const ");
        }
        // One type keyword, then the declarators with their own array
        // dimensions and initializers.
        let (base, _) = self.type_strings(&stmt.type_spec.ty);
        text.push_str(&base);
        text.push(' ');
        let declarators = stmt
            .var_decls
            .iter()
            .map(|var_decl| {
                let ty = var_decl
                    .ty
                    .clone()
                    .unwrap_or_else(|| Rc::clone(&stmt.type_spec.ty));
                let (_, dims) = self.type_strings(&ty);
                let mut decl_text =
                    format!("{}{}", self.ident_str(var_decl.ident.final_name()), dims);
                if allow_init {
                    if let Some(init) = &var_decl.initializer {
                        decl_text.push_str(&format!(" = {}", self.expr_str(init)));
                    }
                }
                decl_text
            })
            .join(", ");
        text.push_str(&declarators);
        text.push(';');
        text
    }

    /* ----- Types and identifiers ----- */

    fn ident_str(&self, name: &str) -> String {
        if is_glsl_reserved_word(name) {
            format!("{}{}", self.mangling.reserved_word_prefix, name)
        } else {
            name.to_string()
        }
    }

    /// Base type and trailing array dimension strings.
    fn type_strings(&self, ty: &Rc<TypeDenoter>) -> (String, String) {
        let resolved = ty.get_aliased();
        match resolved.as_ref() {
            TypeDenoter::Void => ("void".into(), String::new()),
            TypeDenoter::Base(data_type) => (glsl_data_type(*data_type), String::new()),
            TypeDenoter::Struct { ident, .. } => (self.ident_str(ident), String::new()),
            TypeDenoter::Array { base, dimensions } => {
                let (base_str, _) = self.type_strings(base);
                let dims = dimensions
                    .iter()
                    .map(|dim| match dim {
                        Some(n) => format!("[{}]", n),
                        None => "[]".into(),
                    })
                    .collect();
                (base_str, dims)
            }
            TypeDenoter::Buffer { kind, generic } => (
                glsl_sampler_type(*kind, generic.as_ref()).unwrap_or_else(|| "sampler2D".into()),
                String::new(),
            ),
            TypeDenoter::Sampler { .. } => ("sampler2D".into(), String::new()),
            TypeDenoter::Alias { .. } => unreachable!("alias resolved above"),
        }
    }

    fn array_base_type_str(&self, ty: &Rc<TypeDenoter>) -> String {
        let (base, _) = self.type_strings(ty);
        base
    }

    fn declarator_str(&self, ty: &Rc<TypeDenoter>, name: &str) -> String {
        let (base, dims) = self.type_strings(ty);
        format!("{} {}{}", base, self.ident_str(name), dims)
    }

    /* ----- Expressions ----- */

    fn expr_str(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(literal) => self.literal_str(literal),
            ExprKind::Sequence(exprs) => exprs.iter().map(|e| self.expr_str(e)).join(", "),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => format!(
                "{} ? {} : {}",
                self.expr_str(cond),
                self.expr_str(then_expr),
                self.expr_str(else_expr)
            ),
            ExprKind::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                self.expr_str(lhs),
                op.to_str(),
                self.expr_str(rhs)
            ),
            ExprKind::Unary { op, operand } => {
                format!("{}{}", op.to_str(), self.expr_str(operand))
            }
            ExprKind::PostUnary { op, operand } => {
                format!("{}{}", self.expr_str(operand), op.to_str())
            }
            ExprKind::Call(call) => self.call_str(call),
            ExprKind::Bracket(inner) => format!("({})", self.expr_str(inner)),
            ExprKind::Object(object) => match &object.prefix {
                Some(prefix) => format!("{}.{}", self.expr_str(prefix), object.ident.final_name()),
                None => self.ident_str(object.ident.final_name()),
            },
            ExprKind::Array { prefix, indices } => {
                let mut text = self.expr_str(prefix);
                for index in indices {
                    text.push_str(&format!("[{}]", self.expr_str(index)));
                }
                text
            }
            ExprKind::Cast { type_spec, operand } => {
                // The converter rewrites casts; this covers stray cases.
                let (base, _) = self.type_strings(&type_spec.ty);
                format!("{}({})", base, self.expr_str(operand))
            }
            ExprKind::Assign { lhs, op, rhs } => format!(
                "{} {} {}",
                self.expr_str(lhs),
                op.to_str(),
                self.expr_str(rhs)
            ),
            ExprKind::Initializer(exprs) => {
                format!("({})", exprs.iter().map(|e| self.expr_str(e)).join(", "))
            }
        }
    }

    fn call_str(&self, call: &CallExpr) -> String {
        // Texture method calls collapse into the combined sampler call:
        // tex.Sample(s, uv) becomes texture(tex, uv).
        if let (Some(prefix), Some(intrinsic)) = (&call.prefix, call.intrinsic) {
            if matches!(intrinsic, Intrinsic::Sample | Intrinsic::SampleLevel) {
                let mut args = vec![self.expr_str(prefix)];
                args.extend(call.args.iter().skip(1).map(|arg| self.expr_str(arg)));
                return format!("{}({})", glsl_intrinsic_name(intrinsic), args.join(", "));
            }
        }
        if let Some(ctor) = &call.type_ctor {
            let (base, _) = self.type_strings(ctor);
            let scalar = ctor.as_base().map(|dt| dt.scalar_type());
            let args = call
                .args
                .iter()
                .map(|arg| self.ctor_arg_str(arg, scalar))
                .join(", ");
            return format!("{}({})", base, args);
        }
        if let Some(intrinsic) = call.intrinsic {
            let name = glsl_intrinsic_name(intrinsic);
            let mut args: Vec<String> = call.args.iter().map(|arg| self.expr_str(arg)).collect();
            if intrinsic == Intrinsic::Saturate {
                args.push("0.0f".into());
                args.push("1.0f".into());
            }
            return format!("{}({})", name, args.join(", "));
        }
        let name = call
            .ident
            .as_ref()
            .map(|i| self.ident_str(i.final_name()))
            .unwrap_or_default();
        let args = call.args.iter().map(|arg| self.expr_str(arg)).join(", ");
        format!("{}({})", name, args)
    }

    /// Constructor arguments of real typed vectors promote integer
    /// literals to float spelling, so `float4(1, 0, 0, 1)` emits as
    /// `vec4(1.0f, 0.0f, 0.0f, 1.0f)`.
    fn ctor_arg_str(&self, arg: &Expr, scalar: Option<ScalarType>) -> String {
        if let (ExprKind::Literal(literal), Some(scalar)) = (&arg.kind, scalar) {
            if literal.kind == LiteralKind::Int && scalar.is_real() {
                if let Some(value) = literal.int_value() {
                    return self.float_literal_str(&format!("{}.0", value));
                }
            }
        }
        self.expr_str(arg)
    }

    fn literal_str(&self, literal: &Literal) -> String {
        match literal.kind {
            LiteralKind::Float => self.float_literal_str(&literal.spell),
            LiteralKind::Int => {
                // Unsigned literals keep their suffix; long suffixes drop.
                let spell = literal.spell.trim_end_matches(['l', 'L']);
                spell.to_string()
            }
            _ => literal.spell.clone(),
        }
    }

    /// Floats always carry a decimal point and an `f` suffix.
    fn float_literal_str(&self, spell: &str) -> String {
        let mut text = spell.trim_end_matches(['f', 'F', 'h', 'H']).to_string();
        if !text.contains('.') && !text.contains(['e', 'E']) {
            text.push_str(".0");
        } else if text.ends_with('.') {
            text.push('0');
        }
        text.push('f');
        text
    }

    /* ----- Wrapper entry point ----- */

    fn find_entry<'p>(&self, program: &'p Program) -> Option<&'p FunctionDecl> {
        program.global_stmts.iter().find_map(|stmt| match stmt {
            Stmt::FunctionDecl(decl) if decl.flags.contains(Flags::IS_ENTRY_POINT) => {
                Some(decl.as_ref())
            }
            _ => None,
        })
    }

    fn io_src_name(&self, io: &IoVar, is_input: bool) -> String {
        glsl_semantic_builtin(&io.semantic, self.target, is_input)
            .map(|builtin| builtin.to_string())
            .unwrap_or_else(|| io.name.clone())
    }

    fn emit_wrapper_main(&mut self, program: &Program) -> Result<()> {
        let Some(entry) = self.find_entry(program) else {
            return Ok(());
        };
        if !self.formatting.compact_wrappers && self.formatting.blanks {
            self.writer.blank_line();
        }
        self.writer.write("void main()");
        self.writer.end_line();
        self.writer.open_scope();

        let temp_prefix = self.mangling.temporary_prefix.clone();
        let temp = move |name: &str| format!("{}{}", temp_prefix, name);
        let mut args: Vec<String> = Vec::new();
        let mut epilogue: Vec<String> = Vec::new();

        for param in &entry.parameters {
            let var_decl = &param.var_decls[0];
            let param_name = &var_decl.ident.original;
            let modifier = param.type_spec.input_modifier.unwrap_or(InputModifier::In);
            let is_output = matches!(modifier, InputModifier::Out | InputModifier::InOut);
            let ty = var_decl
                .ty
                .clone()
                .unwrap_or_else(|| Rc::clone(&param.type_spec.ty));
            let is_struct = ty.struct_decl().is_some();

            if is_struct {
                let (base, _) = self.type_strings(&ty);
                let local = temp(param_name);
                self.writer.write_line(&format!("{} {};", base, local));
                if !is_output {
                    for io in &program.entry_io.inputs {
                        if io.param == *param_name {
                            let member = io.member.as_deref().unwrap_or_default();
                            let src = self.io_src_name(io, true);
                            self.writer
                                .write_line(&format!("{}.{} = {};", local, member, src));
                        }
                    }
                } else {
                    for io in &program.entry_io.outputs {
                        if io.param == *param_name {
                            let member = io.member.as_deref().unwrap_or_default();
                            let dst = self.io_src_name(io, false);
                            epilogue.push(format!("{} = {}.{};", dst, local, member));
                        }
                    }
                }
                args.push(local);
            } else if is_output {
                let (base, dims) = self.type_strings(&ty);
                let local = temp(param_name);
                self.writer
                    .write_line(&format!("{} {}{};", base, local, dims));
                for io in &program.entry_io.outputs {
                    if io.param == *param_name && io.member.is_none() {
                        let dst = self.io_src_name(io, false);
                        epilogue.push(format!("{} = {};", dst, local));
                    }
                }
                args.push(local);
            } else {
                let src = program
                    .entry_io
                    .inputs
                    .iter()
                    .find(|io| io.param == *param_name && io.member.is_none())
                    .map(|io| self.io_src_name(io, true))
                    .unwrap_or_else(|| param_name.clone());
                args.push(src);
            }
        }

        let call = format!(
            "{}({})",
            self.ident_str(entry.ident.final_name()),
            args.join(", ")
        );
        let return_ty = &entry.return_type.ty;
        if return_ty.is_void() {
            self.writer.write_line(&format!("{};", call));
        } else if return_ty.struct_decl().is_some() {
            let (base, _) = self.type_strings(return_ty);
            let local = temp("output");
            self.writer.write_line(&format!("{} {} = {};", base, local, call));
            for io in &program.entry_io.outputs {
                if io.param.is_empty() {
                    let member = io.member.as_deref().unwrap_or_default();
                    let dst = self.io_src_name(io, false);
                    self.writer.write_line(&format!("{} = {}.{};", dst, local, member));
                }
            }
        } else {
            let dst = program
                .entry_io
                .outputs
                .iter()
                .find(|io| io.param.is_empty() && io.member.is_none())
                .map(|io| self.io_src_name(io, false));
            match dst {
                Some(dst) => self.writer.write_line(&format!("{} = {};", dst, call)),
                None => self.writer.write_line(&format!("{};", call)),
            }
        }

        for line in epilogue {
            self.writer.write_line(&line);
        }
        self.writer.close_scope("");
        Ok(())
    }
}

fn glsl_interp_modifier(modifier: InterpModifier) -> &'static str {
    match modifier {
        InterpModifier::Linear => "smooth",
        InterpModifier::Centroid => "centroid",
        InterpModifier::NoInterpolation => "flat",
        InterpModifier::NoPerspective => "noperspective",
        InterpModifier::Sample => "sample",
    }
}
