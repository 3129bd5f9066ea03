//! HLSL re-emission from the decorated AST.
//!
//! Used for HLSL-to-HLSL round trips. Emission is canonical: the same
//! AST always produces the same text, and re-parsing the output yields
//! an AST that emits identically. Literal spellings are kept verbatim;
//! semantics, registers and pack offsets are re-emitted.

use crate::ast::*;
use crate::error::Result;
use crate::options::{Formatting, Options};
use crate::type_denoter::TypeDenoter;
use crate::writer::IndentedWriter;
use itertools::Itertools;
use std::rc::Rc;

pub struct HlslGenerator<'a> {
    writer: IndentedWriter,
    options: &'a Options,
    formatting: &'a Formatting,
    comments: Vec<(u32, String)>,
    comment_index: usize,
}

impl<'a> HlslGenerator<'a> {
    pub fn new(options: &'a Options, formatting: &'a Formatting) -> Self {
        HlslGenerator {
            writer: IndentedWriter::new(formatting.indent.clone()),
            options,
            formatting,
            comments: Vec::new(),
            comment_index: 0,
        }
    }

    pub fn generate_code(mut self, program: &Program) -> Result<String> {
        if self.options.preserve_comments {
            self.comments = program.comments.clone();
        }
        for stmt in &program.global_stmts {
            self.emit_global_stmt(stmt);
        }
        Ok(self.writer.into_string())
    }

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

    fn emit_global_stmt(&mut self, stmt: &Stmt) {
        if self.options.preserve_comments {
            self.emit_pending_comments(stmt.area().pos.line);
        }
        match stmt {
            Stmt::Null { .. } => {}
            Stmt::FunctionDecl(decl) => self.emit_function_decl(decl),
            Stmt::StructDecl { decl, .. } => self.emit_struct_decl(decl),
            Stmt::UniformBufferDecl(decl) => self.emit_uniform_buffer_decl(decl),
            Stmt::BufferDecls(buffer_stmt) => self.emit_buffer_decls(buffer_stmt),
            Stmt::SamplerDecls(sampler_stmt) => self.emit_sampler_decls(sampler_stmt),
            Stmt::AliasDecls(alias_stmt) => self.emit_alias_decls(alias_stmt),
            Stmt::VarDecls(var_stmt) => {
                if var_stmt
                    .var_decls
                    .iter()
                    .any(|v| v.flags.contains(Flags::REACHABLE))
                {
                    if let Some(struct_decl) = &var_stmt.type_spec.struct_decl {
                        self.emit_struct_decl(struct_decl);
                    }
                    let line = self.var_decl_stmt_str(var_stmt);
                    self.writer.write_line(&line);
                }
            }
            _ => {}
        }
    }

    fn emit_struct_decl(&mut self, decl: &StructDecl) {
        if !decl.flags.contains(Flags::REACHABLE) {
            return;
        }
        let mut header = format!("struct {}", decl.ident.final_name());
        if let Some(base) = &decl.base_name {
            header.push_str(&format!(" : {}", base));
        }
        self.writer.write_line(&header);
        self.writer.open_scope();
        for member in &decl.members {
            let line = self.var_decl_stmt_str(member);
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
        let mut header = format!("{} {}", decl.kind.to_str(), decl.ident.final_name());
        for register in &decl.registers {
            header.push_str(&format!(" : register({}{})", register.slot_kind, register.slot));
        }
        self.writer.write_line(&header);
        self.writer.open_scope();
        for member in &decl.members {
            let line = self.var_decl_stmt_str(member);
            self.writer.write_line(&line);
        }
        self.writer.close_scope(";");
        if self.formatting.blanks {
            self.writer.blank_line();
        }
    }

    fn emit_buffer_decls(&mut self, stmt: &BufferDeclStmt) {
        for decl in &stmt.buffer_decls {
            if !decl.flags.contains(Flags::REACHABLE) {
                continue;
            }
            let mut line = stmt.kind.to_hlsl().to_string();
            if let Some(generic) = &stmt.generic {
                line.push_str(&format!("<{}>", self.type_str(generic)));
            }
            line.push_str(&format!(" {}", decl.ident.final_name()));
            line.push_str(&array_dims_str(&decl.array_dims));
            for register in &decl.registers {
                line.push_str(&format!(" : register({}{})", register.slot_kind, register.slot));
            }
            line.push(';');
            self.writer.write_line(&line);
        }
    }

    fn emit_sampler_decls(&mut self, stmt: &SamplerDeclStmt) {
        for decl in &stmt.sampler_decls {
            if !decl.flags.contains(Flags::REACHABLE) {
                continue;
            }
            let mut line = format!("{} {}", stmt.kind.to_hlsl(), decl.ident.final_name());
            line.push_str(&array_dims_str(&decl.array_dims));
            for register in &decl.registers {
                line.push_str(&format!(" : register({}{})", register.slot_kind, register.slot));
            }
            line.push(';');
            self.writer.write_line(&line);
        }
    }

    fn emit_alias_decls(&mut self, stmt: &AliasDeclStmt) {
        for decl in &stmt.aliases {
            if !decl.flags.contains(Flags::REACHABLE) {
                continue;
            }
            let line = format!(
                "typedef {} {};",
                self.type_str(&stmt.type_spec.ty),
                decl.ident.final_name()
            );
            self.writer.write_line(&line);
        }
    }

    fn emit_function_decl(&mut self, decl: &FunctionDecl) {
        if !decl.flags.contains(Flags::REACHABLE) {
            return;
        }
        if self.formatting.blanks {
            self.writer.blank_line();
        }
        for attribute in &decl.attributes {
            let mut line = format!("[{}", attribute.ident);
            if !attribute.args.is_empty() {
                line.push_str(&format!(
                    "({})",
                    attribute.args.iter().map(|arg| self.expr_str(arg)).join(", ")
                ));
            }
            line.push(']');
            self.writer.write_line(&line);
        }
        let params = decl
            .parameters
            .iter()
            .map(|param| self.parameter_str(param))
            .join(", ");
        let mut header = format!(
            "{} {}({})",
            self.type_spec_str(&decl.return_type),
            decl.ident.final_name(),
            params
        );
        if let Some(semantic) = &decl.semantic {
            header.push_str(&format!(" : {}", semantic));
        }
        match &decl.body {
            Some(body) => {
                self.writer.write_line(&header);
                self.emit_code_block(body);
            }
            None => {
                header.push(';');
                self.writer.write_line(&header);
            }
        }
    }

    fn parameter_str(&self, param: &VarDeclStmt) -> String {
        let var_decl = &param.var_decls[0];
        let mut text = self.type_spec_str(&param.type_spec);
        text.push_str(&format!(" {}", var_decl.ident.final_name()));
        text.push_str(&array_dims_str(&var_decl.array_dims));
        if let Some(semantic) = &var_decl.semantic {
            text.push_str(&format!(" : {}", semantic));
        }
        if let Some(init) = &var_decl.initializer {
            text.push_str(&format!(" = {}", self.expr_str(init)));
        }
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
                let line = self.var_decl_stmt_str(var_stmt);
                self.writer.write_line(&line);
            }
            Stmt::StructDecl { decl, .. } => {
                // Local structs are always kept.
                let mut header = format!("struct {}", decl.ident.final_name());
                if let Some(base) = &decl.base_name {
                    header.push_str(&format!(" : {}", base));
                }
                self.writer.write_line(&header);
                self.writer.open_scope();
                for member in &decl.members {
                    let line = self.var_decl_stmt_str(member);
                    self.writer.write_line(&line);
                }
                self.writer.close_scope(";");
            }
            Stmt::AliasDecls(alias_stmt) => {
                for decl in &alias_stmt.aliases {
                    let line = format!(
                        "typedef {} {};",
                        self.type_str(&alias_stmt.type_spec.ty),
                        decl.ident.final_name()
                    );
                    self.writer.write_line(&line);
                }
            }
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
            _ => {}
        }
    }

    fn for_init_str(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::VarDecls(var_stmt) => self.var_decl_stmt_str(var_stmt),
            Stmt::Expr(expr_stmt) => format!("{};", self.expr_str(&expr_stmt.expr)),
            _ => ";".into(),
        }
    }

    /* ----- Declarations ----- */

    fn type_spec_str(&self, spec: &TypeSpecifier) -> String {
        let mut text = String::new();
        if let Some(modifier) = spec.input_modifier {
            text.push_str(modifier.to_str());
            text.push(' ');
        }
        for class in &spec.storage_classes {
            text.push_str(class.to_str());
            text.push(' ');
        }
        for modifier in &spec.interp_modifiers {
            text.push_str(modifier.to_str());
            text.push(' ');
        }
        for modifier in &spec.type_modifiers {
            text.push_str(modifier.to_str());
            text.push(' ');
        }
        text.push_str(&self.type_str(&spec.ty));
        text
    }

    fn type_str(&self, ty: &Rc<TypeDenoter>) -> String {
        match ty.as_ref() {
            TypeDenoter::Array { base, .. } => self.type_str(base),
            TypeDenoter::Struct { ident, .. } => ident.clone(),
            TypeDenoter::Alias { ident, .. } => ident.clone(),
            other => other.to_string(),
        }
    }

    fn var_decl_stmt_str(&self, stmt: &VarDeclStmt) -> String {
        let mut text = self.type_spec_str(&stmt.type_spec);
        text.push(' ');
        let declarators = stmt
            .var_decls
            .iter()
            .map(|var_decl| {
                let mut decl_text = var_decl.ident.final_name().to_string();
                decl_text.push_str(&array_dims_str(&var_decl.array_dims));
                for register in &var_decl.registers {
                    decl_text.push_str(&format!(
                        " : register({}{})",
                        register.slot_kind, register.slot
                    ));
                }
                if let Some(packoffset) = &var_decl.packoffset {
                    decl_text.push_str(&format!(" : packoffset({}", packoffset.register_name));
                    if let Some(component) = packoffset.component {
                        decl_text.push_str(&format!(".{}", component));
                    }
                    decl_text.push(')');
                }
                if let Some(semantic) = &var_decl.semantic {
                    decl_text.push_str(&format!(" : {}", semantic));
                }
                if let Some(init) = &var_decl.initializer {
                    decl_text.push_str(&format!(" = {}", self.expr_str(init)));
                }
                decl_text
            })
            .join(", ");
        text.push_str(&declarators);
        text.push(';');
        text
    }

    /* ----- Expressions ----- */

    fn expr_str(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(literal) => literal.spell.clone(),
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
            ExprKind::Call(call) => {
                let mut text = String::new();
                if let Some(prefix) = &call.prefix {
                    text.push_str(&format!("{}.", self.expr_str(prefix)));
                }
                if let Some(ctor) = &call.type_ctor {
                    text.push_str(&self.type_str(ctor));
                } else if let Some(ident) = &call.ident {
                    text.push_str(ident.final_name());
                }
                text.push_str(&format!(
                    "({})",
                    call.args.iter().map(|arg| self.expr_str(arg)).join(", ")
                ));
                text
            }
            ExprKind::Bracket(inner) => format!("({})", self.expr_str(inner)),
            ExprKind::Object(object) => match &object.prefix {
                Some(prefix) => format!("{}.{}", self.expr_str(prefix), object.ident.final_name()),
                None => object.ident.final_name().to_string(),
            },
            ExprKind::Array { prefix, indices } => {
                let mut text = self.expr_str(prefix);
                for index in indices {
                    text.push_str(&format!("[{}]", self.expr_str(index)));
                }
                text
            }
            ExprKind::Cast { type_spec, operand } => {
                format!("({}){}", self.type_str(&type_spec.ty), self.expr_str(operand))
            }
            ExprKind::Assign { lhs, op, rhs } => format!(
                "{} {} {}",
                self.expr_str(lhs),
                op.to_str(),
                self.expr_str(rhs)
            ),
            ExprKind::Initializer(exprs) => {
                format!("{{ {} }}", exprs.iter().map(|e| self.expr_str(e)).join(", "))
            }
        }
    }
}

fn array_dims_str(dims: &[ArrayDimension]) -> String {
    let mut text = String::new();
    for dim in dims {
        match dim.size {
            Some(n) => text.push_str(&format!("[{}]", n)),
            None => match &dim.expr {
                Some(_) => text.push_str("[0]"),
                None => text.push_str("[]"),
            },
        }
    }
    text
}
