//! Semantic analysis: name binding, type denoter computation, overload
//! resolution, entry point processing and target legality checks.
//!
//! Runs as one decorated traversal after a symbol collection pass, so
//! forward references between globals resolve. Errors are collected and
//! reported together; the analyzer keeps going so one run surfaces as
//! many diagnostics as possible.

use crate::ast::*;
use crate::eval::{evaluate, Variant};
use crate::options::{NameMangling, OutputShaderVersion, ShaderTarget};
use crate::report::{Log, ReportHandler};
use crate::source::SourceArea;
use crate::symbol_table::{ScopeKind, SymbolTable};
use crate::type_denoter::{ConversionCost, DataType, ScalarType, TypeDenoter};
use log::trace;
use std::collections::HashMap;
use std::rc::Rc;

/// The slice of the input and output descriptors the analyzer reads.
pub struct AnalyzerContext<'c> {
    pub entry_point: &'c str,
    pub secondary_entry_point: Option<&'c str>,
    pub shader_target: ShaderTarget,
    pub output_version: OutputShaderVersion,
    pub name_mangling: &'c NameMangling,
    pub warnings_enabled: bool,
}

#[derive(Clone)]
enum Symbol {
    Variable {
        decl: NodeId,
        ty: Rc<TypeDenoter>,
        immutable: bool,
    },
    Function,
    Struct {
        decl: NodeId,
    },
    TypeAlias,
}

#[derive(Clone)]
struct ParamSig {
    ty: Rc<TypeDenoter>,
    has_default: bool,
}

#[derive(Clone)]
struct FunctionSig {
    params: Vec<ParamSig>,
    return_ty: Rc<TypeDenoter>,
    has_body: bool,
}

#[derive(Clone)]
struct StructSig {
    members: Vec<(String, Rc<TypeDenoter>)>,
    member_semantics: HashMap<String, Semantic>,
}

struct FunctionContext {
    return_ty: Rc<TypeDenoter>,
}

pub struct Analyzer<'a> {
    reports: ReportHandler<'a>,
    symtab: SymbolTable<Symbol>,
    functions: HashMap<NodeId, FunctionSig>,
    overloads: HashMap<String, Vec<NodeId>>,
    structs: HashMap<NodeId, StructSig>,
    current_function: Option<FunctionContext>,
}

impl<'a> Analyzer<'a> {
    pub fn new(log: Option<&'a mut dyn Log>) -> Self {
        Analyzer {
            reports: ReportHandler::new(log, "context"),
            symtab: SymbolTable::new(),
            functions: HashMap::new(),
            overloads: HashMap::new(),
            structs: HashMap::new(),
            current_function: None,
        }
    }

    /// Decorate the AST in place. Returns false if any semantic error was
    /// reported; later stages must then be skipped.
    pub fn decorate(&mut self, program: &mut Program, ctx: &AnalyzerContext) -> bool {
        self.reports.set_warnings(ctx.warnings_enabled);

        self.collect_globals(program, ctx);
        self.resolve_entry_point(program, ctx);

        let mut global_stmts = std::mem::take(&mut program.global_stmts);
        for stmt in &mut global_stmts {
            self.analyze_global_stmt(stmt, ctx);
        }
        program.global_stmts = global_stmts;

        !self.reports.has_errors()
    }

    fn error(&mut self, message: impl Into<String>, area: SourceArea) {
        self.reports.error(message, area);
    }

    fn warning(&mut self, message: impl Into<String>, area: SourceArea) {
        self.reports.warning(message, area);
    }

    /* ----- Pass 1: symbol collection ----- */

    fn collect_globals(&mut self, program: &mut Program, ctx: &AnalyzerContext) {
        let mut global_stmts = std::mem::take(&mut program.global_stmts);
        for stmt in &mut global_stmts {
            match stmt {
                Stmt::FunctionDecl(decl) => self.collect_function(decl, ctx),
                Stmt::StructDecl { decl, .. } => self.collect_struct(decl, ctx),
                Stmt::UniformBufferDecl(decl) => {
                    for member in &mut decl.members {
                        self.collect_var_decls(member, true, ctx);
                    }
                }
                Stmt::VarDecls(var_stmt) => {
                    // Globals without 'static' are uniform and immutable.
                    let immutable = !var_stmt
                        .type_spec
                        .storage_classes
                        .contains(&StorageClass::Static)
                        || var_stmt.type_spec.is_const();
                    self.collect_var_decls(var_stmt, immutable, ctx);
                }
                Stmt::BufferDecls(buffer_stmt) => {
                    for decl in &mut buffer_stmt.buffer_decls {
                        let base = Rc::new(TypeDenoter::Buffer {
                            kind: buffer_stmt.kind,
                            generic: buffer_stmt.generic.clone(),
                        });
                        let ty = self.resolve_array_type(base, &mut decl.array_dims);
                        self.register_symbol(
                            decl.ident.original.clone(),
                            Symbol::Variable {
                                decl: decl.id,
                                ty,
                                immutable: true,
                            },
                            decl.area,
                        );
                    }
                }
                Stmt::SamplerDecls(sampler_stmt) => {
                    for decl in &mut sampler_stmt.sampler_decls {
                        let base = Rc::new(TypeDenoter::Sampler {
                            kind: sampler_stmt.kind,
                        });
                        let ty = self.resolve_array_type(base, &mut decl.array_dims);
                        self.register_symbol(
                            decl.ident.original.clone(),
                            Symbol::Variable {
                                decl: decl.id,
                                ty,
                                immutable: true,
                            },
                            decl.area,
                        );
                    }
                }
                Stmt::AliasDecls(alias_stmt) => {
                    for decl in &alias_stmt.aliases {
                        self.register_symbol(
                            decl.ident.original.clone(),
                            Symbol::TypeAlias,
                            decl.area,
                        );
                    }
                }
                _ => {}
            }
        }
        program.global_stmts = global_stmts;
    }

    fn collect_function(&mut self, decl: &mut FunctionDecl, ctx: &AnalyzerContext) {
        trace!("collect_function: '{}'", decl.ident.original);
        self.check_type_spec_legality(&decl.return_type, ctx);
        let mut params = Vec::new();
        for param in &mut decl.parameters {
            if let Some(struct_decl) = &mut param.type_spec.struct_decl {
                self.collect_struct(struct_decl, ctx);
            }
            self.check_type_spec_legality(&param.type_spec, ctx);
            if param
                .type_spec
                .storage_classes
                .contains(&StorageClass::Static)
            {
                self.error(
                    "storage class 'static' is not allowed on parameters",
                    param.area,
                );
            }
            let var_decl = &mut param.var_decls[0];
            let ty = self.resolve_array_type(Rc::clone(&param.type_spec.ty), &mut var_decl.array_dims);
            var_decl.ty = Some(Rc::clone(&ty));
            params.push(ParamSig {
                ty,
                has_default: var_decl.initializer.is_some(),
            });
        }
        let sig = FunctionSig {
            params,
            return_ty: Rc::clone(&decl.return_type.ty),
            has_body: decl.body.is_some(),
        };
        self.functions.insert(decl.id, sig);
        self.overloads
            .entry(decl.ident.original.clone())
            .or_default()
            .push(decl.id);
        let name = decl.ident.original.clone();
        let area = decl.area;
        let result = self.symtab.register(name.clone(), Symbol::Function, |prev, _new| {
            matches!(prev, Symbol::Function)
        });
        if result.is_err() {
            self.error(
                format!("'{}' is already declared as a different kind of symbol", name),
                area,
            );
        }
    }

    fn collect_struct(&mut self, decl: &mut StructDecl, ctx: &AnalyzerContext) {
        let mut members = Vec::new();
        let mut member_semantics = HashMap::new();
        if let Some(base_name) = decl.base_name.clone() {
            // Base members come first, matching the declaration order.
            match self.symtab.fetch(&base_name).cloned() {
                Some(Symbol::Struct { decl: base_id }) => {
                    if let Some(base_sig) = self.structs.get(&base_id) {
                        members.extend(base_sig.members.iter().cloned());
                        member_semantics.extend(
                            base_sig
                                .member_semantics
                                .iter()
                                .map(|(k, v)| (k.clone(), v.clone())),
                        );
                    }
                }
                _ => {
                    self.error(
                        format!("unknown base struct '{}'", base_name),
                        decl.area,
                    );
                }
            }
        }
        for member_stmt in &mut decl.members {
            self.check_type_spec_legality(&member_stmt.type_spec, ctx);
            for var_decl in &mut member_stmt.var_decls {
                let ty = self.resolve_array_type(
                    Rc::clone(&member_stmt.type_spec.ty),
                    &mut var_decl.array_dims,
                );
                var_decl.ty = Some(Rc::clone(&ty));
                if members.iter().any(|(name, _)| *name == var_decl.ident.original) {
                    self.error(
                        format!(
                            "duplicate member '{}' in struct '{}'",
                            var_decl.ident.original, decl.ident.original
                        ),
                        var_decl.area,
                    );
                    continue;
                }
                if let Some(semantic) = &var_decl.semantic {
                    member_semantics.insert(var_decl.ident.original.clone(), semantic.clone());
                }
                members.push((var_decl.ident.original.clone(), ty));
            }
        }
        self.structs.insert(
            decl.id,
            StructSig {
                members,
                member_semantics,
            },
        );
        if !decl.ident.original.is_empty() {
            let name = decl.ident.original.clone();
            let area = decl.area;
            let id = decl.id;
            if self
                .symtab
                .register(name.clone(), Symbol::Struct { decl: id }, |_, _| false)
                .is_err()
            {
                self.error(format!("'{}' is already declared", name), area);
            }
        }
    }

    fn collect_var_decls(&mut self, stmt: &mut VarDeclStmt, immutable: bool, ctx: &AnalyzerContext) {
        if let Some(decl) = &mut stmt.type_spec.struct_decl {
            self.collect_struct(decl, ctx);
        }
        self.check_type_spec_legality(&stmt.type_spec, ctx);
        for var_decl in &mut stmt.var_decls {
            let ty = self.resolve_array_type(Rc::clone(&stmt.type_spec.ty), &mut var_decl.array_dims);
            var_decl.ty = Some(Rc::clone(&ty));
            if immutable {
                var_decl.flags.insert(Flags::IS_IMMUTABLE);
            }
            self.register_symbol(
                var_decl.ident.original.clone(),
                Symbol::Variable {
                    decl: var_decl.id,
                    ty,
                    immutable,
                },
                var_decl.area,
            );
        }
    }

    fn register_symbol(&mut self, name: String, symbol: Symbol, area: SourceArea) {
        if self
            .symtab
            .register(name.clone(), symbol, |_, _| false)
            .is_err()
        {
            self.error(
                format!("identifier '{}' is already declared in this scope", name),
                area,
            );
        }
    }

    /// Evaluate array dimension expressions and wrap the base type.
    fn resolve_array_type(
        &mut self,
        base: Rc<TypeDenoter>,
        dims: &mut [ArrayDimension],
    ) -> Rc<TypeDenoter> {
        if dims.is_empty() {
            return base;
        }
        for dim in dims.iter_mut() {
            if let Some(expr) = &dim.expr {
                match evaluate(expr) {
                    Some(Variant::Int(n)) if n > 0 => dim.size = Some(n as u32),
                    Some(Variant::Int(_)) => {
                        self.error("array dimension must be positive", dim.area);
                    }
                    _ => {
                        self.error(
                            "array dimension must be a constant integer expression",
                            dim.area,
                        );
                    }
                }
            }
        }
        Rc::new(TypeDenoter::Array {
            base,
            dimensions: dims.iter().map(|d| d.size).collect(),
        })
    }

    fn check_type_spec_legality(&mut self, spec: &TypeSpecifier, ctx: &AnalyzerContext) {
        if let Some(data_type) = spec.ty.as_base() {
            if data_type.scalar_type() == ScalarType::Double
                && !ctx.output_version.supports_doubles()
            {
                self.error(
                    format!(
                        "double-precision types are not supported by the {} output",
                        ctx.output_version
                    ),
                    spec.area,
                );
            }
        }
    }

    /* ----- Entry point ----- */

    fn resolve_entry_point(&mut self, program: &mut Program, ctx: &AnalyzerContext) {
        if ctx.entry_point.is_empty() {
            return;
        }
        let candidates: Vec<NodeId> = self
            .overloads
            .get(ctx.entry_point)
            .map(|ids| {
                ids.iter()
                    .filter(|id| self.functions[*id].has_body)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        let entry_id = match candidates.as_slice() {
            [] => {
                self.error(
                    format!("entry point '{}' not found", ctx.entry_point),
                    SourceArea::ZERO,
                );
                return;
            }
            [id] => *id,
            _ => {
                self.error(
                    format!("entry point '{}' must not be overloaded", ctx.entry_point),
                    SourceArea::ZERO,
                );
                return;
            }
        };
        program.entry_point = Some(entry_id);

        let secondary_id = ctx.secondary_entry_point.and_then(|name| {
            self.overloads
                .get(name)
                .and_then(|ids| ids.first())
                .copied()
        });

        // Decorate the declarations and derive the stage layout records.
        for stmt in &mut program.global_stmts {
            let Stmt::FunctionDecl(decl) = stmt else {
                continue;
            };
            if decl.id == entry_id {
                decl.flags.insert(Flags::IS_ENTRY_POINT);
            } else if Some(decl.id) == secondary_id {
                decl.flags.insert(Flags::IS_SECONDARY_ENTRY_POINT);
            }
        }

        self.apply_entry_attributes(program, entry_id, ctx);
        if ctx.output_version.is_glsl_family() {
            self.flatten_entry_io(program, entry_id, ctx);
        }
    }

    fn apply_entry_attributes(&mut self, program: &mut Program, entry_id: NodeId, ctx: &AnalyzerContext) {
        let attributes: Vec<Attribute> = program
            .global_stmts
            .iter()
            .find_map(|stmt| match stmt {
                Stmt::FunctionDecl(decl) if decl.id == entry_id => Some(decl.attributes.clone()),
                _ => None,
            })
            .unwrap_or_default();

        for attribute in &attributes {
            let int_arg = |index: usize| -> Option<i64> {
                attribute.args.get(index).and_then(evaluate).map(|v| v.to_int())
            };
            let string_arg = |index: usize| -> Option<String> {
                attribute.args.get(index).and_then(|expr| match &expr.kind {
                    ExprKind::Literal(literal) if literal.kind == LiteralKind::String => {
                        Some(literal.spell.trim_matches('"').to_string())
                    }
                    _ => None,
                })
            };
            match attribute.ident.as_str() {
                "numthreads" => {
                    if ctx.shader_target != ShaderTarget::ComputeShader {
                        self.warning(
                            "'numthreads' is only relevant for compute shaders",
                            attribute.area,
                        );
                    }
                    let mut num_threads = [1u32; 3];
                    for (index, slot) in num_threads.iter_mut().enumerate() {
                        match int_arg(index) {
                            Some(n) if n > 0 => *slot = n as u32,
                            _ => self.error(
                                "'numthreads' requires three positive constant arguments",
                                attribute.area,
                            ),
                        }
                    }
                    program.compute_layout.num_threads = num_threads;
                }
                "maxvertexcount" => match int_arg(0) {
                    Some(n) if n > 0 => program.geometry_layout.max_vertices = n as u32,
                    _ => self.error(
                        "'maxvertexcount' requires a positive constant argument",
                        attribute.area,
                    ),
                },
                "earlydepthstencil" => {
                    program.fragment_layout.early_depth_stencil = true;
                }
                "domain" => {
                    program.tess_eval_layout.domain = string_arg(0);
                }
                "partitioning" => {
                    program.tess_eval_layout.partitioning = string_arg(0);
                }
                "outputtopology" => {
                    program.tess_eval_layout.output_topology = string_arg(0);
                }
                "outputcontrolpoints" => match int_arg(0) {
                    Some(n) if n > 0 => program.tess_control_layout.output_control_points = n as u32,
                    _ => self.error(
                        "'outputcontrolpoints' requires a positive constant argument",
                        attribute.area,
                    ),
                },
                "maxtessfactor" => {
                    if let Some(value) = attribute.args.first().and_then(evaluate) {
                        program.tess_control_layout.max_tess_factor = value.to_real() as f32;
                    }
                }
                "patchconstantfunc" => {
                    program.tess_control_layout.patch_constant_func = string_arg(0);
                }
                _ => {}
            }
        }
    }

    /// Flatten the entry point interface into global IO variables for
    /// targets that do not carry semantics on parameters. The generator
    /// later emits a wrapper `main` that feeds the original function.
    fn flatten_entry_io(&mut self, program: &mut Program, entry_id: NodeId, ctx: &AnalyzerContext) {
        let mut entry_io = EntryIo::default();
        let mut io_struct_ids = Vec::new();

        // Split borrow: the entry declaration is inspected while IO
        // records are built, then written back.
        let mut entry_decl = None;
        for stmt in &mut program.global_stmts {
            if let Stmt::FunctionDecl(decl) = stmt {
                if decl.id == entry_id {
                    entry_decl = Some(decl);
                    break;
                }
            }
        }
        let Some(decl) = entry_decl else {
            return;
        };

        for param in &decl.parameters {
            let var_decl = &param.var_decls[0];
            let param_name = var_decl.ident.original.clone();
            let modifier = param.type_spec.input_modifier.unwrap_or(InputModifier::In);
            let is_output = matches!(modifier, InputModifier::Out | InputModifier::InOut);
            let ty = var_decl
                .ty
                .clone()
                .unwrap_or_else(|| Rc::clone(&param.type_spec.ty));

            if let Some(struct_id) = ty.struct_decl() {
                io_struct_ids.push((struct_id, is_output));
                let members = self
                    .structs
                    .get(&struct_id)
                    .map(|sig| sig.members.clone())
                    .unwrap_or_default();
                let member_semantics = self.struct_member_semantics(struct_id);
                for (member_name, member_ty) in members {
                    let semantic = member_semantics
                        .get(&member_name)
                        .cloned()
                        .unwrap_or_else(|| Semantic::parse(&member_name.to_ascii_uppercase()));
                    let io = IoVar {
                        name: format!(
                            "{}{}",
                            if is_output {
                                &ctx.name_mangling.output_prefix
                            } else {
                                &ctx.name_mangling.input_prefix
                            },
                            member_name
                        ),
                        param: param_name.clone(),
                        member: Some(member_name),
                        semantic,
                        ty: member_ty,
                        interp_modifiers: param.type_spec.interp_modifiers.clone(),
                    };
                    if is_output {
                        entry_io.outputs.push(io);
                    } else {
                        entry_io.inputs.push(io);
                    }
                }
            } else {
                let semantic = match &var_decl.semantic {
                    Some(semantic) => semantic.clone(),
                    None => {
                        self.warning(
                            format!("entry point parameter '{}' has no semantic", param_name),
                            var_decl.area,
                        );
                        Semantic::parse(&param_name.to_ascii_uppercase())
                    }
                };
                let io = IoVar {
                    name: format!(
                        "{}{}",
                        if is_output {
                            &ctx.name_mangling.output_prefix
                        } else {
                            &ctx.name_mangling.input_prefix
                        },
                        param_name
                    ),
                    param: param_name.clone(),
                    member: None,
                    semantic,
                    ty,
                    interp_modifiers: param.type_spec.interp_modifiers.clone(),
                };
                if is_output {
                    entry_io.outputs.push(io);
                } else {
                    entry_io.inputs.push(io);
                }
            }
        }

        // Return value becomes one or more output variables.
        let return_ty = Rc::clone(&decl.return_type.ty);
        if !return_ty.is_void() {
            if let Some(struct_id) = return_ty.struct_decl() {
                io_struct_ids.push((struct_id, true));
                let members = self
                    .structs
                    .get(&struct_id)
                    .map(|sig| sig.members.clone())
                    .unwrap_or_default();
                let member_semantics = self.struct_member_semantics(struct_id);
                for (member_name, member_ty) in members {
                    let semantic = member_semantics
                        .get(&member_name)
                        .cloned()
                        .unwrap_or_else(|| Semantic::parse(&member_name.to_ascii_uppercase()));
                    entry_io.outputs.push(IoVar {
                        name: format!("{}{}", ctx.name_mangling.output_prefix, member_name),
                        param: String::new(),
                        member: Some(member_name),
                        semantic,
                        ty: member_ty,
                        interp_modifiers: Vec::new(),
                    });
                }
            } else {
                let semantic = match &decl.semantic {
                    Some(semantic) => semantic.clone(),
                    None => {
                        self.error(
                            "entry point return value requires a semantic",
                            decl.area,
                        );
                        Semantic::parse("COLOR")
                    }
                };
                entry_io.outputs.push(IoVar {
                    name: format!("{}{}", ctx.name_mangling.output_prefix, semantic),
                    param: String::new(),
                    member: None,
                    semantic,
                    ty: return_ty,
                    interp_modifiers: Vec::new(),
                });
            }
        }

        // Rename the entry function if it collides with the wrapper.
        if decl.ident.original == "main" {
            let renamed = format!("{}main", ctx.name_mangling.reserved_word_prefix);
            decl.ident.rename(renamed);
        }

        program.entry_io = entry_io;

        for (struct_id, is_output) in io_struct_ids {
            mark_struct_flags(
                program,
                struct_id,
                if is_output {
                    Flags::IS_SHADER_OUTPUT
                } else {
                    Flags::IS_SHADER_INPUT
                },
            );
        }
    }

    /// Member name to semantic mapping of a struct declaration.
    fn struct_member_semantics(&self, struct_id: NodeId) -> HashMap<String, Semantic> {
        self.structs
            .get(&struct_id)
            .map(|sig| sig.member_semantics.clone())
            .unwrap_or_default()
    }

    /* ----- Pass 2: decoration ----- */

    fn analyze_global_stmt(&mut self, stmt: &mut Stmt, ctx: &AnalyzerContext) {
        match stmt {
            Stmt::FunctionDecl(decl) => self.analyze_function(decl, ctx),
            Stmt::VarDecls(var_stmt) => {
                for var_decl in &mut var_stmt.var_decls {
                    self.analyze_initializer(var_decl);
                }
            }
            Stmt::UniformBufferDecl(decl) => {
                for member in &mut decl.members {
                    for var_decl in &mut member.var_decls {
                        self.analyze_initializer(var_decl);
                    }
                }
            }
            _ => {}
        }
    }

    fn analyze_function(&mut self, decl: &mut FunctionDecl, ctx: &AnalyzerContext) {
        trace!("analyze_function: '{}'", decl.ident.original);
        let Some(body) = &mut decl.body else {
            return;
        };
        self.symtab.open_scope(ScopeKind::FunctionBody);
        for param in &mut decl.parameters {
            let var_decl = &mut param.var_decls[0];
            let ty = var_decl
                .ty
                .clone()
                .unwrap_or_else(|| Rc::clone(&param.type_spec.ty));
            self.register_symbol(
                var_decl.ident.original.clone(),
                Symbol::Variable {
                    decl: var_decl.id,
                    ty,
                    immutable: false,
                },
                var_decl.area,
            );
            if let Some(init) = &mut var_decl.initializer {
                self.analyze_expr(init);
            }
        }

        self.current_function = Some(FunctionContext {
            return_ty: Rc::clone(&decl.return_type.ty),
        });
        let mut stmts = std::mem::take(&mut body.stmts);
        for stmt in &mut stmts {
            self.analyze_stmt(stmt, ctx);
        }
        body.stmts = stmts;
        self.current_function = None;
        self.symtab.close_scope();

        // Join over the statement tree: a missing return on any path of a
        // non-void function is flagged and reported.
        if !decl.return_type.ty.is_void() && !block_returns(decl.body.as_ref().expect("body kept")) {
            decl.flags.insert(Flags::HAS_NON_RETURN_PATH);
            self.warning(
                format!(
                    "not all control paths of function '{}' return a value",
                    decl.ident.original
                ),
                decl.area,
            );
        }
    }

    fn analyze_stmt(&mut self, stmt: &mut Stmt, ctx: &AnalyzerContext) {
        match stmt {
            Stmt::Null { .. } | Stmt::CtrlTransfer { .. } => {}
            Stmt::CodeBlock { block, .. } => {
                self.symtab.open_scope(ScopeKind::CodeBlock);
                for stmt in &mut block.stmts {
                    self.analyze_stmt(stmt, ctx);
                }
                self.symtab.close_scope();
            }
            Stmt::VarDecls(var_stmt) => self.analyze_local_var_decls(var_stmt, ctx),
            Stmt::StructDecl { decl, .. } => self.collect_struct(decl, ctx),
            Stmt::AliasDecls(alias_stmt) => {
                for alias in &alias_stmt.aliases {
                    self.register_symbol(alias.ident.original.clone(), Symbol::TypeAlias, alias.area);
                }
            }
            Stmt::FunctionDecl(decl) => {
                self.error(
                    "local function declarations are not allowed",
                    decl.area,
                );
            }
            Stmt::UniformBufferDecl(decl) => {
                self.error(
                    format!("'{}' is only allowed at global scope", decl.kind.to_str()),
                    decl.area,
                );
            }
            Stmt::BufferDecls(buffer_stmt) => {
                self.error(
                    "buffer declarations are only allowed at global scope",
                    buffer_stmt.area,
                );
            }
            Stmt::SamplerDecls(sampler_stmt) => {
                self.error(
                    "sampler declarations are only allowed at global scope",
                    sampler_stmt.area,
                );
            }
            Stmt::For(for_stmt) => {
                self.symtab.open_scope(ScopeKind::ForInit);
                if let Some(init) = &mut for_stmt.init {
                    self.analyze_stmt(init, ctx);
                }
                if let Some(condition) = &mut for_stmt.condition {
                    self.analyze_expr(condition);
                }
                if let Some(iteration) = &mut for_stmt.iteration {
                    self.analyze_expr(iteration);
                }
                self.analyze_stmt(&mut for_stmt.body, ctx);
                self.symtab.close_scope();
            }
            Stmt::While(while_stmt) => {
                self.analyze_expr(&mut while_stmt.condition);
                self.analyze_stmt(&mut while_stmt.body, ctx);
            }
            Stmt::DoWhile(do_while_stmt) => {
                self.analyze_stmt(&mut do_while_stmt.body, ctx);
                self.analyze_expr(&mut do_while_stmt.condition);
            }
            Stmt::If(if_stmt) => {
                self.analyze_expr(&mut if_stmt.condition);
                self.analyze_stmt(&mut if_stmt.then_branch, ctx);
                if let Some(else_branch) = &mut if_stmt.else_branch {
                    self.analyze_stmt(else_branch, ctx);
                }
            }
            Stmt::Switch(switch_stmt) => {
                self.analyze_expr(&mut switch_stmt.selector);
                for case in &mut switch_stmt.cases {
                    if let Some(expr) = &mut case.expr {
                        self.analyze_expr(expr);
                    }
                    for stmt in &mut case.stmts {
                        self.analyze_stmt(stmt, ctx);
                    }
                }
            }
            Stmt::Expr(expr_stmt) => {
                self.analyze_expr(&mut expr_stmt.expr);
            }
            Stmt::Return(return_stmt) => {
                let expected = self
                    .current_function
                    .as_ref()
                    .map(|f| Rc::clone(&f.return_ty));
                if let Some(expr) = &mut return_stmt.expr {
                    let ty = self.analyze_expr(expr);
                    if let Some(expected) = expected {
                        if expected.is_void() {
                            self.error("void function must not return a value", return_stmt.area);
                        } else if !ty.is_void() && ty.conversion_cost(&expected).is_none() {
                            self.error(
                                format!("cannot convert return value from '{}' to '{}'", ty, expected),
                                return_stmt.area,
                            );
                        }
                    }
                } else if let Some(expected) = expected {
                    if !expected.is_void() {
                        self.error(
                            format!("function must return a value of type '{}'", expected),
                            return_stmt.area,
                        );
                    }
                }
            }
        }
    }

    fn analyze_local_var_decls(&mut self, stmt: &mut VarDeclStmt, ctx: &AnalyzerContext) {
        self.check_type_spec_legality(&stmt.type_spec, ctx);
        if let Some(struct_decl) = &mut stmt.type_spec.struct_decl {
            self.collect_struct(struct_decl, ctx);
        }
        if !stmt.type_spec.interp_modifiers.is_empty() && self.symtab.depth() > 0 {
            self.error(
                "interpolation modifiers are not allowed on local variables",
                stmt.area,
            );
        }
        let immutable = stmt.type_spec.is_const();
        for var_decl in &mut stmt.var_decls {
            let ty = self.resolve_array_type(Rc::clone(&stmt.type_spec.ty), &mut var_decl.array_dims);
            var_decl.ty = Some(Rc::clone(&ty));
            if immutable {
                var_decl.flags.insert(Flags::IS_IMMUTABLE);
            }
            self.analyze_initializer(var_decl);
            self.register_symbol(
                var_decl.ident.original.clone(),
                Symbol::Variable {
                    decl: var_decl.id,
                    ty,
                    immutable,
                },
                var_decl.area,
            );
        }
    }

    fn analyze_initializer(&mut self, var_decl: &mut VarDecl) {
        let Some(init) = &mut var_decl.initializer else {
            return;
        };
        let init_ty = self.analyze_expr(init);
        let Some(target_ty) = &var_decl.ty else {
            return;
        };
        if matches!(init.kind, ExprKind::Initializer(_)) {
            // Brace initializers are checked element-wise against arrays.
            return;
        }
        if !init_ty.is_void() && init_ty.conversion_cost(target_ty).is_none() {
            self.error(
                format!(
                    "cannot initialize '{}' of type '{}' with '{}'",
                    var_decl.ident.original, target_ty, init_ty
                ),
                var_decl.area,
            );
        }
    }

    /* ----- Expressions ----- */

    /// Compute and store the type denoter of `expr` bottom-up. The void
    /// type doubles as the poison type: once an operand failed, derived
    /// expressions stay silent to avoid error cascades.
    fn analyze_expr(&mut self, expr: &mut Expr) -> Rc<TypeDenoter> {
        let ty = self.compute_expr_type(expr);
        expr.ty = Some(Rc::clone(&ty));
        ty
    }

    fn compute_expr_type(&mut self, expr: &mut Expr) -> Rc<TypeDenoter> {
        let area = expr.area;
        match &mut expr.kind {
            ExprKind::Literal(literal) => literal_type(literal),
            ExprKind::Sequence(exprs) => {
                let mut ty = TypeDenoter::void();
                for expr in exprs {
                    ty = self.analyze_expr(expr);
                }
                ty
            }
            ExprKind::Bracket(inner) => self.analyze_expr(inner),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.analyze_expr(cond);
                let then_ty = self.analyze_expr(then_expr);
                let else_ty = self.analyze_expr(else_expr);
                if then_ty.is_void() || else_ty.is_void() {
                    return TypeDenoter::void();
                }
                match TypeDenoter::common_type(&then_ty, &else_ty) {
                    Some(ty) => ty,
                    None if then_ty.conversion_cost(&else_ty).is_some() => then_ty,
                    None => {
                        self.error(
                            format!(
                                "incompatible branch types '{}' and '{}' in conditional expression",
                                then_ty, else_ty
                            ),
                            area,
                        );
                        TypeDenoter::void()
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let lhs_ty = self.analyze_expr(lhs);
                let rhs_ty = self.analyze_expr(rhs);
                self.binary_expr_type(op, &lhs_ty, &rhs_ty, area)
            }
            ExprKind::Unary { op, operand } | ExprKind::PostUnary { op, operand } => {
                let op = *op;
                let operand_ty = self.analyze_expr(operand);
                if operand_ty.is_void() {
                    return TypeDenoter::void();
                }
                match op {
                    UnaryOp::LogicalNot => {
                        TypeDenoter::scalar(ScalarType::Bool)
                    }
                    UnaryOp::BitNot => {
                        if operand_ty
                            .as_base()
                            .map(|dt| dt.scalar_type().is_integral())
                            != Some(true)
                        {
                            self.error("operator '~' requires an integral operand", area);
                            return TypeDenoter::void();
                        }
                        operand_ty
                    }
                    _ => {
                        if operand_ty.as_base().is_none() {
                            self.error(
                                format!("invalid operand of type '{}'", operand_ty),
                                area,
                            );
                            return TypeDenoter::void();
                        }
                        operand_ty
                    }
                }
            }
            ExprKind::Assign { lhs, op, rhs } => {
                let op = *op;
                let lhs_ty = self.analyze_expr(lhs);
                let rhs_ty = self.analyze_expr(rhs);
                self.check_assignable(lhs);
                if !lhs_ty.is_void() && !rhs_ty.is_void() {
                    if rhs_ty.conversion_cost(&lhs_ty).is_none() {
                        self.error(
                            format!("cannot assign '{}' to '{}'", rhs_ty, lhs_ty),
                            area,
                        );
                    } else if op != AssignOp::Set
                        && lhs_ty.as_base().is_none()
                    {
                        self.error("compound assignment requires a numeric target", area);
                    }
                }
                lhs_ty
            }
            ExprKind::Array { prefix, indices } => {
                let prefix_ty = self.analyze_expr(prefix);
                for index in indices.iter_mut() {
                    let index_ty = self.analyze_expr(index);
                    if !index_ty.is_void()
                        && index_ty
                            .as_base()
                            .map(|dt| dt.scalar_type().is_integral() && dt.is_scalar())
                            != Some(true)
                    {
                        self.error("array index must be a scalar integer", index.area);
                    }
                }
                self.indexed_type(&prefix_ty, indices.len(), area)
            }
            ExprKind::Cast { type_spec, operand } => {
                let operand_ty = self.analyze_expr(operand);
                let target = Rc::clone(&type_spec.ty);
                if !operand_ty.is_void() {
                    let castable = match (operand_ty.get_aliased().as_ref(), target.get_aliased().as_ref()) {
                        (TypeDenoter::Base(_), TypeDenoter::Base(_)) => true,
                        (a, b) => a == b,
                    };
                    if !castable {
                        self.error(
                            format!("cannot cast from '{}' to '{}'", operand_ty, target),
                            area,
                        );
                    }
                }
                target
            }
            ExprKind::Initializer(exprs) => {
                for expr in exprs {
                    self.analyze_expr(expr);
                }
                TypeDenoter::void()
            }
            ExprKind::Object(_) => self.analyze_object_expr(expr),
            ExprKind::Call(_) => self.analyze_call_expr(expr),
        }
    }

    fn binary_expr_type(
        &mut self,
        op: BinaryOp,
        lhs_ty: &Rc<TypeDenoter>,
        rhs_ty: &Rc<TypeDenoter>,
        area: SourceArea,
    ) -> Rc<TypeDenoter> {
        if lhs_ty.is_void() || rhs_ty.is_void() {
            return TypeDenoter::void();
        }
        if op.is_logical() {
            return TypeDenoter::scalar(ScalarType::Bool);
        }
        if op.is_comparison() {
            // Componentwise comparison keeps the operand shape as bools.
            return match TypeDenoter::common_type(lhs_ty, rhs_ty) {
                Some(common) => match common.as_base() {
                    Some(data_type) => {
                        TypeDenoter::base(data_type.with_scalar(ScalarType::Bool))
                    }
                    None => TypeDenoter::scalar(ScalarType::Bool),
                },
                None => {
                    self.error(
                        format!("cannot compare '{}' with '{}'", lhs_ty, rhs_ty),
                        area,
                    );
                    TypeDenoter::void()
                }
            };
        }
        if op.is_bitwise() {
            let both_integral = [lhs_ty, rhs_ty].iter().all(|ty| {
                ty.as_base()
                    .map(|dt| dt.scalar_type().is_integral())
                    .unwrap_or(false)
            });
            if !both_integral {
                self.error(
                    format!("operator '{}' requires integral operands", op.to_str()),
                    area,
                );
                return TypeDenoter::void();
            }
        }
        match TypeDenoter::common_type(lhs_ty, rhs_ty) {
            Some(ty) => ty,
            None => {
                self.error(
                    format!(
                        "invalid operands '{}' and '{}' to operator '{}'",
                        lhs_ty,
                        rhs_ty,
                        op.to_str()
                    ),
                    area,
                );
                TypeDenoter::void()
            }
        }
    }

    fn indexed_type(
        &mut self,
        prefix_ty: &Rc<TypeDenoter>,
        index_count: usize,
        area: SourceArea,
    ) -> Rc<TypeDenoter> {
        let mut ty = prefix_ty.get_aliased();
        for _ in 0..index_count {
            let next = match ty.as_ref() {
                TypeDenoter::Void => return TypeDenoter::void(),
                TypeDenoter::Array { base, dimensions } => {
                    if dimensions.len() > 1 {
                        Rc::new(TypeDenoter::Array {
                            base: Rc::clone(base),
                            dimensions: dimensions[1..].to_vec(),
                        })
                    } else {
                        base.get_aliased()
                    }
                }
                TypeDenoter::Base(DataType::Vector(scalar, _)) => TypeDenoter::scalar(*scalar),
                TypeDenoter::Base(DataType::Matrix(scalar, _, cols)) => {
                    TypeDenoter::base(DataType::Vector(*scalar, *cols))
                }
                TypeDenoter::Buffer { generic, .. } => generic
                    .clone()
                    .unwrap_or_else(|| TypeDenoter::base(DataType::Vector(ScalarType::Float, 4))),
                _ => {
                    self.error(format!("type '{}' cannot be indexed", ty), area);
                    return TypeDenoter::void();
                }
            };
            ty = next;
        }
        ty
    }

    fn check_assignable(&mut self, lhs: &Expr) {
        if let ExprKind::Object(object) = &lhs.kind {
            if object.prefix.is_none() {
                if let Some(Symbol::Variable {
                    immutable: true, ..
                }) = self.symtab.fetch(&object.ident.original)
                {
                    self.error(
                        format!("cannot assign to constant '{}'", object.ident.original),
                        lhs.area,
                    );
                }
            }
        }
    }

    fn analyze_object_expr(&mut self, expr: &mut Expr) -> Rc<TypeDenoter> {
        let area = expr.area;
        let ExprKind::Object(object) = &mut expr.kind else {
            unreachable!("caller matched object expression");
        };
        match &mut object.prefix {
            None => {
                let name = object.ident.original.clone();
                match self.symtab.fetch(&name).cloned() {
                    Some(Symbol::Variable { decl, ty, .. }) => {
                        object.symbol_ref = Some(decl);
                        ty
                    }
                    Some(Symbol::Function) => {
                        self.error(
                            format!("function '{}' must be called", name),
                            area,
                        );
                        TypeDenoter::void()
                    }
                    Some(Symbol::Struct { .. }) | Some(Symbol::TypeAlias) => {
                        self.error(format!("type '{}' used as a value", name), area);
                        TypeDenoter::void()
                    }
                    None => {
                        self.error(format!("undefined identifier '{}'", name), area);
                        TypeDenoter::void()
                    }
                }
            }
            Some(prefix) => {
                let prefix_ty = self.analyze_expr(prefix);
                if prefix_ty.is_void() {
                    return TypeDenoter::void();
                }
                let member = object.ident.original.clone();
                let resolved = prefix_ty.get_aliased();
                match resolved.as_ref() {
                    TypeDenoter::Struct { decl: Some(id), ident } => {
                        match self
                            .structs
                            .get(id)
                            .and_then(|sig| sig.members.iter().find(|(name, _)| *name == member))
                        {
                            Some((_, ty)) => Rc::clone(ty),
                            None => {
                                self.error(
                                    format!("struct '{}' has no member '{}'", ident, member),
                                    area,
                                );
                                TypeDenoter::void()
                            }
                        }
                    }
                    TypeDenoter::Base(data_type) => {
                        match swizzle_type(*data_type, &member) {
                            Some(ty) => TypeDenoter::base(ty),
                            None => {
                                self.error(
                                    format!(
                                        "invalid swizzle '{}' on type '{}'",
                                        member,
                                        data_type.to_hlsl()
                                    ),
                                    area,
                                );
                                TypeDenoter::void()
                            }
                        }
                    }
                    _ => {
                        self.error(
                            format!("type '{}' has no members", prefix_ty),
                            area,
                        );
                        TypeDenoter::void()
                    }
                }
            }
        }
    }

    fn analyze_call_expr(&mut self, expr: &mut Expr) -> Rc<TypeDenoter> {
        let area = expr.area;
        let ExprKind::Call(call) = &mut expr.kind else {
            unreachable!("caller matched call expression");
        };
        let mut arg_types = Vec::with_capacity(call.args.len());
        for arg in &mut call.args {
            let ty = self.compute_and_set(arg);
            arg_types.push(ty);
        }

        // Method call on an object, e.g. texture.Sample(sampler, uv).
        if let Some(prefix) = &mut call.prefix {
            let prefix_ty = {
                let ty = self.compute_and_set(prefix);
                ty.get_aliased()
            };
            let name = call
                .ident
                .as_ref()
                .map(|i| i.original.clone())
                .unwrap_or_default();
            return match prefix_ty.as_ref() {
                TypeDenoter::Buffer { kind, generic } if kind.is_texture() => {
                    match name.as_str() {
                        "Sample" | "SampleLevel" => {
                            call.intrinsic = Intrinsic::parse(&name);
                            if call.args.len() < 2 {
                                self.error(
                                    format!("'{}' expects a sampler and coordinates", name),
                                    area,
                                );
                            }
                            generic.clone().unwrap_or_else(|| {
                                TypeDenoter::base(DataType::Vector(ScalarType::Float, 4))
                            })
                        }
                        _ => {
                            self.error(
                                format!("unknown texture method '{}'", name),
                                area,
                            );
                            TypeDenoter::void()
                        }
                    }
                }
                TypeDenoter::Void => TypeDenoter::void(),
                _ => {
                    self.error(
                        format!("type '{}' has no methods", prefix_ty),
                        area,
                    );
                    TypeDenoter::void()
                }
            };
        }

        // Type constructor call, e.g. float4(...).
        if let Some(ctor) = &call.type_ctor {
            return Rc::clone(ctor);
        }

        let name = call
            .ident
            .as_ref()
            .map(|i| i.original.clone())
            .unwrap_or_default();

        // Intrinsics take precedence over user functions of the same name.
        if let Some(intrinsic) = Intrinsic::parse(&name) {
            call.intrinsic = Some(intrinsic);
            return self.intrinsic_return_type(intrinsic, &arg_types, area);
        }

        if arg_types.iter().any(|ty| ty.is_void()) {
            // An argument already failed; skip overload resolution noise.
            return TypeDenoter::void();
        }

        let Some(candidate_ids) = self.overloads.get(&name).cloned() else {
            self.error(format!("undefined function '{}'", name), area);
            return TypeDenoter::void();
        };

        match self.resolve_overload(&name, &candidate_ids, &arg_types, area) {
            Some(id) => {
                call.func_ref = Some(id);
                Rc::clone(&self.functions[&id].return_ty)
            }
            None => TypeDenoter::void(),
        }
    }

    fn compute_and_set(&mut self, expr: &mut Expr) -> Rc<TypeDenoter> {
        let ty = self.compute_expr_type(expr);
        expr.ty = Some(Rc::clone(&ty));
        ty
    }

    /// Rank candidates by the cost of converting each argument. The
    /// minimal total cost wins; an exact tie is an ambiguity error.
    fn resolve_overload(
        &mut self,
        name: &str,
        candidates: &[NodeId],
        arg_types: &[Rc<TypeDenoter>],
        area: SourceArea,
    ) -> Option<NodeId> {
        let mut viable: Vec<(NodeId, u32)> = Vec::new();
        for id in candidates {
            let sig = &self.functions[id];
            let required = sig.params.iter().filter(|p| !p.has_default).count();
            if arg_types.len() < required || arg_types.len() > sig.params.len() {
                continue;
            }
            let mut total = 0u32;
            let mut ok = true;
            for (arg_ty, param) in arg_types.iter().zip(&sig.params) {
                match arg_ty.conversion_cost(&param.ty) {
                    Some(ConversionCost::Exact) => {}
                    Some(ConversionCost::Promotion) => total += 1,
                    Some(ConversionCost::Implicit) => total += 2,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                viable.push((*id, total));
            }
        }
        if viable.is_empty() {
            let args = arg_types
                .iter()
                .map(|ty| ty.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            self.error(
                format!("no matching overload of '{}' for arguments ({})", name, args),
                area,
            );
            return None;
        }
        let min_cost = viable.iter().map(|(_, cost)| *cost).min().expect("non-empty");
        let best: Vec<NodeId> = viable
            .iter()
            .filter(|(_, cost)| *cost == min_cost)
            .map(|(id, _)| *id)
            .collect();
        if best.len() > 1 {
            self.error(
                format!("ambiguous call to overloaded function '{}'", name),
                area,
            );
            return None;
        }
        Some(best[0])
    }

    fn intrinsic_return_type(
        &mut self,
        intrinsic: Intrinsic,
        args: &[Rc<TypeDenoter>],
        area: SourceArea,
    ) -> Rc<TypeDenoter> {
        use Intrinsic::*;
        let arg = |index: usize| -> Rc<TypeDenoter> {
            args.get(index)
                .map(|ty| ty.get_aliased())
                .unwrap_or_else(TypeDenoter::void)
        };
        let float4 = || TypeDenoter::base(DataType::Vector(ScalarType::Float, 4));
        match intrinsic {
            Dot => match arg(0).as_base() {
                Some(data_type) => TypeDenoter::scalar(data_type.scalar_type()),
                None => TypeDenoter::void(),
            },
            Length | Distance => TypeDenoter::scalar(ScalarType::Float),
            All | Any => TypeDenoter::scalar(ScalarType::Bool),
            Cross => TypeDenoter::base(DataType::Vector(ScalarType::Float, 3)),
            Transpose => match arg(0).as_base() {
                Some(DataType::Matrix(scalar, rows, cols)) => {
                    TypeDenoter::base(DataType::Matrix(scalar, cols, rows))
                }
                _ => {
                    self.error("'transpose' requires a matrix argument", area);
                    TypeDenoter::void()
                }
            },
            Mul => self.mul_return_type(&arg(0), &arg(1), area),
            Tex1D | Tex2D | Tex3D | TexCube | Sample | SampleLevel => float4(),
            Atan2 | Fmod | Max | Min | Pow | Step | Reflect => {
                TypeDenoter::common_type(&arg(0), &arg(1)).unwrap_or_else(|| arg(0))
            }
            Clamp | Lerp | SmoothStep => {
                let common = TypeDenoter::common_type(&arg(0), &arg(1))
                    .and_then(|lhs| TypeDenoter::common_type(&lhs, &arg(2)));
                common.unwrap_or_else(|| arg(0))
            }
            Refract => arg(0),
            _ => {
                // Componentwise intrinsics return their first argument type.
                let ty = arg(0);
                if ty.as_base().is_none() && !ty.is_void() {
                    self.error(
                        format!("invalid argument type '{}' for intrinsic", ty),
                        area,
                    );
                    return TypeDenoter::void();
                }
                ty
            }
        }
    }

    /// `mul` follows the HLSL linear algebra shapes; everything else in
    /// the language treats `*` componentwise.
    fn mul_return_type(
        &mut self,
        lhs: &Rc<TypeDenoter>,
        rhs: &Rc<TypeDenoter>,
        area: SourceArea,
    ) -> Rc<TypeDenoter> {
        let (Some(a), Some(b)) = (lhs.as_base(), rhs.as_base()) else {
            if !lhs.is_void() && !rhs.is_void() {
                self.error("'mul' requires numeric arguments", area);
            }
            return TypeDenoter::void();
        };
        let scalar = if a.scalar_type().rank() >= b.scalar_type().rank() {
            a.scalar_type()
        } else {
            b.scalar_type()
        };
        match (a, b) {
            (DataType::Matrix(_, rows, cols), DataType::Vector(_, n)) => {
                if cols != n {
                    self.error("matrix and vector dimensions do not match in 'mul'", area);
                }
                TypeDenoter::base(DataType::Vector(scalar, rows))
            }
            (DataType::Vector(_, n), DataType::Matrix(_, rows, cols)) => {
                if n != rows {
                    self.error("vector and matrix dimensions do not match in 'mul'", area);
                }
                TypeDenoter::base(DataType::Vector(scalar, cols))
            }
            (DataType::Matrix(_, ar, ac), DataType::Matrix(_, br, bc)) => {
                if ac != br {
                    self.error("matrix dimensions do not match in 'mul'", area);
                }
                TypeDenoter::base(DataType::Matrix(scalar, ar, bc))
            }
            (DataType::Scalar(_), other) | (other, DataType::Scalar(_)) => {
                TypeDenoter::base(other.with_scalar(scalar))
            }
            (DataType::Vector(_, n), DataType::Vector(_, m)) => {
                if n != m {
                    self.error("vector dimensions do not match in 'mul'", area);
                }
                TypeDenoter::base(DataType::Vector(scalar, n))
            }
        }
    }
}

/* ----- Free helpers ----- */

fn literal_type(literal: &Literal) -> Rc<TypeDenoter> {
    match literal.kind {
        LiteralKind::Bool => TypeDenoter::scalar(ScalarType::Bool),
        LiteralKind::Int => {
            if literal.is_unsigned() {
                TypeDenoter::scalar(ScalarType::UInt)
            } else {
                TypeDenoter::scalar(ScalarType::Int)
            }
        }
        LiteralKind::Float => {
            if literal.spell.ends_with(['h', 'H']) {
                TypeDenoter::scalar(ScalarType::Half)
            } else {
                TypeDenoter::scalar(ScalarType::Float)
            }
        }
        LiteralKind::String => TypeDenoter::void(),
    }
}

/// Vector swizzle like `.xyz` or `.rgba`; also legal on scalars.
fn swizzle_type(data_type: DataType, member: &str) -> Option<DataType> {
    let dim = match data_type {
        DataType::Scalar(_) => 1,
        DataType::Vector(_, n) => n,
        DataType::Matrix(..) => return None,
    };
    if member.is_empty() || member.len() > 4 {
        return None;
    }
    let index_of = |c: char| -> Option<u8> {
        match c {
            'x' | 'r' => Some(0),
            'y' | 'g' => Some(1),
            'z' | 'b' => Some(2),
            'w' | 'a' => Some(3),
            _ => None,
        }
    };
    for c in member.chars() {
        let index = index_of(c)?;
        if index >= dim {
            return None;
        }
    }
    let scalar = data_type.scalar_type();
    if member.len() == 1 {
        Some(DataType::Scalar(scalar))
    } else {
        Some(DataType::Vector(scalar, member.len() as u8))
    }
}

/// Whether every control path through the block hits a return.
pub fn block_returns(block: &CodeBlock) -> bool {
    stmts_return(&block.stmts)
}

fn stmts_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_returns)
}

fn stmt_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return(_) => true,
        Stmt::CodeBlock { block, .. } => block_returns(block),
        Stmt::If(if_stmt) => match &if_stmt.else_branch {
            Some(else_branch) => stmt_returns(&if_stmt.then_branch) && stmt_returns(else_branch),
            None => false,
        },
        Stmt::Switch(switch_stmt) => {
            let has_default = switch_stmt.cases.iter().any(|case| case.expr.is_none());
            has_default
                && switch_stmt
                    .cases
                    .iter()
                    .all(|case| stmts_return(&case.stmts))
        }
        _ => false,
    }
}

/// Set `flag` on the struct declaration with the given id, wherever it is
/// nested in the program.
pub fn mark_struct_flags(program: &mut Program, id: NodeId, flag: u32) {
    fn mark_in_stmt(stmt: &mut Stmt, id: NodeId, flag: u32) {
        match stmt {
            Stmt::StructDecl { decl, .. } => {
                if decl.id == id {
                    decl.flags.insert(flag);
                }
            }
            Stmt::VarDecls(var_stmt) => {
                if let Some(decl) = &mut var_stmt.type_spec.struct_decl {
                    if decl.id == id {
                        decl.flags.insert(flag);
                    }
                }
            }
            _ => {}
        }
    }
    for stmt in &mut program.global_stmts {
        mark_in_stmt(stmt, id, flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use crate::report::StdLog;

    fn analyze(source: &str, entry: &str, output: OutputShaderVersion) -> (Program, StdLog, bool) {
        let (tokens, lex_errors) = tokenize(source, false);
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        let mut parser = Parser::new(tokens, None);
        let mut program = parser.parse_program().expect("parse failed");
        let mut log = StdLog::new();
        let mangling = NameMangling::default();
        let ok = {
            let mut analyzer = Analyzer::new(Some(&mut log));
            let ctx = AnalyzerContext {
                entry_point: entry,
                secondary_entry_point: None,
                shader_target: ShaderTarget::FragmentShader,
                output_version: output,
                name_mangling: &mangling,
                warnings_enabled: true,
            };
            analyzer.decorate(&mut program, &ctx)
        };
        (program, log, ok)
    }

    fn analyze_ok(source: &str, entry: &str) -> Program {
        let (program, log, ok) = analyze(source, entry, OutputShaderVersion::GLSL450);
        assert!(ok, "analysis failed: {:?}", log.reports());
        program
    }

    fn analyze_err(source: &str, entry: &str) -> StdLog {
        let (_, log, ok) = analyze(source, entry, OutputShaderVersion::GLSL450);
        assert!(!ok, "analysis unexpectedly succeeded");
        log
    }

    #[test]
    fn test_entry_point_resolved_and_flagged() {
        let program = analyze_ok("float4 main() : SV_Target { return float4(1, 0, 0, 1); }", "main");
        assert!(program.entry_point.is_some());
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        assert!(decl.flags.contains(Flags::IS_ENTRY_POINT));
        assert_eq!(program.entry_io.outputs.len(), 1);
        assert_eq!(program.entry_io.outputs[0].semantic.name, "SV_Target");
    }

    #[test]
    fn test_entry_point_missing() {
        let log = analyze_err("float4 other() : SV_Target { return 1.0; }", "main");
        assert!(log.reports().iter().any(|r| r.message.contains("entry point")));
    }

    #[test]
    fn test_undefined_identifier() {
        let log = analyze_err("float f() { return unknown_var; }", "f");
        assert!(log.reports().iter().any(|r| r.message.contains("undefined identifier")));
    }

    #[test]
    fn test_overload_resolution_picks_exact() {
        let program = analyze_ok(
            "float f(float x) { return x; }\n\
             float f(int x) { return 1.0; }\n\
             float4 main() : SV_Target { return f(1).xxxx; }",
            "main",
        );
        let Stmt::FunctionDecl(second) = &program.global_stmts[1] else {
            panic!("expected function");
        };
        let Stmt::FunctionDecl(entry) = &program.global_stmts[2] else {
            panic!("expected function");
        };
        let Stmt::Return(ret) = &entry.body.as_ref().unwrap().stmts[0] else {
            panic!("expected return");
        };
        // f(1) picks the int overload exactly.
        let ExprKind::Object(swizzle) = &ret.expr.as_ref().unwrap().kind else {
            panic!("expected swizzle");
        };
        let ExprKind::Call(call) = &swizzle.prefix.as_ref().unwrap().kind else {
            panic!("expected call");
        };
        assert_eq!(call.func_ref, Some(second.id));
    }

    #[test]
    fn test_overload_ambiguity_reported() {
        let log = analyze_err(
            "float f(float x, int y) { return x; }\n\
             float f(int x, float y) { return y; }\n\
             float4 main() : SV_Target { return f(1, 1).xxxx; }",
            "main",
        );
        assert!(log.reports().iter().any(|r| r.message.contains("ambiguous")));
    }

    #[test]
    fn test_swizzle_types() {
        analyze_ok(
            "float4 main() : SV_Target { float4 c = float4(1, 2, 3, 4); float3 rgb = c.rgb; return rgb.xyzx; }",
            "main",
        );
        let log = analyze_err("float4 main() : SV_Target { float2 v = float2(1, 2); return v.z.xxxx; }", "main");
        assert!(log.reports().iter().any(|r| r.message.contains("swizzle")));
    }

    #[test]
    fn test_struct_member_resolution() {
        analyze_ok(
            "struct Light { float3 dir; float intensity; };\n\
             static Light g_light;\n\
             float4 main() : SV_Target { return (g_light.dir * g_light.intensity).xyzx; }",
            "main",
        );
    }

    #[test]
    fn test_unknown_struct_member() {
        let log = analyze_err(
            "struct S { float x; };\nstatic S s;\nfloat4 main() : SV_Target { return s.y.xxxx; }",
            "main",
        );
        assert!(log.reports().iter().any(|r| r.message.contains("no member")));
    }

    #[test]
    fn test_assignment_to_uniform_rejected() {
        let log = analyze_err(
            "float4 tint;\nfloat4 main() : SV_Target { tint = float4(1, 1, 1, 1); return tint; }",
            "main",
        );
        assert!(log.reports().iter().any(|r| r.message.contains("cannot assign to constant")));
    }

    #[test]
    fn test_static_on_parameter_rejected() {
        let log = analyze_err("float f(static float x) { return x; }", "f");
        assert!(log.reports().iter().any(|r| r.message.contains("static")));
    }

    #[test]
    fn test_missing_return_path_warns_and_flags() {
        let (program, log, ok) = analyze(
            "float f(float x : TEXCOORD0) : SV_Target { if (x > 0.0) { return x; } }",
            "f",
            OutputShaderVersion::GLSL450,
        );
        assert!(ok, "reports: {:?}", log.reports());
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        assert!(decl.flags.contains(Flags::HAS_NON_RETURN_PATH));
        assert!(log.reports().iter().any(|r| r.message.contains("control paths")));
    }

    #[test]
    fn test_double_rejected_for_essl() {
        let (_, log, ok) = analyze(
            "double g_value;\nfloat4 main() : SV_Target { return float4(1, 0, 0, 1); }",
            "main",
            OutputShaderVersion::ESSL310,
        );
        assert!(!ok);
        assert!(log.reports().iter().any(|r| r.message.contains("double")));
    }

    #[test]
    fn test_mul_shapes() {
        analyze_ok(
            "float4x4 world;\n\
             float4 main() : SV_Target { float4 p = float4(1, 2, 3, 1); return mul(world, p); }",
            "main",
        );
        let log = analyze_err(
            "float4x4 world;\n\
             float4 main() : SV_Target { float3 p = float3(1, 2, 3); return mul(world, p).xyzx; }",
            "main",
        );
        assert!(log.reports().iter().any(|r| r.message.contains("mul")));
    }

    #[test]
    fn test_numthreads_layout() {
        let (tokens, _) = tokenize("[numthreads(8, 4, 2)] void cs_main() { }", false);
        let mut parser = Parser::new(tokens, None);
        let mut program = parser.parse_program().unwrap();
        let mangling = NameMangling::default();
        let mut analyzer = Analyzer::new(None);
        let ctx = AnalyzerContext {
            entry_point: "cs_main",
            secondary_entry_point: None,
            shader_target: ShaderTarget::ComputeShader,
            output_version: OutputShaderVersion::GLSL450,
            name_mangling: &mangling,
            warnings_enabled: false,
        };
        assert!(analyzer.decorate(&mut program, &ctx));
        assert_eq!(program.compute_layout.num_threads, [8, 4, 2]);
    }

    #[test]
    fn test_entry_io_flattening_with_struct() {
        let program = analyze_ok(
            "struct VsIn { float4 position : POSITION; float2 uv : TEXCOORD0; };\n\
             float4 main(VsIn input_data) : SV_Target { return input_data.position; }",
            "main",
        );
        assert_eq!(program.entry_io.inputs.len(), 2);
        assert_eq!(program.entry_io.inputs[0].member.as_deref(), Some("position"));
        assert!(program.entry_io.inputs[0].name.starts_with("xsi_"));
        assert_eq!(program.entry_io.outputs.len(), 1);
    }

    #[test]
    fn test_cbuffer_members_visible() {
        analyze_ok(
            "cbuffer C { float4 tint_color; };\n\
             float4 main() : SV_Target { return tint_color; }",
            "main",
        );
    }

    #[test]
    fn test_semantic_errors_do_not_stop_collection() {
        let log = analyze_err(
            "float f() { return missing_a; }\nfloat g() { return missing_b; }",
            "f",
        );
        let count = log
            .reports()
            .iter()
            .filter(|r| r.message.contains("undefined identifier"))
            .count();
        assert_eq!(count, 2);
    }
}
