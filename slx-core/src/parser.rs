//! Recursive descent parser for the HLSL dialect.
//!
//! Works on the token stream the preprocessor produced. Shader specific
//! productions (registers, semantics, pack offsets, annotations) are tiny
//! trailing sub-grammars on declarations. Type casts are told apart from
//! bracketed expressions with one token of lookahead plus the set of type
//! names declared so far.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::lexer::tokenize;
use crate::report::{Log, ReportHandler};
use crate::source::SourceArea;
use crate::token::{Token, TokenKind};
use crate::type_denoter::{BufferKind, DataType, SamplerKind, ScalarType, TypeDenoter};
use log::trace;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone)]
enum TypeName {
    Struct(Option<NodeId>),
    Alias(Rc<TypeDenoter>, Option<NodeId>),
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    counter: NodeCounter,
    reports: ReportHandler<'a>,
    /// Type names declared so far, for cast and declaration disambiguation.
    type_names: HashMap<String, TypeName>,
    comments: Vec<(u32, String)>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, log: Option<&'a mut dyn Log>) -> Self {
        let mut comments = Vec::new();
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| {
                if t.kind == TokenKind::Comment {
                    comments.push((t.pos.line, t.spell.clone()));
                    false
                } else {
                    true
                }
            })
            .collect();
        Parser {
            tokens,
            current: 0,
            counter: NodeCounter::new(),
            reports: ReportHandler::new(log, "syntax"),
            type_names: HashMap::new(),
            comments,
        }
    }

    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.reports = self.reports.with_warnings(enabled);
        self
    }

    /// Parse a whole translation unit from source text.
    pub fn parse_source(source: &str, log: Option<&'a mut dyn Log>, keep_comments: bool) -> Option<Program> {
        let (tokens, lex_errors) = tokenize(source, keep_comments);
        let had_lex_errors = !lex_errors.is_empty();
        let mut parser = Parser::new(tokens, log);
        for err in &lex_errors {
            parser.reports.submit_error(err);
        }
        let program = parser.parse_program();
        if had_lex_errors {
            return None;
        }
        program
    }

    pub fn take_node_counter(&mut self) -> NodeCounter {
        std::mem::take(&mut self.counter)
    }

    /// Submit an upstream diagnostic (e.g. a lexer error) into this
    /// parser's report stream.
    pub fn submit_error(&mut self, err: &CompilerError) {
        self.reports.submit_error(err);
    }

    /// Parse the global statement list. Returns None if any syntax error
    /// was reported; a partial AST never leaves the parser.
    pub fn parse_program(&mut self) -> Option<Program> {
        let mut global_stmts = Vec::new();
        while !self.is_at_end() {
            match self.parse_global_stmt() {
                Ok(stmt) => global_stmts.push(stmt),
                Err(err) => {
                    self.reports.submit_error(&err);
                    self.synchronize();
                }
            }
        }
        if self.reports.has_errors() {
            return None;
        }
        Some(Program {
            global_stmts,
            comments: std::mem::take(&mut self.comments),
            ..Program::default()
        })
    }

    /* ----- Token cursor ----- */

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EndOfStream
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_spell(&self, kind: TokenKind, spell: &str) -> bool {
        let token = self.peek();
        token.kind == kind && token.spell == spell
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.peek();
            Err(CompilerError::SyntaxError(
                format!("expected {}, got '{}'", kind.describe(), token.spell),
                token.area(),
            ))
        }
    }

    /// Declaration and member names; primitive type keywords double as
    /// plain identifiers in HLSL.
    fn expect_ident(&mut self) -> Result<Ident> {
        let token = self.peek();
        if matches!(token.kind, TokenKind::Ident | TokenKind::PrimitiveType) {
            let token = self.advance();
            Ok(Ident::new(token.spell))
        } else {
            Err(CompilerError::SyntaxError(
                format!("expected identifier, got '{}'", token.spell),
                token.area(),
            ))
        }
    }

    fn area(&self) -> SourceArea {
        self.peek().area()
    }

    /// Skip to the next plausible declaration boundary after an error.
    fn synchronize(&mut self) {
        let mut brace_depth = 0usize;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semicolon if brace_depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => {
                    brace_depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    self.advance();
                    if brace_depth <= 1 {
                        self.accept(TokenKind::Semicolon);
                        return;
                    }
                    brace_depth -= 1;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /* ----- Global statements ----- */

    fn parse_global_stmt(&mut self) -> Result<Stmt> {
        trace!("parse_global_stmt: next token = '{}'", self.peek().spell);
        match self.peek().kind {
            TokenKind::Semicolon => {
                let area = self.area();
                self.advance();
                Ok(Stmt::Null { area })
            }
            TokenKind::Typedef => self.parse_alias_decl_stmt(),
            TokenKind::Struct => self.parse_stmt_with_struct_decl(),
            TokenKind::UniformBuffer => self.parse_uniform_buffer_decl(),
            TokenKind::Buffer => self.parse_buffer_decl_stmt(),
            TokenKind::Sampler | TokenKind::SamplerState => self.parse_sampler_decl_stmt(),
            TokenKind::LBracket => {
                let attributes = self.parse_attribute_list()?;
                self.parse_function_or_var_decl(attributes)
            }
            TokenKind::Unsupported => {
                let token = self.peek();
                Err(CompilerError::SyntaxError(
                    format!("keyword '{}' is not supported", token.spell),
                    token.area(),
                ))
            }
            TokenKind::Reserved => {
                let token = self.peek();
                Err(CompilerError::SyntaxError(
                    format!("keyword '{}' is reserved", token.spell),
                    token.area(),
                ))
            }
            _ => self.parse_function_or_var_decl(Vec::new()),
        }
    }

    /// Global statement that begins with a type specifier: either a
    /// function declaration or a list of global variables.
    fn parse_function_or_var_decl(&mut self, attributes: Vec<Attribute>) -> Result<Stmt> {
        let type_spec = self.parse_type_specifier(true)?;
        let ident = self.expect_ident()?;
        if self.check(TokenKind::LParen) {
            self.parse_function_decl(attributes, type_spec, ident)
        } else {
            if !attributes.is_empty() {
                self.reports.warning(
                    "attributes on variable declarations are ignored",
                    type_spec.area,
                );
            }
            let stmt = self.parse_var_decl_list(type_spec, ident)?;
            Ok(Stmt::VarDecls(stmt))
        }
    }

    fn parse_function_decl(
        &mut self,
        attributes: Vec<Attribute>,
        return_type: TypeSpecifier,
        ident: Ident,
    ) -> Result<Stmt> {
        trace!("parse_function_decl: '{}'", ident.original);
        let area = return_type.area;
        self.expect(TokenKind::LParen)?;
        let mut parameters = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                parameters.push(self.parse_parameter()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let mut semantic = None;
        if self.accept(TokenKind::Colon).is_some() {
            let token = self.advance();
            semantic = Some(Semantic::parse(&token.spell));
        }

        let body = if self.accept(TokenKind::Semicolon).is_some() {
            None
        } else {
            Some(self.parse_code_block()?)
        };

        Ok(Stmt::FunctionDecl(Box::new(FunctionDecl {
            id: self.counter.next_id(),
            area,
            flags: Flags::default(),
            attributes,
            return_type,
            ident,
            parameters,
            semantic,
            body,
        })))
    }

    // Parameter: type specifier, declarator, optional semantic + default.
    fn parse_parameter(&mut self) -> Result<VarDeclStmt> {
        let type_spec = self.parse_type_specifier(false)?;
        let area = type_spec.area;
        let ident = self.expect_ident()?;
        let var_decl = self.parse_var_decl(ident)?;
        Ok(VarDeclStmt {
            area,
            type_spec,
            var_decls: vec![var_decl],
        })
    }

    // 'struct' IDENT? (':' IDENT)? '{' members '}' declarators? ';'
    fn parse_stmt_with_struct_decl(&mut self) -> Result<Stmt> {
        let area = self.area();
        let decl = self.parse_struct_decl(true)?;
        if self.accept(TokenKind::Semicolon).is_some() {
            return Ok(Stmt::StructDecl { area, decl });
        }
        // Inline struct type with declarators.
        let struct_ty = Rc::new(TypeDenoter::Struct {
            ident: decl.ident.original.clone(),
            decl: Some(decl.id),
        });
        let mut type_spec = TypeSpecifier::plain(struct_ty, area);
        type_spec.struct_decl = Some(decl);
        let ident = self.expect_ident()?;
        let stmt = self.parse_var_decl_list(type_spec, ident)?;
        Ok(Stmt::VarDecls(stmt))
    }

    fn parse_struct_decl(&mut self, parse_struct_token: bool) -> Result<StructDecl> {
        if parse_struct_token {
            self.expect(TokenKind::Struct)?;
        }
        let area = self.area();
        let id = self.counter.next_id();
        let ident = if matches!(self.peek().kind, TokenKind::Ident | TokenKind::PrimitiveType) {
            self.expect_ident()?
        } else {
            // Anonymous structs get a generated name later.
            Ident::new(String::new())
        };
        if !ident.original.is_empty() {
            self.type_names
                .insert(ident.original.clone(), TypeName::Struct(Some(id)));
        }
        let base_name = if self.accept(TokenKind::Colon).is_some() {
            Some(self.expect_ident()?.original)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let type_spec = self.parse_type_specifier(false)?;
            let ident = self.expect_ident()?;
            let stmt = self.parse_var_decl_list(type_spec, ident)?;
            members.push(stmt);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(StructDecl {
            id,
            area,
            flags: Flags::default(),
            ident,
            base_name,
            members,
        })
    }

    // 'cbuffer'/'tbuffer' IDENT register* '{' members '}' ';'?
    fn parse_uniform_buffer_decl(&mut self) -> Result<Stmt> {
        let token = self.expect(TokenKind::UniformBuffer)?;
        let kind = if token.spell == "tbuffer" {
            UniformBufferKind::TBuffer
        } else {
            UniformBufferKind::CBuffer
        };
        let area = token.area();
        let ident = self.expect_ident()?;
        let registers = self.parse_register_list()?;
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let type_spec = self.parse_type_specifier(false)?;
            let member_ident = self.expect_ident()?;
            members.push(self.parse_var_decl_list(type_spec, member_ident)?);
        }
        self.expect(TokenKind::RBrace)?;
        self.accept(TokenKind::Semicolon);
        Ok(Stmt::UniformBufferDecl(Box::new(UniformBufferDecl {
            id: self.counter.next_id(),
            area,
            flags: Flags::default(),
            kind,
            ident,
            registers,
            members,
        })))
    }

    // BUFFER-TYPE generic? IDENT array? register* (',' ...)* ';'
    fn parse_buffer_decl_stmt(&mut self) -> Result<Stmt> {
        let token = self.expect(TokenKind::Buffer)?;
        let area = token.area();
        let kind = BufferKind::parse(&token.spell).ok_or_else(|| {
            CompilerError::InternalError(format!("unmapped buffer type '{}'", token.spell))
        })?;
        let generic = self.parse_generic_arg()?;
        let mut buffer_decls = Vec::new();
        loop {
            let ident = self.expect_ident()?;
            let decl_area = self.area();
            let array_dims = self.parse_array_dimension_list(true)?;
            let registers = self.parse_register_list()?;
            let annotations = self.parse_annotation_list()?;
            buffer_decls.push(BufferDecl {
                id: self.counter.next_id(),
                area: decl_area,
                flags: Flags::default(),
                ident,
                array_dims,
                registers,
                annotations,
            });
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::BufferDecls(BufferDeclStmt {
            area,
            kind,
            generic,
            buffer_decls,
        }))
    }

    // SAMPLER-TYPE IDENT array? register* ('{' states '}')? (',' ...)* ';'
    fn parse_sampler_decl_stmt(&mut self) -> Result<Stmt> {
        let token = self.advance();
        let area = token.area();
        let kind = SamplerKind::parse(&token.spell).ok_or_else(|| {
            CompilerError::InternalError(format!("unmapped sampler type '{}'", token.spell))
        })?;
        let mut sampler_decls = Vec::new();
        loop {
            let ident = self.expect_ident()?;
            let decl_area = self.area();
            let array_dims = self.parse_array_dimension_list(true)?;
            let registers = self.parse_register_list()?;
            let mut values = Vec::new();
            if self.accept(TokenKind::LBrace).is_some() {
                while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                    values.push(self.parse_sampler_value()?);
                }
                self.expect(TokenKind::RBrace)?;
            }
            sampler_decls.push(SamplerDecl {
                id: self.counter.next_id(),
                area: decl_area,
                flags: Flags::default(),
                ident,
                array_dims,
                registers,
                values,
            });
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::SamplerDecls(SamplerDeclStmt {
            area,
            kind,
            sampler_decls,
        }))
    }

    // IDENT '=' expr ';'
    fn parse_sampler_value(&mut self) -> Result<SamplerValue> {
        let area = self.area();
        let name = self.expect_ident()?.original;
        let token = self.expect(TokenKind::AssignOp)?;
        if token.spell != "=" {
            return Err(CompilerError::SyntaxError(
                format!("expected '=', got '{}'", token.spell),
                token.area(),
            ));
        }
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(SamplerValue { area, name, value })
    }

    // 'typedef' type-specifier IDENT array? (',' IDENT array?)* ';'
    fn parse_alias_decl_stmt(&mut self) -> Result<Stmt> {
        let token = self.expect(TokenKind::Typedef)?;
        let area = token.area();
        let type_spec = self.parse_type_specifier(false)?;
        let mut aliases = Vec::new();
        loop {
            let ident = self.expect_ident()?;
            let array_dims = self.parse_array_dimension_list(false)?;
            let ty = apply_array_dims(Rc::clone(&type_spec.ty), &array_dims);
            let id = self.counter.next_id();
            self.type_names.insert(
                ident.original.clone(),
                TypeName::Alias(Rc::clone(&ty), Some(id)),
            );
            aliases.push(AliasDecl {
                id,
                area,
                flags: Flags::default(),
                ident,
                ty,
            });
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::AliasDecls(AliasDeclStmt {
            area,
            type_spec,
            aliases,
        }))
    }

    /* ----- Types ----- */

    fn is_type_start(&self, offset: usize) -> bool {
        let token = self.peek_at(offset);
        match token.kind {
            TokenKind::ScalarType
            | TokenKind::VectorType
            | TokenKind::MatrixType
            | TokenKind::GenericVector
            | TokenKind::GenericMatrix
            | TokenKind::TypeModifier => true,
            TokenKind::Ident => self.type_names.contains_key(&token.spell),
            _ => false,
        }
    }

    fn parse_type_specifier(&mut self, allow_void: bool) -> Result<TypeSpecifier> {
        let area = self.area();
        let mut spec = TypeSpecifier::plain(TypeDenoter::void(), area);

        // Leading modifiers, in any order.
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::InputModifier => {
                    let token = self.advance();
                    let modifier = InputModifier::parse(&token.spell).expect("keyword class");
                    if spec.input_modifier.is_some() {
                        self.reports
                            .warning("duplicate input modifier", token.area());
                    }
                    spec.input_modifier = Some(modifier);
                }
                TokenKind::StorageClass => {
                    let token = self.advance();
                    spec.storage_classes
                        .push(StorageClass::parse(&token.spell).expect("keyword class"));
                }
                TokenKind::InterpModifier => {
                    // 'sample' is also a common identifier; treat it as a
                    // modifier only when more type tokens follow.
                    if self.peek().spell == "sample" && !self.is_type_start(1) {
                        break;
                    }
                    let token = self.advance();
                    spec.interp_modifiers
                        .push(InterpModifier::parse(&token.spell).expect("keyword class"));
                }
                TokenKind::TypeModifier => {
                    let token = self.advance();
                    spec.type_modifiers
                        .push(TypeModifier::parse(&token.spell).expect("keyword class"));
                }
                TokenKind::Inline => {
                    self.advance();
                }
                _ => break,
            }
        }

        let token = self.peek().clone();
        spec.ty = match token.kind {
            TokenKind::Void => {
                self.advance();
                if !allow_void {
                    return Err(CompilerError::SyntaxError(
                        "'void' is not allowed here".into(),
                        token.area(),
                    ));
                }
                TypeDenoter::void()
            }
            TokenKind::ScalarType | TokenKind::VectorType | TokenKind::MatrixType => {
                self.advance();
                let data_type = DataType::parse(&token.spell).ok_or_else(|| {
                    CompilerError::InternalError(format!("unmapped base type '{}'", token.spell))
                })?;
                TypeDenoter::base(data_type)
            }
            TokenKind::GenericVector => {
                self.advance();
                self.parse_generic_vector_type()?
            }
            TokenKind::GenericMatrix => {
                self.advance();
                self.parse_generic_matrix_type()?
            }
            TokenKind::Buffer => {
                self.advance();
                let kind = BufferKind::parse(&token.spell).ok_or_else(|| {
                    CompilerError::InternalError(format!("unmapped buffer type '{}'", token.spell))
                })?;
                let generic = self.parse_generic_arg()?;
                Rc::new(TypeDenoter::Buffer { kind, generic })
            }
            TokenKind::Sampler | TokenKind::SamplerState => {
                self.advance();
                let kind = SamplerKind::parse(&token.spell).ok_or_else(|| {
                    CompilerError::InternalError(format!("unmapped sampler type '{}'", token.spell))
                })?;
                Rc::new(TypeDenoter::Sampler { kind })
            }
            TokenKind::Struct => {
                let decl = self.parse_struct_decl(true)?;
                let ty = Rc::new(TypeDenoter::Struct {
                    ident: decl.ident.original.clone(),
                    decl: Some(decl.id),
                });
                spec.struct_decl = Some(decl);
                ty
            }
            TokenKind::Ident => match self.type_names.get(&token.spell).cloned() {
                Some(TypeName::Struct(decl)) => {
                    self.advance();
                    Rc::new(TypeDenoter::Struct {
                        ident: token.spell.clone(),
                        decl,
                    })
                }
                Some(TypeName::Alias(aliased, decl)) => {
                    self.advance();
                    Rc::new(TypeDenoter::Alias {
                        ident: token.spell.clone(),
                        decl,
                        aliased,
                    })
                }
                None => {
                    return Err(CompilerError::SyntaxError(
                        format!("unknown type name '{}'", token.spell),
                        token.area(),
                    ));
                }
            },
            _ => {
                return Err(CompilerError::SyntaxError(
                    format!("expected type specifier, got '{}'", token.spell),
                    token.area(),
                ));
            }
        };
        Ok(spec)
    }

    // 'vector' ('<' SCALAR ',' DIM '>')?
    fn parse_generic_vector_type(&mut self) -> Result<Rc<TypeDenoter>> {
        if !self.check_spell(TokenKind::BinaryOp, "<") {
            return Ok(TypeDenoter::base(DataType::Vector(ScalarType::Float, 4)));
        }
        self.advance();
        let scalar_token = self.expect(TokenKind::ScalarType)?;
        let scalar = ScalarType::parse(&scalar_token.spell).ok_or_else(|| {
            CompilerError::InternalError(format!("unmapped scalar type '{}'", scalar_token.spell))
        })?;
        self.expect(TokenKind::Comma)?;
        let dim = self.parse_small_dimension()?;
        self.expect_closing_angle()?;
        Ok(TypeDenoter::base(DataType::Vector(scalar, dim)))
    }

    // 'matrix' ('<' SCALAR ',' DIM ',' DIM '>')?
    fn parse_generic_matrix_type(&mut self) -> Result<Rc<TypeDenoter>> {
        if !self.check_spell(TokenKind::BinaryOp, "<") {
            return Ok(TypeDenoter::base(DataType::Matrix(ScalarType::Float, 4, 4)));
        }
        self.advance();
        let scalar_token = self.expect(TokenKind::ScalarType)?;
        let scalar = ScalarType::parse(&scalar_token.spell).ok_or_else(|| {
            CompilerError::InternalError(format!("unmapped scalar type '{}'", scalar_token.spell))
        })?;
        self.expect(TokenKind::Comma)?;
        let rows = self.parse_small_dimension()?;
        self.expect(TokenKind::Comma)?;
        let cols = self.parse_small_dimension()?;
        self.expect_closing_angle()?;
        Ok(TypeDenoter::base(DataType::Matrix(scalar, rows, cols)))
    }

    fn parse_small_dimension(&mut self) -> Result<u8> {
        let token = self.expect(TokenKind::IntLiteral)?;
        let value: u8 = token.spell.parse().map_err(|_| {
            CompilerError::SyntaxError(
                format!("invalid dimension '{}'", token.spell),
                token.area(),
            )
        })?;
        if (1..=4).contains(&value) {
            Ok(value)
        } else {
            Err(CompilerError::SyntaxError(
                format!("dimension must be in range [1, 4], got {}", value),
                token.area(),
            ))
        }
    }

    fn expect_closing_angle(&mut self) -> Result<()> {
        if self.check_spell(TokenKind::BinaryOp, ">") {
            self.advance();
            Ok(())
        } else {
            let token = self.peek();
            Err(CompilerError::SyntaxError(
                format!("expected '>', got '{}'", token.spell),
                token.area(),
            ))
        }
    }

    /// Generic argument in angle brackets; only legal directly after a
    /// buffer or sampler type keyword.
    fn parse_generic_arg(&mut self) -> Result<Option<Rc<TypeDenoter>>> {
        if !self.check_spell(TokenKind::BinaryOp, "<") {
            return Ok(None);
        }
        self.advance();
        let token = self.peek().clone();
        let ty = match token.kind {
            TokenKind::ScalarType | TokenKind::VectorType | TokenKind::MatrixType => {
                self.advance();
                let data_type = DataType::parse(&token.spell).ok_or_else(|| {
                    CompilerError::InternalError(format!("unmapped base type '{}'", token.spell))
                })?;
                TypeDenoter::base(data_type)
            }
            TokenKind::Ident if self.type_names.contains_key(&token.spell) => {
                self.advance();
                match self.type_names[&token.spell].clone() {
                    TypeName::Struct(decl) => Rc::new(TypeDenoter::Struct {
                        ident: token.spell.clone(),
                        decl,
                    }),
                    TypeName::Alias(aliased, decl) => Rc::new(TypeDenoter::Alias {
                        ident: token.spell.clone(),
                        decl,
                        aliased,
                    }),
                }
            }
            _ => {
                return Err(CompilerError::SyntaxError(
                    format!("expected generic type argument, got '{}'", token.spell),
                    token.area(),
                ));
            }
        };
        self.expect_closing_angle()?;
        Ok(Some(ty))
    }

    /* ----- Declaration decorators ----- */

    fn parse_array_dimension_list(&mut self, allow_dynamic: bool) -> Result<Vec<ArrayDimension>> {
        let mut dims = Vec::new();
        while self.check(TokenKind::LBracket) {
            let area = self.area();
            self.advance();
            if self.accept(TokenKind::RBracket).is_some() {
                if !allow_dynamic {
                    return Err(CompilerError::SyntaxError(
                        "array dimension must not be empty".into(),
                        area,
                    ));
                }
                dims.push(ArrayDimension {
                    area,
                    expr: None,
                    size: None,
                });
                continue;
            }
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            dims.push(ArrayDimension {
                area,
                expr: Some(Box::new(expr)),
                size: None,
            });
        }
        Ok(dims)
    }

    // 'register' '(' (PROFILE ',')? SLOT ')'
    fn parse_register(&mut self) -> Result<Register> {
        let token = self.expect(TokenKind::Register)?;
        let area = token.area();
        self.expect(TokenKind::LParen)?;
        let mut slot_token = self.advance();
        if self.accept(TokenKind::Comma).is_some() {
            // First entry was a shader profile; the slot follows.
            slot_token = self.advance();
        }
        self.expect(TokenKind::RParen)?;
        let spell = &slot_token.spell;
        let slot_kind = spell.chars().next().unwrap_or('\0');
        let slot: u32 = spell[slot_kind.len_utf8()..].parse().map_err(|_| {
            CompilerError::SyntaxError(
                format!("invalid register slot '{}'", spell),
                slot_token.area(),
            )
        })?;
        Ok(Register {
            area,
            slot_kind,
            slot,
        })
    }

    // 'packoffset' '(' REGISTER ('.' COMPONENT)? ')'
    fn parse_packoffset(&mut self) -> Result<PackOffset> {
        let token = self.expect(TokenKind::PackOffset)?;
        let area = token.area();
        self.expect(TokenKind::LParen)?;
        let register_name = self.expect_ident()?.original;
        let component = if self.accept(TokenKind::Dot).is_some() {
            let comp = self.expect_ident()?.original;
            comp.chars().next()
        } else {
            None
        };
        self.expect(TokenKind::RParen)?;
        Ok(PackOffset {
            area,
            register_name,
            component,
        })
    }

    fn parse_register_list(&mut self) -> Result<Vec<Register>> {
        let mut registers = Vec::new();
        while self.check(TokenKind::Colon) && self.peek_at(1).kind == TokenKind::Register {
            self.advance();
            registers.push(self.parse_register()?);
        }
        Ok(registers)
    }

    // '<' (type IDENT '=' expr ';')* '>'
    fn parse_annotation_list(&mut self) -> Result<Vec<VarDeclStmt>> {
        if !self.check_spell(TokenKind::BinaryOp, "<") {
            return Ok(Vec::new());
        }
        self.advance();
        let mut annotations = Vec::new();
        while !self.check_spell(TokenKind::BinaryOp, ">") && !self.is_at_end() {
            let type_spec = self.parse_type_specifier(false)?;
            let ident = self.expect_ident()?;
            let var_decl = self.parse_var_decl(ident)?;
            self.expect(TokenKind::Semicolon)?;
            annotations.push(VarDeclStmt {
                area: type_spec.area,
                type_spec,
                var_decls: vec![var_decl],
            });
        }
        self.expect_closing_angle()?;
        Ok(annotations)
    }

    // '[' IDENT ('(' args ')')? ']'
    fn parse_attribute_list(&mut self) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        while self.check(TokenKind::LBracket) {
            let area = self.area();
            self.advance();
            let ident = self.expect_ident()?.original;
            let mut args = Vec::new();
            if self.accept(TokenKind::LParen).is_some() {
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.accept(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            self.expect(TokenKind::RBracket)?;
            attributes.push(Attribute { area, ident, args });
        }
        Ok(attributes)
    }

    /* ----- Variable declarations ----- */

    /// Declarators after the type specifier; the first identifier has
    /// already been consumed.
    fn parse_var_decl_list(&mut self, type_spec: TypeSpecifier, first_ident: Ident) -> Result<VarDeclStmt> {
        let area = type_spec.area;
        let mut var_decls = vec![self.parse_var_decl(first_ident)?];
        while self.accept(TokenKind::Comma).is_some() {
            let ident = self.expect_ident()?;
            var_decls.push(self.parse_var_decl(ident)?);
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(VarDeclStmt {
            area,
            type_spec,
            var_decls,
        })
    }

    /// Declarator tail: array dimensions, semantics, registers, pack
    /// offsets, annotations and the initializer.
    fn parse_var_decl(&mut self, ident: Ident) -> Result<VarDecl> {
        let area = self.area();
        let array_dims = self.parse_array_dimension_list(true)?;
        let mut semantic = None;
        let mut packoffset = None;
        let mut registers = Vec::new();
        while self.check(TokenKind::Colon) {
            self.advance();
            match self.peek().kind {
                TokenKind::Register => registers.push(self.parse_register()?),
                TokenKind::PackOffset => packoffset = Some(self.parse_packoffset()?),
                _ => {
                    let token = self.advance();
                    semantic = Some(Semantic::parse(&token.spell));
                }
            }
        }
        let annotations = self.parse_annotation_list()?;
        let initializer = if let Some(token) = self.accept(TokenKind::AssignOp) {
            if token.spell != "=" {
                return Err(CompilerError::SyntaxError(
                    format!("expected '=', got '{}'", token.spell),
                    token.area(),
                ));
            }
            Some(self.parse_initializer()?)
        } else {
            None
        };
        Ok(VarDecl {
            id: self.counter.next_id(),
            area,
            flags: Flags::default(),
            ident,
            array_dims,
            semantic,
            packoffset,
            registers,
            annotations,
            initializer,
            ty: None,
        })
    }

    fn parse_initializer(&mut self) -> Result<Expr> {
        if self.check(TokenKind::LBrace) {
            let area = self.area();
            self.advance();
            let mut exprs = Vec::new();
            if !self.check(TokenKind::RBrace) {
                loop {
                    exprs.push(self.parse_initializer()?);
                    if self.accept(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RBrace)?;
            Ok(Expr::new(area, ExprKind::Initializer(exprs)))
        } else {
            self.parse_expr()
        }
    }

    /* ----- Statements ----- */

    fn parse_code_block(&mut self) -> Result<CodeBlock> {
        let area = self.area();
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.reports.submit_error(&err);
                    self.synchronize_stmt();
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(CodeBlock { area, stmts })
    }

    /// Statement level recovery: skip to just after the next ';' or stop
    /// in front of a closing brace.
    fn synchronize_stmt(&mut self) {
        let mut brace_depth = 0usize;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semicolon if brace_depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => {
                    brace_depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    if brace_depth == 0 {
                        return;
                    }
                    brace_depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        trace!("parse_stmt: next token = '{}'", self.peek().spell);
        let attributes = if self.check(TokenKind::LBracket) {
            self.parse_attribute_list()?
        } else {
            Vec::new()
        };
        match self.peek().kind {
            TokenKind::Semicolon => {
                let area = self.area();
                self.advance();
                Ok(Stmt::Null { area })
            }
            TokenKind::LBrace => {
                let area = self.area();
                let block = self.parse_code_block()?;
                Ok(Stmt::CodeBlock { area, block })
            }
            TokenKind::CtrlTransfer => {
                let token = self.advance();
                let transfer = CtrlTransfer::parse(&token.spell).expect("keyword class");
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::CtrlTransfer {
                    area: token.area(),
                    transfer,
                })
            }
            TokenKind::Return => {
                let token = self.advance();
                let expr = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Return(ReturnStmt {
                    area: token.area(),
                    expr,
                }))
            }
            TokenKind::If => self.parse_if_stmt(attributes),
            TokenKind::While => self.parse_while_stmt(attributes),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::For => self.parse_for_stmt(attributes),
            TokenKind::Switch => self.parse_switch_stmt(),
            TokenKind::Typedef => self.parse_alias_decl_stmt(),
            TokenKind::Struct => self.parse_stmt_with_struct_decl(),
            TokenKind::UniformBuffer => {
                let token = self.peek();
                Err(CompilerError::SyntaxError(
                    format!("'{}' is only allowed at global scope", token.spell),
                    token.area(),
                ))
            }
            TokenKind::ScalarType
            | TokenKind::VectorType
            | TokenKind::MatrixType
            | TokenKind::GenericVector
            | TokenKind::GenericMatrix
            | TokenKind::Buffer
            | TokenKind::Sampler
            | TokenKind::SamplerState
            | TokenKind::InputModifier
            | TokenKind::StorageClass
            | TokenKind::InterpModifier
            | TokenKind::TypeModifier => self.parse_var_decl_or_expr_stmt(),
            TokenKind::Ident if self.type_names.contains_key(&self.peek().spell) => {
                self.parse_var_decl_or_expr_stmt()
            }
            _ => self.parse_expr_stmt(),
        }
    }

    /// A statement that starts like a type. `float4 v = ...;` declares,
    /// `float4(...)` constructs; one token of lookahead after the type
    /// specifier settles it.
    fn parse_var_decl_or_expr_stmt(&mut self) -> Result<Stmt> {
        let saved = self.current;
        let type_spec = self.parse_type_specifier(false)?;
        if matches!(self.peek().kind, TokenKind::Ident | TokenKind::PrimitiveType) {
            let ident = self.expect_ident()?;
            let stmt = self.parse_var_decl_list(type_spec, ident)?;
            return Ok(Stmt::VarDecls(stmt));
        }
        // Not a declaration after all; reparse as expression statement.
        self.current = saved;
        self.parse_expr_stmt()
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let expr = self.parse_sequence_expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Expr(ExprStmt { area, expr }))
    }

    fn parse_if_stmt(&mut self, attributes: Vec<Attribute>) -> Result<Stmt> {
        let token = self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_sequence_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.accept(TokenKind::Else).is_some() {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If(Box::new(IfStmt {
            area: token.area(),
            attributes,
            condition,
            then_branch,
            else_branch,
        })))
    }

    fn parse_while_stmt(&mut self, attributes: Vec<Attribute>) -> Result<Stmt> {
        let token = self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_sequence_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::While(Box::new(WhileStmt {
            area: token.area(),
            attributes,
            condition,
            body,
        })))
    }

    fn parse_do_while_stmt(&mut self) -> Result<Stmt> {
        let token = self.expect(TokenKind::Do)?;
        let body = Box::new(self.parse_stmt()?);
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_sequence_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::DoWhile(Box::new(DoWhileStmt {
            area: token.area(),
            body,
            condition,
        })))
    }

    fn parse_for_stmt(&mut self, attributes: Vec<Attribute>) -> Result<Stmt> {
        let token = self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;
        let init = if self.accept(TokenKind::Semicolon).is_some() {
            None
        } else if self.is_type_start(0) {
            Some(Box::new(self.parse_var_decl_or_expr_stmt()?))
        } else {
            Some(Box::new(self.parse_expr_stmt()?))
        };
        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_sequence_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;
        let iteration = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_sequence_expr()?)
        };
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For(Box::new(ForStmt {
            area: token.area(),
            attributes,
            init,
            condition,
            iteration,
            body,
        })))
    }

    fn parse_switch_stmt(&mut self) -> Result<Stmt> {
        let token = self.expect(TokenKind::Switch)?;
        self.expect(TokenKind::LParen)?;
        let selector = self.parse_sequence_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let area = self.area();
            let expr = if self.accept(TokenKind::Case).is_some() {
                Some(self.parse_expr()?)
            } else {
                self.expect(TokenKind::Default)?;
                None
            };
            self.expect(TokenKind::Colon)?;
            let mut stmts = Vec::new();
            while !matches!(
                self.peek().kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::EndOfStream
            ) {
                stmts.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase { area, expr, stmts });
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Stmt::Switch(Box::new(SwitchStmt {
            area: token.area(),
            selector,
            cases,
        })))
    }

    /* ----- Expressions ----- */

    /// Comma separated sequence, e.g. in for-loop iterations.
    fn parse_sequence_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        let first = self.parse_expr()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.accept(TokenKind::Comma).is_some() {
            exprs.push(self.parse_expr()?);
        }
        Ok(Expr::new(area, ExprKind::Sequence(exprs)))
    }

    pub(crate) fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assignment_expr()
    }

    fn parse_assignment_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        let lhs = self.parse_ternary_expr()?;
        if self.check(TokenKind::AssignOp) {
            let token = self.advance();
            let op = AssignOp::parse(&token.spell).expect("assign operator class");
            let rhs = self.parse_assignment_expr()?;
            return Ok(Expr::new(
                area,
                ExprKind::Assign {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                },
            ));
        }
        Ok(lhs)
    }

    fn parse_ternary_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        let cond = self.parse_binary_expr(0)?;
        if self.accept(TokenKind::TernaryOp).is_none() {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.parse_assignment_expr()?;
        Ok(Expr::new(
            area,
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
        ))
    }

    fn binary_precedence(op: BinaryOp) -> u8 {
        match op {
            BinaryOp::LogicalOr => 1,
            BinaryOp::LogicalAnd => 2,
            BinaryOp::BitOr => 3,
            BinaryOp::BitXor => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::Equal | BinaryOp::NotEqual => 6,
            BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => 7,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 10,
        }
    }

    fn parse_binary_expr(&mut self, min_prec: u8) -> Result<Expr> {
        let area = self.area();
        let mut lhs = self.parse_unary_expr()?;
        while self.check(TokenKind::BinaryOp) {
            let Some(op) = BinaryOp::parse(&self.peek().spell) else {
                break;
            };
            let prec = Self::binary_precedence(op);
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary_expr(prec + 1)?;
            lhs = Expr::new(
                area,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let is_prefix = match token.kind {
            TokenKind::UnaryOp => true,
            TokenKind::BinaryOp => token.spell == "+" || token.spell == "-",
            _ => false,
        };
        if is_prefix {
            self.advance();
            let op = UnaryOp::parse(&token.spell).expect("unary operator spelling");
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::new(
                token.area(),
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ));
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let ident = self.expect_ident()?;
                    if self.check(TokenKind::LParen) {
                        // Member function call, e.g. texture.Sample(...).
                        let args = self.parse_argument_list()?;
                        let area = expr.area;
                        expr = Expr::new(
                            area,
                            ExprKind::Call(CallExpr {
                                prefix: Some(Box::new(expr)),
                                ident: Some(ident),
                                type_ctor: None,
                                args,
                                func_ref: None,
                                intrinsic: None,
                            }),
                        );
                    } else {
                        let area = expr.area;
                        expr = Expr::new(
                            area,
                            ExprKind::Object(ObjectExpr {
                                prefix: Some(Box::new(expr)),
                                ident,
                                symbol_ref: None,
                            }),
                        );
                    }
                }
                TokenKind::LBracket => {
                    let mut indices = Vec::new();
                    while self.check(TokenKind::LBracket) {
                        self.advance();
                        indices.push(self.parse_sequence_expr()?);
                        self.expect(TokenKind::RBracket)?;
                    }
                    let area = expr.area;
                    expr = Expr::new(
                        area,
                        ExprKind::Array {
                            prefix: Box::new(expr),
                            indices,
                        },
                    );
                }
                TokenKind::UnaryOp if matches!(self.peek().spell.as_str(), "++" | "--") => {
                    let token = self.advance();
                    let op = UnaryOp::parse(&token.spell).expect("unary operator spelling");
                    let area = expr.area;
                    expr = Expr::new(
                        area,
                        ExprKind::PostUnary {
                            op,
                            operand: Box::new(expr),
                        },
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::BoolLiteral => {
                self.advance();
                Ok(Expr::new(
                    token.area(),
                    ExprKind::Literal(Literal {
                        kind: LiteralKind::Bool,
                        spell: token.spell,
                    }),
                ))
            }
            TokenKind::IntLiteral => {
                self.advance();
                Ok(Expr::new(
                    token.area(),
                    ExprKind::Literal(Literal {
                        kind: LiteralKind::Int,
                        spell: token.spell,
                    }),
                ))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                Ok(Expr::new(
                    token.area(),
                    ExprKind::Literal(Literal {
                        kind: LiteralKind::Float,
                        spell: token.spell,
                    }),
                ))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expr::new(
                    token.area(),
                    ExprKind::Literal(Literal {
                        kind: LiteralKind::String,
                        spell: token.spell,
                    }),
                ))
            }
            TokenKind::LParen => self.parse_bracket_or_cast_expr(),
            TokenKind::ScalarType
            | TokenKind::VectorType
            | TokenKind::MatrixType
            | TokenKind::GenericVector
            | TokenKind::GenericMatrix => self.parse_type_ctor_call(),
            TokenKind::Ident | TokenKind::PrimitiveType | TokenKind::InterpModifier => {
                self.advance();
                let area = token.area();
                let ident = Ident::new(token.spell);
                if self.check(TokenKind::LParen) {
                    let args = self.parse_argument_list()?;
                    Ok(Expr::new(
                        area,
                        ExprKind::Call(CallExpr {
                            prefix: None,
                            ident: Some(ident),
                            type_ctor: None,
                            args,
                            func_ref: None,
                            intrinsic: None,
                        }),
                    ))
                } else {
                    Ok(Expr::new(
                        area,
                        ExprKind::Object(ObjectExpr {
                            prefix: None,
                            ident,
                            symbol_ref: None,
                        }),
                    ))
                }
            }
            _ => Err(CompilerError::SyntaxError(
                format!("expected expression, got '{}'", token.spell),
                token.area(),
            )),
        }
    }

    // TYPE '(' args ')', e.g. 'float4(0, 0, 0, 1)'.
    fn parse_type_ctor_call(&mut self) -> Result<Expr> {
        let area = self.area();
        let type_spec = self.parse_type_specifier(false)?;
        let args = self.parse_argument_list()?;
        Ok(Expr::new(
            area,
            ExprKind::Call(CallExpr {
                prefix: None,
                ident: None,
                type_ctor: Some(type_spec.ty),
                args,
                func_ref: None,
                intrinsic: None,
            }),
        ))
    }

    /// '(' starts either a cast or a bracketed expression. Try the cast
    /// only when the next token can begin a type; fall back on failure.
    fn parse_bracket_or_cast_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        let saved = self.current;
        self.expect(TokenKind::LParen)?;

        if self.is_type_start(0) {
            if let Ok(type_spec) = self.parse_type_specifier(false) {
                if self.check(TokenKind::RParen) {
                    // A cast only if an operand follows the ')'.
                    let next = self.peek_at(1);
                    let operand_follows = matches!(
                        next.kind,
                        TokenKind::Ident
                            | TokenKind::PrimitiveType
                            | TokenKind::BoolLiteral
                            | TokenKind::IntLiteral
                            | TokenKind::FloatLiteral
                            | TokenKind::StringLiteral
                            | TokenKind::LParen
                            | TokenKind::UnaryOp
                            | TokenKind::ScalarType
                            | TokenKind::VectorType
                            | TokenKind::MatrixType
                    ) || (next.kind == TokenKind::BinaryOp && matches!(next.spell.as_str(), "+" | "-"));
                    if operand_follows {
                        self.advance();
                        let operand = self.parse_unary_expr()?;
                        return Ok(Expr::new(
                            area,
                            ExprKind::Cast {
                                type_spec: Box::new(type_spec),
                                operand: Box::new(operand),
                            },
                        ));
                    }
                }
            }
            self.current = saved;
            self.expect(TokenKind::LParen)?;
        }

        let inner = self.parse_sequence_expr()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(area, ExprKind::Bracket(Box::new(inner))))
    }
}

fn apply_array_dims(base: Rc<TypeDenoter>, dims: &[ArrayDimension]) -> Rc<TypeDenoter> {
    if dims.is_empty() {
        return base;
    }
    Rc::new(TypeDenoter::Array {
        base,
        dimensions: dims.iter().map(|d| d.size).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        let (tokens, lex_errors) = tokenize(source, false);
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        let mut parser = Parser::new(tokens, None);
        parser.parse_program().expect("parse failed")
    }

    fn parse_fails(source: &str) -> bool {
        let (tokens, _) = tokenize(source, false);
        let mut parser = Parser::new(tokens, None);
        parser.parse_program().is_none()
    }

    #[test]
    fn test_parse_simple_function() {
        let program = parse("float4 main() : SV_Target { return float4(1, 0, 0, 1); }");
        assert_eq!(program.global_stmts.len(), 1);
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function decl");
        };
        assert_eq!(decl.ident.original, "main");
        assert_eq!(decl.semantic.as_ref().unwrap().name, "SV_Target");
        assert_eq!(decl.body.as_ref().unwrap().stmts.len(), 1);
    }

    #[test]
    fn test_parse_function_with_parameters() {
        let program = parse("float f(float a, int b) { return a; }");
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function decl");
        };
        assert_eq!(decl.parameters.len(), 2);
        assert_eq!(decl.parameters[1].var_decls[0].ident.original, "b");
    }

    #[test]
    fn test_parse_struct_and_use_as_type() {
        let program = parse(
            "struct VertexIn { float4 position : POSITION; float2 uv : TEXCOORD0; };\n\
             VertexIn global_vertex;",
        );
        assert_eq!(program.global_stmts.len(), 2);
        let Stmt::StructDecl { decl, .. } = &program.global_stmts[0] else {
            panic!("expected struct decl");
        };
        assert_eq!(decl.members.len(), 2);
        let Stmt::VarDecls(stmt) = &program.global_stmts[1] else {
            panic!("expected var decl");
        };
        assert!(stmt.type_spec.ty.is_struct());
    }

    #[test]
    fn test_parse_cbuffer() {
        let program = parse("cbuffer Scene : register(b0) { float4x4 world; float4 tint; };");
        let Stmt::UniformBufferDecl(decl) = &program.global_stmts[0] else {
            panic!("expected cbuffer");
        };
        assert_eq!(decl.ident.original, "Scene");
        assert_eq!(decl.registers[0].slot_kind, 'b');
        assert_eq!(decl.members.len(), 2);
    }

    #[test]
    fn test_parse_texture_and_sampler() {
        let program = parse(
            "Texture2D<float4> albedo : register(t0);\nSamplerState linear_sampler : register(s0);",
        );
        let Stmt::BufferDecls(stmt) = &program.global_stmts[0] else {
            panic!("expected buffer decl");
        };
        assert_eq!(stmt.kind, BufferKind::Texture2D);
        assert!(stmt.generic.is_some());
        let Stmt::SamplerDecls(stmt) = &program.global_stmts[1] else {
            panic!("expected sampler decl");
        };
        assert_eq!(stmt.sampler_decls[0].registers[0].slot_kind, 's');
    }

    #[test]
    fn test_parse_typedef() {
        let program = parse("typedef float4 Color;\nColor tint;");
        let Stmt::AliasDecls(stmt) = &program.global_stmts[0] else {
            panic!("expected typedef");
        };
        assert_eq!(stmt.aliases[0].ident.original, "Color");
        let Stmt::VarDecls(var_stmt) = &program.global_stmts[1] else {
            panic!("expected var decl");
        };
        assert!(var_stmt.type_spec.ty.is_vector());
    }

    #[test]
    fn test_cast_vs_bracket_disambiguation() {
        let program = parse("float f() { float x = (float)1; float y = (x); return x + y; }");
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        let stmts = &decl.body.as_ref().unwrap().stmts;
        let Stmt::VarDecls(first) = &stmts[0] else {
            panic!("expected var decl");
        };
        assert!(matches!(
            first.var_decls[0].initializer.as_ref().unwrap().kind,
            ExprKind::Cast { .. }
        ));
        let Stmt::VarDecls(second) = &stmts[1] else {
            panic!("expected var decl");
        };
        assert!(matches!(
            second.var_decls[0].initializer.as_ref().unwrap().kind,
            ExprKind::Bracket(_)
        ));
    }

    #[test]
    fn test_cast_to_user_struct() {
        let program = parse("struct S { float x; };\nfloat f(S s) { return ((S)s).x; }");
        assert_eq!(program.global_stmts.len(), 2);
    }

    #[test]
    fn test_operator_precedence() {
        let program = parse("int f() { return 1 + 2 * 3; }");
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        let Stmt::Return(ret) = &decl.body.as_ref().unwrap().stmts[0] else {
            panic!("expected return");
        };
        let ExprKind::Binary { op, rhs, .. } = &ret.expr.as_ref().unwrap().kind else {
            panic!("expected binary expr");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_control_flow() {
        let program = parse(
            "void f() {\n\
               for (int i = 0; i < 4; ++i) { }\n\
               while (true) { break; }\n\
               do { } while (false);\n\
               if (1 < 2) { } else { }\n\
               switch (1) { case 1: break; default: break; }\n\
             }",
        );
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(decl.body.as_ref().unwrap().stmts.len(), 5);
    }

    #[test]
    fn test_parse_member_access_and_method_call() {
        let program = parse("float4 f() { return albedo.Sample(samp, uv).rgba; }");
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        let Stmt::Return(ret) = &decl.body.as_ref().unwrap().stmts[0] else {
            panic!("expected return");
        };
        let ExprKind::Object(object) = &ret.expr.as_ref().unwrap().kind else {
            panic!("expected member access");
        };
        assert_eq!(object.ident.original, "rgba");
        assert!(matches!(
            object.prefix.as_ref().unwrap().kind,
            ExprKind::Call(_)
        ));
    }

    #[test]
    fn test_parse_numthreads_attribute() {
        let program = parse("[numthreads(8, 8, 1)] void cs_main() { }");
        let Stmt::FunctionDecl(decl) = &program.global_stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(decl.attributes[0].ident, "numthreads");
        assert_eq!(decl.attributes[0].args.len(), 3);
    }

    #[test]
    fn test_parse_array_and_initializer() {
        let program = parse("static const float weights[3] = { 0.25f, 0.5f, 0.25f };");
        let Stmt::VarDecls(stmt) = &program.global_stmts[0] else {
            panic!("expected var decl");
        };
        let decl = &stmt.var_decls[0];
        assert_eq!(decl.array_dims.len(), 1);
        assert!(matches!(
            decl.initializer.as_ref().unwrap().kind,
            ExprKind::Initializer(_)
        ));
    }

    #[test]
    fn test_parse_overloads_kept_separate() {
        let program = parse("float f(float x) { return x; }\nfloat f(int x) { return 1.0; }");
        assert_eq!(program.global_stmts.len(), 2);
    }

    #[test]
    fn test_syntax_error_recovers_and_reports() {
        assert!(parse_fails("float4 main( { return 0; }\nfloat g() { return 1.0; }"));
    }

    #[test]
    fn test_no_partial_ast_after_error() {
        let (tokens, _) = tokenize("void f() { int x = ; }", false);
        let mut parser = Parser::new(tokens, None);
        assert!(parser.parse_program().is_none());
    }

    #[test]
    fn test_packoffset_and_register_decorators() {
        let program = parse("cbuffer C { float4 v : packoffset(c0); };\nTexture2D t : register(t3);");
        let Stmt::UniformBufferDecl(decl) = &program.global_stmts[0] else {
            panic!("expected cbuffer");
        };
        assert!(decl.members[0].var_decls[0].packoffset.is_some());
        let Stmt::BufferDecls(stmt) = &program.global_stmts[1] else {
            panic!("expected texture");
        };
        assert_eq!(stmt.buffer_decls[0].registers[0].slot, 3);
    }
}
