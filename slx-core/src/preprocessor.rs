//! C-style preprocessor over the raw token stream.
//!
//! Two nested loops: the directive loop walks logical lines, the macro
//! expansion loop walks tokens of content regions. Macro rescanning works
//! on token vectors; the macro currently being expanded is hidden from
//! its own rescan, so self-recursive macros expand exactly once.

use crate::error::{CompilerError, Result};
use crate::include_handler::IncludeHandler;
use crate::lexer::{scan_all, Scanner};
use crate::report::{Log, ReportHandler};
use crate::source::{SourceArea, SourceCode};
use crate::token::{Token, TokenKind};
use std::collections::{BTreeSet, HashMap, HashSet};

const MAX_INCLUDE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
struct Macro {
    /// None for object-like macros.
    params: Option<Vec<String>>,
    variadic: bool,
    body: Vec<Token>,
}

/// One entry per open `#if`-family directive.
#[derive(Debug, Clone)]
struct Conditional {
    parent_active: bool,
    /// A branch of this conditional has been taken.
    satisfied: bool,
    /// The current branch is emitting.
    active: bool,
    has_else: bool,
}

struct FileContext {
    filename: String,
    /// `#line` adjustment: logical line = physical line + offset.
    line_offset: i64,
}

impl FileContext {
    fn logical_line(&self, physical: u32) -> i64 {
        physical as i64 + self.line_offset
    }
}

pub struct Preprocessor<'a, 'b> {
    include_handler: &'a mut dyn IncludeHandler,
    reports: ReportHandler<'b>,
    macros: HashMap<String, Macro>,
    macros_ever: BTreeSet<String>,
    once_included: HashSet<String>,
    include_depth: usize,
    output: String,
}

impl<'a, 'b> Preprocessor<'a, 'b> {
    pub fn new(include_handler: &'a mut dyn IncludeHandler, log: Option<&'b mut dyn Log>) -> Self {
        Preprocessor {
            include_handler,
            reports: ReportHandler::new(log, "preprocessor"),
            macros: HashMap::new(),
            macros_ever: BTreeSet::new(),
            once_included: HashSet::new(),
            include_depth: 0,
            output: String::new(),
        }
    }

    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.reports = self.reports.with_warnings(enabled);
        self
    }

    /// Run the directive loop over `source`. Returns the preprocessed
    /// character stream, or None after reporting a fatal error.
    pub fn process(&mut self, source: &SourceCode) -> Option<String> {
        let result = self.process_file(source.text(), source.filename());
        match result {
            Ok(()) if !self.reports.has_errors() => Some(std::mem::take(&mut self.output)),
            Ok(()) => None,
            Err(err) => {
                self.reports.submit_error(&err);
                None
            }
        }
    }

    /// Idents of all macros that were ever defined during preprocessing.
    pub fn list_defined_macro_idents(&self) -> Vec<String> {
        self.macros_ever.iter().cloned().collect()
    }

    /// Predefine an object-like macro, e.g. from a `-D` command line flag.
    pub fn define_macro(&mut self, name: &str, value: &str) {
        let (mut tokens, _) = scan_all(value);
        tokens.retain(|t| !matches!(t.kind, TokenKind::NewLine | TokenKind::EndOfStream));
        self.macros_ever.insert(name.to_string());
        self.macros.insert(
            name.to_string(),
            Macro {
                params: None,
                variadic: false,
                body: tokens,
            },
        );
    }

    fn process_file(&mut self, text: &str, filename: &str) -> Result<()> {
        let (tokens, lex_errors) = scan_all(text);
        for err in lex_errors {
            self.reports.submit_error(&err);
        }

        let mut ctx = FileContext {
            filename: filename.to_string(),
            line_offset: 0,
        };
        let mut conditionals: Vec<Conditional> = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            // First significant token of the line decides its shape.
            let mut j = i;
            while matches!(tokens[j].kind, TokenKind::WhiteSpace) {
                j += 1;
            }
            match tokens[j].kind {
                TokenKind::EndOfStream => break,
                TokenKind::NewLine => {
                    if Self::region_active(&conditionals) {
                        for token in &tokens[i..=j] {
                            self.output.push_str(&token.spell);
                        }
                    }
                    i = j + 1;
                }
                TokenKind::Directive => {
                    let (line, next) = collect_directive_line(&tokens, j + 1);
                    self.handle_directive(&tokens[j], &line, &mut conditionals, &mut ctx)?;
                    i = next;
                }
                _ => {
                    if Self::region_active(&conditionals) {
                        let end = find_content_chunk_end(&tokens, i);
                        let expanded = self.expand_tokens(&tokens[i..end], &mut Vec::new(), &ctx)?;
                        for token in &expanded {
                            self.output.push_str(&token.spell);
                        }
                        i = end;
                    } else {
                        while !matches!(tokens[i].kind, TokenKind::NewLine | TokenKind::EndOfStream) {
                            i += 1;
                        }
                        if tokens[i].kind == TokenKind::NewLine {
                            i += 1;
                        }
                    }
                }
            }
        }

        if !conditionals.is_empty() {
            return Err(CompilerError::PreprocessError(
                format!("missing '#endif' at end of '{}'", ctx.filename),
                SourceArea::ZERO,
            ));
        }
        Ok(())
    }

    fn region_active(conditionals: &[Conditional]) -> bool {
        conditionals.iter().all(|c| c.active)
    }

    fn handle_directive(
        &mut self,
        directive: &Token,
        line: &[Token],
        conditionals: &mut Vec<Conditional>,
        ctx: &mut FileContext,
    ) -> Result<()> {
        let name = directive.spell.as_str();
        let active = Self::region_active(conditionals);

        // Inside a skipped region only the conditional structure matters;
        // other directives are ignored without any validation.
        match name {
            "if" | "ifdef" | "ifndef" => {
                let value = if active {
                    match name {
                        "if" => self.eval_condition(line, ctx)?,
                        "ifdef" => self.macro_defined_in_line(line, directive)?,
                        _ => !self.macro_defined_in_line(line, directive)?,
                    }
                } else {
                    false
                };
                conditionals.push(Conditional {
                    parent_active: active,
                    satisfied: !active || value,
                    active: active && value,
                    has_else: false,
                });
                Ok(())
            }
            "elif" => {
                let Some(top) = conditionals.last_mut() else {
                    return Err(CompilerError::PreprocessError(
                        "'#elif' without '#if'".into(),
                        directive.area(),
                    ));
                };
                if top.has_else && top.parent_active {
                    return Err(CompilerError::PreprocessError(
                        "'#elif' after '#else'".into(),
                        directive.area(),
                    ));
                }
                if !top.parent_active || top.satisfied {
                    // Branch selection is settled; no evaluation, no errors.
                    conditionals.last_mut().expect("just checked").active = false;
                    return Ok(());
                }
                let value = self.eval_condition(line, ctx)?;
                let top = conditionals.last_mut().expect("just checked");
                top.active = value;
                top.satisfied = value;
                Ok(())
            }
            "else" => {
                let Some(top) = conditionals.last_mut() else {
                    return Err(CompilerError::PreprocessError(
                        "'#else' without '#if'".into(),
                        directive.area(),
                    ));
                };
                if top.has_else && top.parent_active {
                    return Err(CompilerError::PreprocessError(
                        "duplicate '#else'".into(),
                        directive.area(),
                    ));
                }
                top.has_else = true;
                top.active = top.parent_active && !top.satisfied;
                top.satisfied = true;
                Ok(())
            }
            "endif" => {
                if conditionals.pop().is_none() {
                    return Err(CompilerError::PreprocessError(
                        "'#endif' without '#if'".into(),
                        directive.area(),
                    ));
                }
                Ok(())
            }
            _ if !active => Ok(()),
            "define" => self.parse_define(line, directive),
            "undef" => self.parse_undef(line, directive),
            "include" => self.parse_include(line, directive),
            "pragma" => self.parse_pragma(line, directive, ctx),
            "line" => self.parse_line_directive(line, directive, ctx),
            "error" => Err(CompilerError::PreprocessError(
                format!("#error: {}", spell_line(line).trim()),
                directive.area(),
            )),
            "warning" => {
                let message = format!("#warning: {}", spell_line(line).trim());
                self.reports.warning(message, directive.area());
                Ok(())
            }
            unknown => Err(CompilerError::PreprocessError(
                format!("unknown preprocessor directive '#{}'", unknown),
                directive.area(),
            )),
        }
    }

    fn macro_defined_in_line(&self, line: &[Token], directive: &Token) -> Result<bool> {
        let name = significant(line)
            .next()
            .filter(|t| t.kind == TokenKind::Ident || t.spell.chars().all(|c| c.is_alphanumeric() || c == '_'))
            .ok_or_else(|| {
                CompilerError::PreprocessError(
                    format!("expected macro name after '#{}'", directive.spell),
                    directive.area(),
                )
            })?;
        Ok(self.macros.contains_key(&name.spell))
    }

    // '#' 'define' IDENT ( '(' IDENT-LIST? ')' )? TOKEN-STRING?
    fn parse_define(&mut self, line: &[Token], directive: &Token) -> Result<()> {
        let mut i = 0;
        while i < line.len() && line[i].kind == TokenKind::WhiteSpace {
            i += 1;
        }
        if i >= line.len() || !is_macro_name(&line[i]) {
            return Err(CompilerError::PreprocessError(
                "expected macro name after '#define'".into(),
                directive.area(),
            ));
        }
        let name_token = line[i].clone();
        let name = name_token.spell.clone();
        i += 1;

        // A parameter list only counts when the '(' follows with no space.
        let mut params = None;
        let mut variadic = false;
        if i < line.len() && line[i].kind == TokenKind::LParen {
            i += 1;
            let mut names = Vec::new();
            loop {
                while i < line.len() && line[i].kind == TokenKind::WhiteSpace {
                    i += 1;
                }
                match line.get(i).map(|t| t.kind) {
                    Some(TokenKind::RParen) => {
                        i += 1;
                        break;
                    }
                    Some(TokenKind::VarArg) => {
                        variadic = true;
                        i += 1;
                    }
                    Some(_) if is_macro_name(&line[i]) => {
                        names.push(line[i].spell.clone());
                        i += 1;
                    }
                    _ => {
                        return Err(CompilerError::PreprocessError(
                            format!("malformed parameter list of macro '{}'", name),
                            name_token.area(),
                        ));
                    }
                }
                while i < line.len() && line[i].kind == TokenKind::WhiteSpace {
                    i += 1;
                }
                match line.get(i).map(|t| t.kind) {
                    Some(TokenKind::Comma) => i += 1,
                    Some(TokenKind::RParen) => {
                        i += 1;
                        break;
                    }
                    _ => {
                        return Err(CompilerError::PreprocessError(
                            format!("malformed parameter list of macro '{}'", name),
                            name_token.area(),
                        ));
                    }
                }
            }
            params = Some(names);
        }

        // Body: rest of the line with comments dropped and edges trimmed.
        let mut body: Vec<Token> = line[i..].to_vec();
        body.retain(|t| t.kind != TokenKind::Comment);
        while body.first().is_some_and(|t| t.kind == TokenKind::WhiteSpace) {
            body.remove(0);
        }
        while body.last().is_some_and(|t| t.kind == TokenKind::WhiteSpace) {
            body.pop();
        }

        let new_macro = Macro {
            params,
            variadic,
            body,
        };
        if let Some(previous) = self.macros.get(&name) {
            if !macro_bodies_equal(previous, &new_macro) {
                self.reports.warning(
                    format!("redefinition of macro '{}'", name),
                    name_token.area(),
                );
            }
        }
        self.macros_ever.insert(name.clone());
        self.macros.insert(name, new_macro);
        Ok(())
    }

    fn parse_undef(&mut self, line: &[Token], directive: &Token) -> Result<()> {
        let name = significant(line).next().filter(|t| is_macro_name(t)).ok_or_else(|| {
            CompilerError::PreprocessError(
                "expected macro name after '#undef'".into(),
                directive.area(),
            )
        })?;
        if self.macros.remove(&name.spell).is_none() {
            self.reports.warning(
                format!("cannot undefine unknown macro '{}'", name.spell),
                name.area(),
            );
        }
        Ok(())
    }

    // '#' 'include' ('"' PATH '"' | '<' PATH '>')
    fn parse_include(&mut self, line: &[Token], directive: &Token) -> Result<()> {
        let tokens: Vec<&Token> = significant(line).collect();
        let (path, is_system) = match tokens.first() {
            Some(t) if t.kind == TokenKind::StringLiteral => {
                (t.spell_content().to_string(), false)
            }
            Some(t) if t.kind == TokenKind::BinaryOp && t.spell == "<" => {
                let mut path = String::new();
                let mut closed = false;
                for t in &tokens[1..] {
                    if t.kind == TokenKind::BinaryOp && t.spell == ">" {
                        closed = true;
                        break;
                    }
                    path.push_str(&t.spell);
                }
                if !closed {
                    return Err(CompilerError::PreprocessError(
                        "missing '>' in '#include' directive".into(),
                        directive.area(),
                    ));
                }
                (path, true)
            }
            _ => {
                return Err(CompilerError::PreprocessError(
                    "expected file path after '#include'".into(),
                    directive.area(),
                ));
            }
        };

        if self.once_included.contains(&path) {
            return Ok(());
        }
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(CompilerError::PreprocessError(
                format!("include depth exceeds limit of {} at '{}'", MAX_INCLUDE_DEPTH, path),
                directive.area(),
            ));
        }

        let text = self.include_handler.include(&path, is_system).map_err(|err| {
            CompilerError::PreprocessError(err.to_string(), directive.area())
        })?;

        self.include_depth += 1;
        let result = self.process_file(&text, &path);
        self.include_depth -= 1;
        result
    }

    fn parse_pragma(&mut self, line: &[Token], directive: &Token, ctx: &FileContext) -> Result<()> {
        let tokens: Vec<&Token> = significant(line).collect();
        match tokens.first() {
            Some(t) if t.spell == "once" => {
                self.once_included.insert(ctx.filename.clone());
                Ok(())
            }
            Some(t) if t.spell == "message" => {
                let message = tokens
                    .iter()
                    .find(|t| t.kind == TokenKind::StringLiteral)
                    .map(|t| t.spell_content().to_string())
                    .unwrap_or_default();
                self.reports.info(format!("#pragma message: {}", message));
                Ok(())
            }
            Some(t) => {
                self.reports.warning(
                    format!("unknown pragma '{}' ignored", t.spell),
                    directive.area(),
                );
                Ok(())
            }
            None => {
                self.reports.warning("empty pragma ignored", directive.area());
                Ok(())
            }
        }
    }

    // '#' 'line' NUMBER ('"' FILENAME '"')?
    fn parse_line_directive(&mut self, line: &[Token], directive: &Token, ctx: &mut FileContext) -> Result<()> {
        let tokens: Vec<&Token> = significant(line).collect();
        let number = tokens
            .first()
            .filter(|t| t.kind == TokenKind::IntLiteral)
            .and_then(|t| t.spell.parse::<i64>().ok())
            .ok_or_else(|| {
                CompilerError::PreprocessError(
                    "expected line number after '#line'".into(),
                    directive.area(),
                )
            })?;
        // The directive names the logical number of the NEXT line.
        ctx.line_offset = number - (directive.pos.line as i64 + 1);
        if let Some(file) = tokens.get(1).filter(|t| t.kind == TokenKind::StringLiteral) {
            ctx.filename = file.spell_content().to_string();
        }
        Ok(())
    }

    /* ----- Macro expansion ----- */

    /// Expand all macro invocations in `tokens`. Macros named in `hide`
    /// are currently being expanded and stay untouched.
    fn expand_tokens(
        &mut self,
        tokens: &[Token],
        hide: &mut Vec<String>,
        ctx: &FileContext,
    ) -> Result<Vec<Token>> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::EndOfStream => break,
                TokenKind::Directive => {
                    return Err(CompilerError::PreprocessError(
                        "unexpected '#' outside of a directive".into(),
                        token.area(),
                    ));
                }
                TokenKind::DirectiveConcat => {
                    return Err(CompilerError::PreprocessError(
                        "unexpected '##' outside of a macro body".into(),
                        token.area(),
                    ));
                }
                TokenKind::Ident if token.spell == "__FILE__" => {
                    out.push(Token::new(
                        TokenKind::StringLiteral,
                        format!("\"{}\"", ctx.filename),
                        token.pos,
                    ));
                    i += 1;
                }
                TokenKind::Ident if token.spell == "__LINE__" => {
                    out.push(Token::new(
                        TokenKind::IntLiteral,
                        ctx.logical_line(token.pos.line).to_string(),
                        token.pos,
                    ));
                    i += 1;
                }
                _ if is_macro_name(token)
                    && self.macros.contains_key(&token.spell)
                    && !hide.contains(&token.spell) =>
                {
                    let macro_def = self.macros[&token.spell].clone();
                    if let Some(params) = &macro_def.params {
                        // Function-like: require a parenthesized invocation.
                        let mut j = i + 1;
                        while j < tokens.len()
                            && matches!(tokens[j].kind, TokenKind::WhiteSpace | TokenKind::NewLine)
                        {
                            j += 1;
                        }
                        if tokens.get(j).map(|t| t.kind) != Some(TokenKind::LParen) {
                            out.push(token.clone());
                            i += 1;
                            continue;
                        }
                        let (args, after) = collect_macro_args(tokens, j, token)?;
                        if args.len() < params.len()
                            || (args.len() > params.len() && !macro_def.variadic)
                        {
                            return Err(CompilerError::PreprocessError(
                                format!(
                                    "macro '{}' expects {} argument(s), got {}",
                                    token.spell,
                                    params.len(),
                                    args.len()
                                ),
                                token.area(),
                            ));
                        }
                        let substituted = substitute_macro_body(&macro_def, &args, token)?;
                        hide.push(token.spell.clone());
                        let expanded = self.expand_tokens(&substituted, hide, ctx)?;
                        hide.pop();
                        out.extend(expanded);
                        i = after;
                    } else {
                        hide.push(token.spell.clone());
                        let body = macro_def.body.clone();
                        let expanded = self.expand_tokens(&body, hide, ctx)?;
                        hide.pop();
                        out.extend(expanded);
                        i += 1;
                    }
                }
                _ => {
                    out.push(token.clone());
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    /* ----- Conditional expression evaluation ----- */

    fn eval_condition(&mut self, line: &[Token], ctx: &FileContext) -> Result<bool> {
        // Resolve 'defined' before expansion so its operand is not expanded.
        let mut resolved: Vec<Token> = Vec::with_capacity(line.len());
        let tokens: Vec<&Token> = line
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::WhiteSpace | TokenKind::Comment))
            .collect();
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            if token.kind == TokenKind::Ident && token.spell == "defined" {
                let (name, next) = match tokens.get(i + 1) {
                    Some(t) if t.kind == TokenKind::LParen => {
                        let name = tokens.get(i + 2).filter(|t| is_macro_name(t));
                        let close = tokens.get(i + 3).map(|t| t.kind) == Some(TokenKind::RParen);
                        match (name, close) {
                            (Some(name), true) => (*name, i + 4),
                            _ => {
                                return Err(CompilerError::PreprocessError(
                                    "malformed 'defined' operator".into(),
                                    token.area(),
                                ));
                            }
                        }
                    }
                    Some(t) if is_macro_name(t) => (*t, i + 2),
                    _ => {
                        return Err(CompilerError::PreprocessError(
                            "expected macro name after 'defined'".into(),
                            token.area(),
                        ));
                    }
                };
                let value = if self.macros.contains_key(&name.spell) { "1" } else { "0" };
                resolved.push(Token::new(TokenKind::IntLiteral, value, token.pos));
                i = next;
            } else {
                resolved.push(token.clone());
                i += 1;
            }
        }

        let expanded = self.expand_tokens(&resolved, &mut Vec::new(), ctx)?;
        let significant: Vec<Token> = expanded
            .into_iter()
            .filter(|t| {
                !matches!(
                    t.kind,
                    TokenKind::WhiteSpace | TokenKind::NewLine | TokenKind::Comment
                )
            })
            .collect();

        let mut parser = CondExprParser {
            tokens: &significant,
            i: 0,
        };
        let value = parser.parse_expr()?;
        if parser.i < parser.tokens.len() {
            return Err(CompilerError::PreprocessError(
                "trailing tokens in conditional expression".into(),
                parser.tokens[parser.i].area(),
            ));
        }
        Ok(value != 0)
    }
}

/* ----- Free helpers ----- */

fn is_macro_name(token: &Token) -> bool {
    // Keyword classes still name macros; only a structural token cannot.
    token.kind == TokenKind::Ident
        || token
            .spell
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

fn significant<'t>(line: &'t [Token]) -> impl Iterator<Item = &'t Token> {
    line.iter().filter(|t| {
        !matches!(
            t.kind,
            TokenKind::WhiteSpace | TokenKind::Comment | TokenKind::NewLine
        )
    })
}

fn spell_line(line: &[Token]) -> String {
    line.iter().map(|t| t.spell.as_str()).collect()
}

fn macro_bodies_equal(a: &Macro, b: &Macro) -> bool {
    let strip = |m: &Macro| {
        m.body
            .iter()
            .filter(|t| t.kind != TokenKind::WhiteSpace)
            .map(|t| t.spell.clone())
            .collect::<Vec<_>>()
    };
    a.params == b.params && a.variadic == b.variadic && strip(a) == strip(b)
}

/// Tokens of one directive line, with line continuations flattened.
/// Returns the line body and the index after its newline.
fn collect_directive_line(tokens: &[Token], start: usize) -> (Vec<Token>, usize) {
    let mut line = Vec::new();
    let mut i = start;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::NewLine => {
                i += 1;
                break;
            }
            TokenKind::EndOfStream => break,
            TokenKind::LineBreak => i += 1,
            _ => {
                line.push(tokens[i].clone());
                i += 1;
            }
        }
    }
    (line, i)
}

/// End of the content region starting at `start`: the first subsequent
/// line whose first significant token is a directive, or end of stream.
fn find_content_chunk_end(tokens: &[Token], start: usize) -> usize {
    let mut i = start;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::EndOfStream => return i,
            TokenKind::NewLine => {
                let mut j = i + 1;
                while j < tokens.len() && tokens[j].kind == TokenKind::WhiteSpace {
                    j += 1;
                }
                if j < tokens.len() && tokens[j].kind == TokenKind::Directive {
                    return i + 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    i
}

/// Collect call arguments starting at the '(' in `tokens[open]`, tracking
/// balanced parentheses. Returns the argument token lists and the index
/// after the closing ')'.
fn collect_macro_args(tokens: &[Token], open: usize, name: &Token) -> Result<(Vec<Vec<Token>>, usize)> {
    debug_assert_eq!(tokens[open].kind, TokenKind::LParen);
    let mut args: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 1usize;
    let mut i = open + 1;
    let mut any_tokens = false;
    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::EndOfStream => break,
            TokenKind::LParen => {
                depth += 1;
                current.push(token.clone());
            }
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    if any_tokens || !args.is_empty() || !trimmed(&current).is_empty() {
                        args.push(trimmed(&current));
                    }
                    return Ok((args, i + 1));
                }
                current.push(token.clone());
            }
            TokenKind::Comma if depth == 1 => {
                args.push(trimmed(&current));
                current.clear();
            }
            TokenKind::NewLine | TokenKind::LineBreak => {
                // Arguments may span lines; separators become plain space.
                current.push(Token::new(TokenKind::WhiteSpace, " ", token.pos));
            }
            _ => {
                if token.kind != TokenKind::WhiteSpace {
                    any_tokens = true;
                }
                current.push(token.clone());
            }
        }
        i += 1;
    }
    Err(CompilerError::PreprocessError(
        format!("unterminated argument list of macro '{}'", name.spell),
        name.area(),
    ))
}

fn trimmed(tokens: &[Token]) -> Vec<Token> {
    let start = tokens
        .iter()
        .position(|t| t.kind != TokenKind::WhiteSpace)
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| t.kind != TokenKind::WhiteSpace)
        .map(|p| p + 1)
        .unwrap_or(start);
    tokens[start..end].to_vec()
}

/// Parameter substitution over a macro body: parameters are replaced by
/// their unexpanded arguments, '#' stringizes, '##' splices and re-scans.
fn substitute_macro_body(macro_def: &Macro, args: &[Vec<Token>], name: &Token) -> Result<Vec<Token>> {
    let params = macro_def.params.as_deref().unwrap_or(&[]);
    let arg_for = |param: &str| -> Option<&[Token]> {
        if param == "__VA_ARGS__" && macro_def.variadic {
            return None; // handled below
        }
        params
            .iter()
            .position(|p| p == param)
            .and_then(|i| args.get(i))
            .map(|v| v.as_slice())
    };
    let variadic_args = || -> Vec<Token> {
        let mut out = Vec::new();
        for (n, arg) in args.iter().enumerate().skip(params.len()) {
            if n > params.len() {
                out.push(Token::new(TokenKind::Comma, ",", name.pos));
                out.push(Token::new(TokenKind::WhiteSpace, " ", name.pos));
            }
            out.extend(arg.iter().cloned());
        }
        out
    };

    let mut out: Vec<Token> = Vec::new();
    let mut pending_concat = false;
    let mut i = 0;
    while i < macro_def.body.len() {
        let token = &macro_def.body[i];
        match token.kind {
            TokenKind::DirectiveConcat => {
                while out.last().is_some_and(|t| t.kind == TokenKind::WhiteSpace) {
                    out.pop();
                }
                pending_concat = true;
                i += 1;
                // Skip white space before the right-hand operand.
                while macro_def.body.get(i).is_some_and(|t| t.kind == TokenKind::WhiteSpace) {
                    i += 1;
                }
            }
            _ => {
                let replacement: Vec<Token> = match token.kind {
                    // '#param' stringizes the unexpanded argument.
                    TokenKind::Directive => {
                        if token.spell == "__VA_ARGS__" && macro_def.variadic {
                            vec![stringize(&variadic_args(), token)]
                        } else if let Some(arg) = arg_for(&token.spell) {
                            vec![stringize(arg, token)]
                        } else {
                            return Err(CompilerError::PreprocessError(
                                format!("'#' must be followed by a macro parameter, got '{}'", token.spell),
                                token.area(),
                            ));
                        }
                    }
                    _ if token.spell == "__VA_ARGS__" && macro_def.variadic => variadic_args(),
                    _ => match arg_for(&token.spell) {
                        Some(arg) => arg.to_vec(),
                        None => vec![token.clone()],
                    },
                };
                if pending_concat {
                    pending_concat = false;
                    let lhs = out.pop();
                    let mut parts = replacement;
                    let rhs = if parts.is_empty() { None } else { Some(parts.remove(0)) };
                    match (lhs, rhs) {
                        (Some(lhs), Some(rhs)) => {
                            out.push(concat_tokens(&lhs, &rhs)?);
                            out.extend(parts);
                        }
                        (Some(lhs), None) => out.push(lhs),
                        (None, Some(rhs)) => {
                            out.push(rhs);
                            out.extend(parts);
                        }
                        (None, None) => {}
                    }
                } else {
                    out.extend(replacement);
                }
                i += 1;
            }
        }
    }
    Ok(out)
}

fn stringize(tokens: &[Token], at: &Token) -> Token {
    let mut text = String::new();
    let mut last_was_space = true;
    for token in tokens {
        if token.kind == TokenKind::WhiteSpace {
            if !last_was_space {
                text.push(' ');
                last_was_space = true;
            }
        } else {
            text.push_str(&token.spell.replace('\\', "\\\\").replace('"', "\\\""));
            last_was_space = false;
        }
    }
    let text = text.trim_end().to_string();
    Token::new(TokenKind::StringLiteral, format!("\"{}\"", text), at.pos)
}

/// Splice two tokens into one and re-scan the result.
fn concat_tokens(lhs: &Token, rhs: &Token) -> Result<Token> {
    let spliced = format!("{}{}", lhs.spell, rhs.spell);
    let mut scanner = Scanner::new(&spliced);
    let token = scanner.next_token().map_err(|_| {
        CompilerError::PreprocessError(
            format!("'##' does not form a valid token: '{}'", spliced),
            lhs.area(),
        )
    })?;
    if !scanner.is_at_end() {
        return Err(CompilerError::PreprocessError(
            format!("'##' does not form a single token: '{}'", spliced),
            lhs.area(),
        ));
    }
    Ok(Token::new(token.kind, spliced, lhs.pos))
}

/// Precedence climbing parser for `#if` conditional expressions.
/// Operates on integers with C semantics; logical results are 0 or 1.
struct CondExprParser<'t> {
    tokens: &'t [Token],
    i: usize,
}

impl<'t> CondExprParser<'t> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.i)
    }

    fn error(&self, message: impl Into<String>) -> CompilerError {
        let area = self.peek().map(|t| t.area()).unwrap_or(SourceArea::ZERO);
        CompilerError::PreprocessError(message.into(), area)
    }

    fn parse_expr(&mut self) -> Result<i64> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<i64> {
        let cond = self.parse_binary(0)?;
        if self.peek().map(|t| t.kind) == Some(TokenKind::TernaryOp) {
            self.i += 1;
            let then_value = self.parse_expr()?;
            match self.peek() {
                Some(t) if t.kind == TokenKind::Colon => self.i += 1,
                _ => return Err(self.error("expected ':' in conditional expression")),
            }
            let else_value = self.parse_ternary()?;
            Ok(if cond != 0 { then_value } else { else_value })
        } else {
            Ok(cond)
        }
    }

    fn binary_precedence(spell: &str) -> Option<u8> {
        match spell {
            "||" => Some(1),
            "&&" => Some(2),
            "|" => Some(3),
            "^" => Some(4),
            "&" => Some(5),
            "==" | "!=" => Some(6),
            "<" | ">" | "<=" | ">=" => Some(7),
            "<<" | ">>" => Some(8),
            "+" | "-" => Some(9),
            "*" | "/" | "%" => Some(10),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<i64> {
        let mut lhs = self.parse_unary()?;
        while let Some(token) = self.peek() {
            if token.kind != TokenKind::BinaryOp {
                break;
            }
            let Some(prec) = Self::binary_precedence(&token.spell) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let op = token.spell.clone();
            let op_area = token.area();
            self.i += 1;
            let rhs = self.parse_binary(prec + 1)?;
            lhs = match op.as_str() {
                "||" => ((lhs != 0) || (rhs != 0)) as i64,
                "&&" => ((lhs != 0) && (rhs != 0)) as i64,
                "|" => lhs | rhs,
                "^" => lhs ^ rhs,
                "&" => lhs & rhs,
                "==" => (lhs == rhs) as i64,
                "!=" => (lhs != rhs) as i64,
                "<" => (lhs < rhs) as i64,
                ">" => (lhs > rhs) as i64,
                "<=" => (lhs <= rhs) as i64,
                ">=" => (lhs >= rhs) as i64,
                "<<" => lhs.wrapping_shl(rhs as u32),
                ">>" => lhs.wrapping_shr(rhs as u32),
                "+" => lhs.wrapping_add(rhs),
                "-" => lhs.wrapping_sub(rhs),
                "*" => lhs.wrapping_mul(rhs),
                "/" | "%" => {
                    if rhs == 0 {
                        return Err(CompilerError::PreprocessError(
                            "division by zero in conditional expression".into(),
                            op_area,
                        ));
                    }
                    if op == "/" {
                        lhs / rhs
                    } else {
                        lhs % rhs
                    }
                }
                _ => return Err(self.error(format!("unsupported operator '{}'", op))),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<i64> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::UnaryOp && t.spell == "!" => {
                self.i += 1;
                Ok((self.parse_unary()? == 0) as i64)
            }
            Some(t) if t.kind == TokenKind::UnaryOp && t.spell == "~" => {
                self.i += 1;
                Ok(!self.parse_unary()?)
            }
            Some(t) if t.kind == TokenKind::BinaryOp && t.spell == "-" => {
                self.i += 1;
                Ok(self.parse_unary()?.wrapping_neg())
            }
            Some(t) if t.kind == TokenKind::BinaryOp && t.spell == "+" => {
                self.i += 1;
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<i64> {
        let Some(token) = self.peek() else {
            return Err(self.error("unexpected end of conditional expression"));
        };
        match token.kind {
            TokenKind::IntLiteral => {
                let spell = token.spell.trim_end_matches(['u', 'U', 'l', 'L']);
                let value = if let Some(hex) = spell.strip_prefix("0x").or_else(|| spell.strip_prefix("0X")) {
                    i64::from_str_radix(hex, 16)
                } else {
                    spell.parse()
                };
                let value = value.map_err(|_| self.error(format!("invalid integer literal '{}'", token.spell)))?;
                self.i += 1;
                Ok(value)
            }
            TokenKind::BoolLiteral => {
                let value = (token.spell == "true") as i64;
                self.i += 1;
                Ok(value)
            }
            TokenKind::LParen => {
                self.i += 1;
                let value = self.parse_expr()?;
                match self.peek() {
                    Some(t) if t.kind == TokenKind::RParen => self.i += 1,
                    _ => return Err(self.error("expected ')' in conditional expression")),
                }
                Ok(value)
            }
            // Identifiers that survived expansion are undefined macros.
            _ if is_macro_name(token) => {
                self.i += 1;
                Ok(0)
            }
            TokenKind::FloatLiteral => {
                Err(self.error("floating-point literals are not allowed in conditional expressions"))
            }
            _ => Err(self.error(format!("unexpected token '{}' in conditional expression", token.spell))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include_handler::MemoryIncludeHandler;
    use crate::report::StdLog;

    fn preprocess(source: &str) -> (Option<String>, StdLog) {
        preprocess_with_includes(source, MemoryIncludeHandler::new())
    }

    fn preprocess_with_includes(
        source: &str,
        mut handler: MemoryIncludeHandler,
    ) -> (Option<String>, StdLog) {
        let mut log = StdLog::new();
        let mut pp = Preprocessor::new(&mut handler, Some(&mut log));
        let result = pp.process(&SourceCode::new("main.hlsl", source));
        (result, log)
    }

    #[test]
    fn test_plain_text_passes_through() {
        let source = "float4 main() { return 1.0; }\n";
        let (out, log) = preprocess(source);
        assert!(!log.has_errors());
        assert_eq!(out.unwrap(), source);
    }

    #[test]
    fn test_object_macro_expansion() {
        let (out, _) = preprocess("#define N 4\nfloat v[N];\n");
        assert_eq!(out.unwrap(), "float v[4];\n");
    }

    #[test]
    fn test_function_macro_arguments_not_pre_expanded() {
        let (out, _) = preprocess("#define SQR(x) ((x)*(x))\nSQR(1+2)\n");
        assert_eq!(out.unwrap(), "((1+2)*(1+2))\n");
    }

    #[test]
    fn test_self_recursive_macro_expands_once() {
        let (out, log) = preprocess("#define A A\nA\n");
        assert!(!log.has_errors());
        assert_eq!(out.unwrap(), "A\n");
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let (out, log) = preprocess("#define A B\n#define B A\nA\n");
        assert!(!log.has_errors());
        assert_eq!(out.unwrap(), "A\n");
    }

    #[test]
    fn test_stringize_operator() {
        let (out, _) = preprocess("#define STR(x) #x\nSTR(a + b)\n");
        assert_eq!(out.unwrap(), "\"a + b\"\n");
    }

    #[test]
    fn test_concat_operator() {
        let (out, _) = preprocess("#define GLUE(a, b) a##b\nGLUE(foo, bar)\n");
        assert_eq!(out.unwrap(), "foobar\n");
    }

    #[test]
    fn test_variadic_macro() {
        let (out, _) = preprocess("#define CALL(f, ...) f(__VA_ARGS__)\nCALL(g, 1, 2)\n");
        assert_eq!(out.unwrap(), "g(1, 2)\n");
    }

    #[test]
    fn test_conditional_taken_and_skipped() {
        let (out, _) = preprocess("#if 1\nyes\n#else\nno\n#endif\n");
        assert_eq!(out.unwrap(), "yes\n");
        let (out, _) = preprocess("#if 0\nyes\n#else\nno\n#endif\n");
        assert_eq!(out.unwrap(), "no\n");
    }

    #[test]
    fn test_elif_chain() {
        let source = "#define B 1\n#if defined(A)\na\n#elif defined(B)\nb\n#else\nc\n#endif\n";
        let (out, _) = preprocess(source);
        assert_eq!(out.unwrap(), "b\n");
    }

    #[test]
    fn test_skipped_region_no_errors_for_nested_conditions() {
        // UNDEFINED_MACRO(...) inside a dead region must not be evaluated.
        let source = "#if 0\n#if UNDEFINED_MACRO(broken\nx\n#endif\n#endif\nok\n";
        let (out, log) = preprocess(source);
        assert!(!log.has_errors(), "reports: {:?}", log.reports());
        assert_eq!(out.unwrap(), "ok\n");
    }

    #[test]
    fn test_ifdef_and_undef() {
        let source = "#define X 1\n#undef X\n#ifdef X\nyes\n#else\nno\n#endif\n";
        let (out, _) = preprocess(source);
        assert_eq!(out.unwrap(), "no\n");
    }

    #[test]
    fn test_missing_endif_is_error() {
        let (out, log) = preprocess("#if 1\nx\n");
        assert!(out.is_none());
        assert!(log.has_errors());
    }

    #[test]
    fn test_error_directive() {
        let (out, log) = preprocess("#error something went wrong\n");
        assert!(out.is_none());
        assert!(log.reports().iter().any(|r| r.message.contains("something went wrong")));
    }

    #[test]
    fn test_include_and_pragma_once() {
        let mut handler = MemoryIncludeHandler::new();
        handler.add_file("common.hlsl", "#pragma once\nfloat shared_value;\n");
        let source = "#include \"common.hlsl\"\n#include \"common.hlsl\"\nfloat x;\n";
        let (out, log) = preprocess_with_includes(source, handler);
        assert!(!log.has_errors());
        let text = out.unwrap();
        assert_eq!(text.matches("shared_value").count(), 1);
        assert!(text.contains("float x;"));
    }

    #[test]
    fn test_include_not_found() {
        let (out, log) = preprocess("#include \"missing.hlsl\"\n");
        assert!(out.is_none());
        assert!(log.has_errors());
    }

    #[test]
    fn test_line_directive_adjusts_line_macro() {
        let (out, _) = preprocess("#line 100\n__LINE__\n");
        assert_eq!(out.unwrap(), "100\n");
    }

    #[test]
    fn test_file_macro() {
        let (out, _) = preprocess("__FILE__\n");
        assert_eq!(out.unwrap(), "\"main.hlsl\"\n");
    }

    #[test]
    fn test_conditional_arithmetic() {
        let source = "#if (1 + 2) * 3 == 9 && (1 << 4) == 16\nok\n#endif\n";
        let (out, _) = preprocess(source);
        assert_eq!(out.unwrap(), "ok\n");
    }

    #[test]
    fn test_conditional_ternary_and_defined_without_parens() {
        let source = "#define FLAG 1\n#if defined FLAG ? FLAG : 0\nok\n#endif\n";
        let (out, _) = preprocess(source);
        assert_eq!(out.unwrap(), "ok\n");
    }

    #[test]
    fn test_division_by_zero_is_error() {
        let (out, log) = preprocess("#if 1 / 0\nx\n#endif\n");
        assert!(out.is_none());
        assert!(log.has_errors());
    }

    #[test]
    fn test_macro_call_spans_lines() {
        let (out, _) = preprocess("#define ADD(a, b) a + b\nADD(1,\n2)\n");
        assert_eq!(out.unwrap(), "1 + 2\n");
    }

    #[test]
    fn test_redefinition_warns() {
        let (_, log) = preprocess("#define X 1\n#define X 2\n");
        assert!(log
            .reports()
            .iter()
            .any(|r| r.kind == crate::report::ReportKind::Warning && r.message.contains("redefinition")));
    }

    #[test]
    fn test_line_continuation_in_define() {
        let (out, _) = preprocess("#define SUM 1 + \\\n 2\nSUM\n");
        assert_eq!(out.unwrap(), "1 +  2\n");
    }

    #[test]
    fn test_defined_macros_listed() {
        let mut handler = MemoryIncludeHandler::new();
        let mut log = StdLog::new();
        let mut pp = Preprocessor::new(&mut handler, Some(&mut log));
        let out = pp.process(&SourceCode::new(
            "main.hlsl",
            "#define A 1\n#define B 2\n#undef A\n",
        ));
        assert!(out.is_some());
        assert_eq!(pp.list_defined_macro_idents(), vec!["A".to_string(), "B".to_string()]);
    }
}
