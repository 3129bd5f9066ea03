//! Scanner for the HLSL dialect.
//!
//! The raw token recognizers are nom combinators; the `Scanner` wraps them
//! with position tracking, keyword classification and error recovery. Two
//! stream shapes are produced: `tokenize` for the parser (white space and
//! line breaks dropped) and `scan_all` for the preprocessor (everything
//! kept, including white space, newlines and comments).

use crate::error::{CompilerError, Result};
use crate::source::{SourceArea, SourcePosition};
use crate::token::{Token, TokenKind};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1, hex_digit1, one_of},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{pair, preceded, tuple},
    IResult,
};
use std::collections::HashMap;

pub type KeywordMap = HashMap<String, TokenKind>;

/// Keyword table for the HLSL input dialect.
pub fn hlsl_keywords() -> KeywordMap {
    let mut map = KeywordMap::new();

    map.insert("true".into(), TokenKind::BoolLiteral);
    map.insert("false".into(), TokenKind::BoolLiteral);

    map.insert("void".into(), TokenKind::Void);
    map.insert("string".into(), TokenKind::StringType);
    map.insert("vector".into(), TokenKind::GenericVector);
    map.insert("matrix".into(), TokenKind::GenericMatrix);

    for scalar in ["bool", "int", "uint", "dword", "half", "float", "double"] {
        map.insert(scalar.to_string(), TokenKind::ScalarType);
        for n in 1..=4 {
            map.insert(format!("{}{}", scalar, n), TokenKind::VectorType);
            for m in 1..=4 {
                map.insert(format!("{}{}x{}", scalar, n, m), TokenKind::MatrixType);
            }
        }
    }

    for buffer in [
        "Buffer",
        "RWBuffer",
        "ByteAddressBuffer",
        "RWByteAddressBuffer",
        "StructuredBuffer",
        "RWStructuredBuffer",
        "AppendStructuredBuffer",
        "ConsumeStructuredBuffer",
        "Texture1D",
        "Texture1DArray",
        "Texture2D",
        "Texture2DArray",
        "Texture2DMS",
        "Texture2DMSArray",
        "Texture3D",
        "TextureCube",
        "TextureCubeArray",
        "RWTexture1D",
        "RWTexture1DArray",
        "RWTexture2D",
        "RWTexture2DArray",
        "RWTexture3D",
        "texture",
    ] {
        map.insert(buffer.to_string(), TokenKind::Buffer);
    }

    for sampler in ["sampler", "sampler1D", "sampler2D", "sampler3D", "samplerCUBE"] {
        map.insert(sampler.to_string(), TokenKind::Sampler);
    }
    for sampler in ["sampler_state", "SamplerState", "SamplerComparisonState"] {
        map.insert(sampler.to_string(), TokenKind::SamplerState);
    }

    map.insert("cbuffer".into(), TokenKind::UniformBuffer);
    map.insert("tbuffer".into(), TokenKind::UniformBuffer);

    for primitive in ["point", "line", "lineadj", "triangle", "triangleadj"] {
        map.insert(primitive.to_string(), TokenKind::PrimitiveType);
    }

    map.insert("do".into(), TokenKind::Do);
    map.insert("while".into(), TokenKind::While);
    map.insert("for".into(), TokenKind::For);
    map.insert("if".into(), TokenKind::If);
    map.insert("else".into(), TokenKind::Else);
    map.insert("switch".into(), TokenKind::Switch);
    map.insert("case".into(), TokenKind::Case);
    map.insert("default".into(), TokenKind::Default);

    map.insert("typedef".into(), TokenKind::Typedef);
    map.insert("struct".into(), TokenKind::Struct);
    map.insert("register".into(), TokenKind::Register);
    map.insert("packoffset".into(), TokenKind::PackOffset);
    map.insert("return".into(), TokenKind::Return);
    map.insert("inline".into(), TokenKind::Inline);

    for ctrl in ["break", "continue", "discard"] {
        map.insert(ctrl.to_string(), TokenKind::CtrlTransfer);
    }

    for modifier in ["in", "out", "inout", "uniform"] {
        map.insert(modifier.to_string(), TokenKind::InputModifier);
    }
    for modifier in ["linear", "centroid", "nointerpolation", "noperspective", "sample"] {
        map.insert(modifier.to_string(), TokenKind::InterpModifier);
    }
    for modifier in ["const", "row_major", "column_major", "snorm", "unorm"] {
        map.insert(modifier.to_string(), TokenKind::TypeModifier);
    }
    for class in ["extern", "precise", "shared", "groupshared", "static", "volatile"] {
        map.insert(class.to_string(), TokenKind::StorageClass);
    }

    for unsupported in ["class", "interface"] {
        map.insert(unsupported.to_string(), TokenKind::Unsupported);
    }
    for reserved in [
        "auto", "catch", "char", "const_cast", "delete", "dynamic_cast", "enum", "explicit",
        "friend", "goto", "long", "mutable", "new", "operator", "private", "protected", "public",
        "reinterpret_cast", "short", "signed", "sizeof", "static_cast", "template", "this",
        "throw", "try", "typename", "union", "unsigned", "using", "virtual",
    ] {
        map.insert(reserved.to_string(), TokenKind::Reserved);
    }

    map
}

fn lex_line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), take_while(|c| c != '\n' && c != '\r')))(input)
}

fn lex_block_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

fn lex_ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn lex_hex_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        alt((tag("0x"), tag("0X"))),
        hex_digit1,
        opt(one_of("uUlL")),
    )))(input)
}

fn lex_exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

// digit+ '.' digit* | '.' digit+ | digit+ (exponent required in third form)
fn lex_float_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        alt((
            recognize(tuple((digit1, char('.'), opt(digit1), opt(lex_exponent)))),
            recognize(tuple((char('.'), digit1, opt(lex_exponent)))),
            recognize(pair(digit1, lex_exponent)),
        )),
        opt(one_of("fFhH")),
    )))(input)
}

fn lex_int_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(one_of("uUlL"))))(input)
}

fn lex_operator(input: &str) -> IResult<&str, &str> {
    alt((
        alt((
            tag("<<="),
            tag(">>="),
            tag("..."),
            tag("<<"),
            tag(">>"),
            tag("<="),
            tag(">="),
            tag("=="),
            tag("!="),
            tag("&&"),
            tag("||"),
            tag("+="),
            tag("-="),
            tag("*="),
            tag("/="),
            tag("%="),
            tag("&="),
            tag("|="),
            tag("^="),
            tag("++"),
            tag("--"),
        )),
        alt((
            tag("::"),
            tag("+"),
            tag("-"),
            tag("*"),
            tag("/"),
            tag("%"),
            tag("="),
            tag("<"),
            tag(">"),
            tag("!"),
            tag("~"),
            tag("&"),
            tag("|"),
            tag("^"),
            tag("?"),
            tag("."),
            tag(":"),
            tag(";"),
            tag(","),
        )),
        alt((tag("("), tag(")"), tag("{"), tag("}"), tag("["), tag("]"))),
    ))(input)
}

fn operator_kind(spell: &str) -> TokenKind {
    match spell {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "<<=" | ">>=" | "&=" | "|=" | "^=" => {
            TokenKind::AssignOp
        }
        "!" | "~" | "++" | "--" => TokenKind::UnaryOp,
        "?" => TokenKind::TernaryOp,
        "." => TokenKind::Dot,
        ":" => TokenKind::Colon,
        "::" => TokenKind::DColon,
        ";" => TokenKind::Semicolon,
        "," => TokenKind::Comma,
        "(" => TokenKind::LParen,
        ")" => TokenKind::RParen,
        "{" => TokenKind::LBrace,
        "}" => TokenKind::RBrace,
        "[" => TokenKind::LBracket,
        "]" => TokenKind::RBracket,
        "..." => TokenKind::VarArg,
        _ => TokenKind::BinaryOp,
    }
}

fn lex_directive(input: &str) -> IResult<&str, &str> {
    preceded(pair(char('#'), take_while(|c| c == ' ' || c == '\t')), lex_ident)(input)
}

fn lex_whitespace(input: &str) -> IResult<&str, &str> {
    take_while1(|c| c == ' ' || c == '\t')(input)
}

fn lex_newline(input: &str) -> IResult<&str, &str> {
    alt((tag("\r\n"), tag("\n"), tag("\r")))(input)
}

fn lex_line_continuation(input: &str) -> IResult<&str, &str> {
    map(pair(char('\\'), lex_newline), |_| "\\")(input)
}

/// Character level scanner with position tracking on top of the nom
/// recognizers above.
pub struct Scanner<'a> {
    remaining: &'a str,
    pos: SourcePosition,
    keywords: KeywordMap,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner::with_keywords(source, hlsl_keywords())
    }

    pub fn with_keywords(source: &'a str, keywords: KeywordMap) -> Self {
        Scanner {
            remaining: source,
            pos: SourcePosition::new(1, 1),
            keywords,
        }
    }

    /// Position of the next token boundary.
    pub fn current_position(&self) -> SourcePosition {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining.is_empty()
    }

    fn consume_len(&mut self, len: usize) {
        let (text, rest) = self.remaining.split_at(len);
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    self.pos.line += 1;
                    self.pos.column = 1;
                }
                '\n' => {
                    self.pos.line += 1;
                    self.pos.column = 1;
                }
                _ => self.pos.column += 1,
            }
        }
        self.remaining = rest;
    }

    // `consumed_len` is what leaves the input, `spell` what the token keeps
    // (these differ for directives and normalized newlines).
    fn make_token(&mut self, kind: TokenKind, consumed_len: usize, spell: &str) -> Token {
        let token = Token::new(kind, spell, self.pos);
        self.consume_len(consumed_len);
        token
    }

    fn scan_string_literal(&mut self, quote: char, kind: TokenKind) -> Result<Token> {
        let start_pos = self.pos;
        let bytes = self.remaining.as_bytes();
        let mut i = quote.len_utf8();
        let mut terminated = false;
        while i < bytes.len() {
            let c = self.remaining[i..].chars().next().unwrap();
            match c {
                '\\' => {
                    i += 1;
                    if let Some(e) = self.remaining[i..].chars().next() {
                        i += e.len_utf8();
                    }
                }
                '\n' | '\r' => break,
                _ if c == quote => {
                    i += c.len_utf8();
                    terminated = true;
                    break;
                }
                _ => i += c.len_utf8(),
            }
        }
        if !terminated {
            self.consume_len(i);
            let what = if kind == TokenKind::StringLiteral {
                "string"
            } else {
                "character"
            };
            return Err(CompilerError::LexError(
                format!("unterminated {} literal", what),
                SourceArea::new(start_pos, i as u32),
            ));
        }
        let spell = self.remaining[..i].to_string();
        Ok(self.make_token(kind, i, &spell))
    }

    /// Scan the next token. Errors leave the scanner resynchronized at the
    /// next white space boundary.
    pub fn next_token(&mut self) -> Result<Token> {
        if self.remaining.is_empty() {
            return Ok(Token::new(TokenKind::EndOfStream, "", self.pos));
        }

        let input = self.remaining;
        let first = input.chars().next().unwrap();

        if let Ok((rest, ws)) = lex_whitespace(input) {
            let spell = ws.to_string();
            return Ok(self.make_token(TokenKind::WhiteSpace, input.len() - rest.len(), &spell));
        }
        if let Ok((rest, _)) = lex_newline(input) {
            return Ok(self.make_token(TokenKind::NewLine, input.len() - rest.len(), "\n"));
        }
        if first == '\\' {
            if let Ok((rest, _)) = lex_line_continuation(input) {
                return Ok(self.make_token(TokenKind::LineBreak, input.len() - rest.len(), "\\"));
            }
        }
        if input.starts_with("//") {
            let (rest, comment) = lex_line_comment(input).expect("line comment prefix checked");
            let spell = comment.to_string();
            return Ok(self.make_token(TokenKind::Comment, input.len() - rest.len(), &spell));
        }
        if input.starts_with("/*") {
            return match lex_block_comment(input) {
                Ok((rest, comment)) => {
                    let spell = comment.to_string();
                    Ok(self.make_token(TokenKind::Comment, input.len() - rest.len(), &spell))
                }
                Err(_) => {
                    let pos = self.pos;
                    self.consume_len(input.len());
                    Err(CompilerError::LexError(
                        "unterminated block comment".into(),
                        SourceArea::new(pos, 2),
                    ))
                }
            };
        }
        if first == '"' {
            return self.scan_string_literal('"', TokenKind::StringLiteral);
        }
        if first == '\'' {
            return self.scan_string_literal('\'', TokenKind::CharLiteral);
        }
        if input.starts_with("##") {
            return Ok(self.make_token(TokenKind::DirectiveConcat, 2, "##"));
        }
        if first == '#' {
            return match lex_directive(input) {
                Ok((rest, name)) => {
                    let spell = name.to_string();
                    Ok(self.make_token(TokenKind::Directive, input.len() - rest.len(), &spell))
                }
                Err(_) => Ok(self.make_token(TokenKind::Misc, 1, "#")),
            };
        }
        if first.is_ascii_digit() || (first == '.' && input[1..].starts_with(|c: char| c.is_ascii_digit())) {
            if let Ok((rest, spell)) = lex_hex_literal(input) {
                let spell = spell.to_string();
                return Ok(self.make_token(TokenKind::IntLiteral, input.len() - rest.len(), &spell));
            }
            if let Ok((rest, spell)) = lex_float_literal(input) {
                let spell = spell.to_string();
                return Ok(self.make_token(TokenKind::FloatLiteral, input.len() - rest.len(), &spell));
            }
            if let Ok((rest, spell)) = lex_int_literal(input) {
                let spell = spell.to_string();
                return Ok(self.make_token(TokenKind::IntLiteral, input.len() - rest.len(), &spell));
            }
        }
        if first.is_ascii_alphabetic() || first == '_' {
            let (rest, spell) = lex_ident(input).expect("identifier prefix checked");
            let kind = self.keywords.get(spell).copied().unwrap_or(TokenKind::Ident);
            let spell = spell.to_string();
            return Ok(self.make_token(kind, input.len() - rest.len(), &spell));
        }
        if let Ok((rest, spell)) = lex_operator(input) {
            let kind = operator_kind(spell);
            let spell = spell.to_string();
            return Ok(self.make_token(kind, input.len() - rest.len(), &spell));
        }

        // Stray character: resynchronize at the next white space.
        let pos = self.pos;
        let stray_len = input
            .find(|c: char| c.is_whitespace())
            .unwrap_or(input.len())
            .max(first.len_utf8());
        let stray = input[..stray_len].to_string();
        self.consume_len(stray_len);
        Err(CompilerError::LexError(
            format!("stray character sequence '{}'", stray),
            SourceArea::new(pos, stray.chars().count() as u32),
        ))
    }
}

fn scan(source: &str, filter: impl Fn(&TokenKind) -> bool) -> (Vec<Token>, Vec<CompilerError>) {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    loop {
        match scanner.next_token() {
            Ok(token) => {
                let end = token.kind == TokenKind::EndOfStream;
                if filter(&token.kind) || end {
                    tokens.push(token);
                }
                if end {
                    break;
                }
            }
            Err(err) => errors.push(err),
        }
    }
    (tokens, errors)
}

/// Token stream for the parser: white space, line breaks and (unless
/// `keep_comments`) comments are dropped. Ends with an `EndOfStream` token.
pub fn tokenize(source: &str, keep_comments: bool) -> (Vec<Token>, Vec<CompilerError>) {
    scan(source, |kind| {
        !matches!(
            kind,
            TokenKind::WhiteSpace | TokenKind::NewLine | TokenKind::LineBreak
        ) && (keep_comments || *kind != TokenKind::Comment)
    })
}

/// Token stream for the preprocessor: everything is kept.
pub fn scan_all(source: &str) -> (Vec<Token>, Vec<CompilerError>) {
    scan(source, |_| true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(source, false);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scan_keywords_and_idents() {
        assert_eq!(
            kinds("float4 position : SV_Position;"),
            vec![
                TokenKind::VectorType,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::EndOfStream,
            ]
        );
    }

    #[test]
    fn test_scan_numeric_literals() {
        let (tokens, errors) = tokenize("42 0x2Au 1.5f .5 2.f 1e-3 3u", false);
        assert!(errors.is_empty());
        let spells: Vec<&str> = tokens.iter().map(|t| t.spell.as_str()).collect();
        assert_eq!(spells, vec!["42", "0x2Au", "1.5f", ".5", "2.f", "1e-3", "3u", ""]);
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[1].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[2].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[3].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[5].kind, TokenKind::FloatLiteral);
    }

    #[test]
    fn test_scan_operators_longest_match() {
        assert_eq!(
            kinds("a <<= b << c <= d"),
            vec![
                TokenKind::Ident,
                TokenKind::AssignOp,
                TokenKind::Ident,
                TokenKind::BinaryOp,
                TokenKind::Ident,
                TokenKind::BinaryOp,
                TokenKind::Ident,
                TokenKind::EndOfStream,
            ]
        );
    }

    #[test]
    fn test_scan_matrix_types() {
        assert_eq!(
            kinds("float4x4 m; int3 v;"),
            vec![
                TokenKind::MatrixType,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::VectorType,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::EndOfStream,
            ]
        );
    }

    #[test]
    fn test_scan_directive_token() {
        let (tokens, errors) = scan_all("#define FOO 1\n");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].spell, "define");
    }

    #[test]
    fn test_scan_positions() {
        let (tokens, _) = tokenize("a\n  b", false);
        assert_eq!(tokens[0].pos, SourcePosition::new(1, 1));
        assert_eq!(tokens[1].pos, SourcePosition::new(2, 3));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let (_, errors) = tokenize("\"abc", false);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompilerError::LexError(..)));
    }

    #[test]
    fn test_stray_character_resynchronizes() {
        let (tokens, errors) = tokenize("a $$$ b", false);
        assert_eq!(errors.len(), 1);
        let spells: Vec<&str> = tokens.iter().map(|t| t.spell.as_str()).collect();
        assert_eq!(spells, vec!["a", "b", ""]);
    }

    #[test]
    fn test_comments_skipped_or_kept() {
        let (tokens, _) = tokenize("a // note\nb", false);
        assert_eq!(tokens.len(), 3);
        let (tokens, _) = tokenize("a // note\nb", true);
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1].kind, TokenKind::Comment);
    }

    #[test]
    fn test_line_continuation() {
        let (tokens, errors) = scan_all("#define A 1 \\\n + 2\n");
        assert!(errors.is_empty());
        assert!(tokens.iter().any(|t| t.kind == TokenKind::LineBreak));
    }
}
