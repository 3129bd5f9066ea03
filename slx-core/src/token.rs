//! Token model shared by the scanner, the preprocessor and the parser.

use crate::source::{SourceArea, SourcePosition};
use std::fmt;

/// Token classes. Keyword classes (e.g. `InputModifier`) carry their
/// concrete spelling in the token, so one class covers the whole family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,

    BoolLiteral,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,

    AssignOp,  // = += -= *= /= %= <<= >>= |= &= ^=
    BinaryOp,  // && || | ^ & << >> + - * / % == != < > <= >=
    UnaryOp,   // ! ~ ++ --
    TernaryOp, // ?

    Dot,
    Colon,
    DColon,
    Semicolon,
    Comma,

    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]

    StringType,
    ScalarType,
    VectorType,
    MatrixType,
    GenericVector, // 'vector' with explicit generic arguments
    GenericMatrix, // 'matrix' with explicit generic arguments
    Void,

    Sampler,
    SamplerState,
    Buffer, // texture and buffer object types
    UniformBuffer,
    PrimitiveType,

    Do,
    While,
    For,
    If,
    Else,
    Switch,
    Case,
    Default,

    Typedef,
    Struct,
    Register,
    PackOffset,

    CtrlTransfer, // break, continue, discard
    Return,

    InputModifier,  // in, out, inout, uniform
    InterpModifier, // linear, centroid, nointerpolation, noperspective, sample
    TypeModifier,   // const, row_major, column_major, snorm, unorm
    StorageClass,   // extern, precise, shared, groupshared, static, volatile
    Inline,

    Reserved,
    Unsupported,

    Directive,       // '#' IDENT
    DirectiveConcat, // '##'
    Comment,
    WhiteSpace,
    NewLine,
    LineBreak, // '\' directly before a line break
    VarArg,    // '...'
    Misc,

    EndOfStream,
}

impl TokenKind {
    /// Human readable class name for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::BoolLiteral => "boolean literal",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::FloatLiteral => "floating-point literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::CharLiteral => "character literal",
            TokenKind::AssignOp => "assignment operator",
            TokenKind::BinaryOp => "binary operator",
            TokenKind::UnaryOp => "unary operator",
            TokenKind::TernaryOp => "ternary operator",
            TokenKind::Dot => "'.'",
            TokenKind::Colon => "':'",
            TokenKind::DColon => "'::'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::StringType => "string type",
            TokenKind::ScalarType => "scalar type",
            TokenKind::VectorType => "vector type",
            TokenKind::MatrixType => "matrix type",
            TokenKind::GenericVector => "'vector'",
            TokenKind::GenericMatrix => "'matrix'",
            TokenKind::Void => "'void'",
            TokenKind::Sampler => "sampler type",
            TokenKind::SamplerState => "sampler state type",
            TokenKind::Buffer => "buffer type",
            TokenKind::UniformBuffer => "uniform buffer",
            TokenKind::PrimitiveType => "primitive type",
            TokenKind::Do => "'do'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Switch => "'switch'",
            TokenKind::Case => "'case'",
            TokenKind::Default => "'default'",
            TokenKind::Typedef => "'typedef'",
            TokenKind::Struct => "'struct'",
            TokenKind::Register => "'register'",
            TokenKind::PackOffset => "'packoffset'",
            TokenKind::CtrlTransfer => "control transfer",
            TokenKind::Return => "'return'",
            TokenKind::InputModifier => "input modifier",
            TokenKind::InterpModifier => "interpolation modifier",
            TokenKind::TypeModifier => "type modifier",
            TokenKind::StorageClass => "storage class",
            TokenKind::Inline => "'inline'",
            TokenKind::Reserved => "reserved keyword",
            TokenKind::Unsupported => "unsupported keyword",
            TokenKind::Directive => "preprocessor directive",
            TokenKind::DirectiveConcat => "'##'",
            TokenKind::Comment => "comment",
            TokenKind::WhiteSpace => "white space",
            TokenKind::NewLine => "line break",
            TokenKind::LineBreak => "line continuation",
            TokenKind::VarArg => "'...'",
            TokenKind::Misc => "token",
            TokenKind::EndOfStream => "end of stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub spell: String,
    pub pos: SourcePosition,
}

impl Token {
    pub fn new(kind: TokenKind, spell: impl Into<String>, pos: SourcePosition) -> Self {
        Token {
            kind,
            spell: spell.into(),
            pos,
        }
    }

    pub fn area(&self) -> SourceArea {
        SourceArea::new(self.pos, self.spell.chars().count().max(1) as u32)
    }

    /// Spelling without enclosing quotes for string and char literals.
    pub fn spell_content(&self) -> &str {
        match self.kind {
            TokenKind::StringLiteral | TokenKind::CharLiteral if self.spell.len() >= 2 => {
                &self.spell[1..self.spell.len() - 1]
            }
            _ => &self.spell,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spell_content_strips_quotes() {
        let tkn = Token::new(TokenKind::StringLiteral, "\"abc\"", SourcePosition::new(1, 1));
        assert_eq!(tkn.spell_content(), "abc");
        let tkn = Token::new(TokenKind::Ident, "abc", SourcePosition::new(1, 1));
        assert_eq!(tkn.spell_content(), "abc");
    }
}
