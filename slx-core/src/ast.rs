//! Abstract syntax tree for the HLSL frontend.
//!
//! The tree is owned top-down from `Program`. Declarations carry stable
//! `NodeId`s handed out by the parser's counter; resolved use sites store
//! those ids as non-owning back references, so decoration passes can
//! rewrite declarations and use sites consistently without aliasing.

use crate::source::SourceArea;
use crate::type_denoter::{BufferKind, SamplerKind, TypeDenoter};
use std::fmt;
use std::rc::Rc;

pub type NodeId = u32;

/// Hands out declaration ids during parsing.
#[derive(Debug, Default, Clone)]
pub struct NodeCounter {
    next: NodeId,
}

impl NodeCounter {
    pub fn new() -> Self {
        NodeCounter { next: 1 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Small bitset of per-node markers set during analysis and transforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u32);

impl Flags {
    pub const REACHABLE: u32 = 1 << 0;
    pub const IS_ENTRY_POINT: u32 = 1 << 1;
    pub const IS_SECONDARY_ENTRY_POINT: u32 = 1 << 2;
    pub const HAS_NON_RETURN_PATH: u32 = 1 << 3;
    pub const IS_SHADER_INPUT: u32 = 1 << 4;
    pub const IS_SHADER_OUTPUT: u32 = 1 << 5;
    pub const IS_SYSTEM_VALUE: u32 = 1 << 6;
    pub const USED_OUTSIDE_ENTRY_IO: u32 = 1 << 7;
    pub const IS_IMMUTABLE: u32 = 1 << 8;
    pub const WAS_GENERATED: u32 = 1 << 9;

    pub fn insert(&mut self, flag: u32) {
        self.0 |= flag;
    }

    pub fn remove(&mut self, flag: u32) {
        self.0 &= !flag;
    }

    pub fn contains(&self, flag: u32) -> bool {
        (self.0 & flag) == flag
    }
}

/// Identifier with an optional rename applied by the converters. Emission
/// always goes through `final_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub original: String,
    pub renamed: Option<String>,
}

impl Ident {
    pub fn new(original: impl Into<String>) -> Self {
        Ident {
            original: original.into(),
            renamed: None,
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.renamed = Some(name.into());
    }

    pub fn final_name(&self) -> &str {
        self.renamed.as_deref().unwrap_or(&self.original)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.final_name())
    }
}

/// Indexed semantic, e.g. `TEXCOORD3` or `SV_Target0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Semantic {
    pub name: String,
    pub index: u32,
}

impl Semantic {
    /// Split a trailing index off the semantic spelling.
    pub fn parse(spell: &str) -> Semantic {
        let digits = spell.chars().rev().take_while(|c| c.is_ascii_digit()).count();
        let split = spell.len() - digits;
        // A purely numeric spelling stays a name.
        if split == 0 || digits == 0 {
            return Semantic {
                name: spell.to_string(),
                index: 0,
            };
        }
        Semantic {
            name: spell[..split].to_string(),
            index: spell[split..].parse().unwrap_or(0),
        }
    }

    pub fn is_system_value(&self) -> bool {
        let upper = self.name.to_ascii_uppercase();
        upper.starts_with("SV_")
    }
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index > 0 {
            write!(f, "{}{}", self.name, self.index)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// `register(t0)` style binding decorator.
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    pub area: SourceArea,
    pub slot_kind: char,
    pub slot: u32,
}

/// `packoffset(c0.x)` decorator on constant buffer members.
#[derive(Debug, Clone, PartialEq)]
pub struct PackOffset {
    pub area: SourceArea,
    pub register_name: String,
    pub component: Option<char>,
}

/// `[attribute(args...)]` before declarations and statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub area: SourceArea,
    pub ident: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputModifier {
    In,
    Out,
    InOut,
    Uniform,
}

impl InputModifier {
    pub fn parse(spell: &str) -> Option<InputModifier> {
        match spell {
            "in" => Some(InputModifier::In),
            "out" => Some(InputModifier::Out),
            "inout" => Some(InputModifier::InOut),
            "uniform" => Some(InputModifier::Uniform),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            InputModifier::In => "in",
            InputModifier::Out => "out",
            InputModifier::InOut => "inout",
            InputModifier::Uniform => "uniform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Extern,
    Precise,
    Shared,
    GroupShared,
    Static,
    Volatile,
}

impl StorageClass {
    pub fn parse(spell: &str) -> Option<StorageClass> {
        match spell {
            "extern" => Some(StorageClass::Extern),
            "precise" => Some(StorageClass::Precise),
            "shared" => Some(StorageClass::Shared),
            "groupshared" => Some(StorageClass::GroupShared),
            "static" => Some(StorageClass::Static),
            "volatile" => Some(StorageClass::Volatile),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            StorageClass::Extern => "extern",
            StorageClass::Precise => "precise",
            StorageClass::Shared => "shared",
            StorageClass::GroupShared => "groupshared",
            StorageClass::Static => "static",
            StorageClass::Volatile => "volatile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpModifier {
    Linear,
    Centroid,
    NoInterpolation,
    NoPerspective,
    Sample,
}

impl InterpModifier {
    pub fn parse(spell: &str) -> Option<InterpModifier> {
        match spell {
            "linear" => Some(InterpModifier::Linear),
            "centroid" => Some(InterpModifier::Centroid),
            "nointerpolation" => Some(InterpModifier::NoInterpolation),
            "noperspective" => Some(InterpModifier::NoPerspective),
            "sample" => Some(InterpModifier::Sample),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            InterpModifier::Linear => "linear",
            InterpModifier::Centroid => "centroid",
            InterpModifier::NoInterpolation => "nointerpolation",
            InterpModifier::NoPerspective => "noperspective",
            InterpModifier::Sample => "sample",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeModifier {
    Const,
    RowMajor,
    ColumnMajor,
    SNorm,
    UNorm,
}

impl TypeModifier {
    pub fn parse(spell: &str) -> Option<TypeModifier> {
        match spell {
            "const" => Some(TypeModifier::Const),
            "row_major" => Some(TypeModifier::RowMajor),
            "column_major" => Some(TypeModifier::ColumnMajor),
            "snorm" => Some(TypeModifier::SNorm),
            "unorm" => Some(TypeModifier::UNorm),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            TypeModifier::Const => "const",
            TypeModifier::RowMajor => "row_major",
            TypeModifier::ColumnMajor => "column_major",
            TypeModifier::SNorm => "snorm",
            TypeModifier::UNorm => "unorm",
        }
    }
}

/// Type part of a declaration, with all leading modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpecifier {
    pub area: SourceArea,
    pub input_modifier: Option<InputModifier>,
    pub storage_classes: Vec<StorageClass>,
    pub interp_modifiers: Vec<InterpModifier>,
    pub type_modifiers: Vec<TypeModifier>,
    /// Inline struct declaration (`struct S { ... } s;`).
    pub struct_decl: Option<StructDecl>,
    pub ty: Rc<TypeDenoter>,
}

impl TypeSpecifier {
    pub fn plain(ty: Rc<TypeDenoter>, area: SourceArea) -> Self {
        TypeSpecifier {
            area,
            input_modifier: None,
            storage_classes: Vec::new(),
            interp_modifiers: Vec::new(),
            type_modifiers: Vec::new(),
            struct_decl: None,
            ty,
        }
    }

    pub fn is_const(&self) -> bool {
        self.type_modifiers.contains(&TypeModifier::Const)
    }
}

/// One `[expr]` array dimension; the size is filled in by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDimension {
    pub area: SourceArea,
    pub expr: Option<Box<Expr>>,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub id: NodeId,
    pub area: SourceArea,
    pub flags: Flags,
    pub ident: Ident,
    pub array_dims: Vec<ArrayDimension>,
    pub semantic: Option<Semantic>,
    pub packoffset: Option<PackOffset>,
    pub registers: Vec<Register>,
    pub annotations: Vec<VarDeclStmt>,
    pub initializer: Option<Expr>,
    /// Full denoted type including array dimensions; set by the analyzer.
    pub ty: Option<Rc<TypeDenoter>>,
}

/// One type specifier with one or more declarators. Also used for
/// function parameters (single declarator) and struct members.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclStmt {
    pub area: SourceArea,
    pub type_spec: TypeSpecifier,
    pub var_decls: Vec<VarDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub id: NodeId,
    pub area: SourceArea,
    pub flags: Flags,
    pub attributes: Vec<Attribute>,
    pub return_type: TypeSpecifier,
    pub ident: Ident,
    pub parameters: Vec<VarDeclStmt>,
    pub semantic: Option<Semantic>,
    /// None for a prototype.
    pub body: Option<CodeBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub id: NodeId,
    pub area: SourceArea,
    pub flags: Flags,
    pub ident: Ident,
    pub base_name: Option<String>,
    pub members: Vec<VarDeclStmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformBufferKind {
    CBuffer,
    TBuffer,
}

impl UniformBufferKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            UniformBufferKind::CBuffer => "cbuffer",
            UniformBufferKind::TBuffer => "tbuffer",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformBufferDecl {
    pub id: NodeId,
    pub area: SourceArea,
    pub flags: Flags,
    pub kind: UniformBufferKind,
    pub ident: Ident,
    pub registers: Vec<Register>,
    pub members: Vec<VarDeclStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDecl {
    pub id: NodeId,
    pub area: SourceArea,
    pub flags: Flags,
    pub ident: Ident,
    pub array_dims: Vec<ArrayDimension>,
    pub registers: Vec<Register>,
    pub annotations: Vec<VarDeclStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDeclStmt {
    pub area: SourceArea,
    pub kind: BufferKind,
    pub generic: Option<Rc<TypeDenoter>>,
    pub buffer_decls: Vec<BufferDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerValue {
    pub area: SourceArea,
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDecl {
    pub id: NodeId,
    pub area: SourceArea,
    pub flags: Flags,
    pub ident: Ident,
    pub array_dims: Vec<ArrayDimension>,
    pub registers: Vec<Register>,
    pub values: Vec<SamplerValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDeclStmt {
    pub area: SourceArea,
    pub kind: SamplerKind,
    pub sampler_decls: Vec<SamplerDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDecl {
    pub id: NodeId,
    pub area: SourceArea,
    pub flags: Flags,
    pub ident: Ident,
    pub ty: Rc<TypeDenoter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDeclStmt {
    pub area: SourceArea,
    pub type_spec: TypeSpecifier,
    pub aliases: Vec<AliasDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub area: SourceArea,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlTransfer {
    Break,
    Continue,
    Discard,
}

impl CtrlTransfer {
    pub fn parse(spell: &str) -> Option<CtrlTransfer> {
        match spell {
            "break" => Some(CtrlTransfer::Break),
            "continue" => Some(CtrlTransfer::Continue),
            "discard" => Some(CtrlTransfer::Discard),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            CtrlTransfer::Break => "break",
            CtrlTransfer::Continue => "continue",
            CtrlTransfer::Discard => "discard",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub area: SourceArea,
    pub attributes: Vec<Attribute>,
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub iteration: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub area: SourceArea,
    pub attributes: Vec<Attribute>,
    pub condition: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStmt {
    pub area: SourceArea,
    pub body: Box<Stmt>,
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub area: SourceArea,
    pub attributes: Vec<Attribute>,
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub area: SourceArea,
    /// None for the `default` case.
    pub expr: Option<Expr>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub area: SourceArea,
    pub selector: Expr,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub area: SourceArea,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub area: SourceArea,
    pub expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Null {
        area: SourceArea,
    },
    CodeBlock {
        area: SourceArea,
        block: CodeBlock,
    },
    FunctionDecl(Box<FunctionDecl>),
    StructDecl {
        area: SourceArea,
        decl: StructDecl,
    },
    UniformBufferDecl(Box<UniformBufferDecl>),
    BufferDecls(BufferDeclStmt),
    SamplerDecls(SamplerDeclStmt),
    AliasDecls(AliasDeclStmt),
    VarDecls(VarDeclStmt),
    For(Box<ForStmt>),
    While(Box<WhileStmt>),
    DoWhile(Box<DoWhileStmt>),
    If(Box<IfStmt>),
    Switch(Box<SwitchStmt>),
    Expr(ExprStmt),
    Return(ReturnStmt),
    CtrlTransfer {
        area: SourceArea,
        transfer: CtrlTransfer,
    },
}

impl Stmt {
    pub fn area(&self) -> SourceArea {
        match self {
            Stmt::Null { area }
            | Stmt::CodeBlock { area, .. }
            | Stmt::StructDecl { area, .. }
            | Stmt::CtrlTransfer { area, .. } => *area,
            Stmt::FunctionDecl(decl) => decl.area,
            Stmt::UniformBufferDecl(decl) => decl.area,
            Stmt::BufferDecls(stmt) => stmt.area,
            Stmt::SamplerDecls(stmt) => stmt.area,
            Stmt::AliasDecls(stmt) => stmt.area,
            Stmt::VarDecls(stmt) => stmt.area,
            Stmt::For(stmt) => stmt.area,
            Stmt::While(stmt) => stmt.area,
            Stmt::DoWhile(stmt) => stmt.area,
            Stmt::If(stmt) => stmt.area,
            Stmt::Switch(stmt) => stmt.area,
            Stmt::Expr(stmt) => stmt.area,
            Stmt::Return(stmt) => stmt.area,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Bool,
    Int,
    Float,
    String,
}

/// Literals keep their spelling; numeric values are parsed on demand by
/// the evaluator and the emitters.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub spell: String,
}

impl Literal {
    pub fn int_value(&self) -> Option<i64> {
        let spell = self.spell.trim_end_matches(['u', 'U', 'l', 'L']);
        if let Some(hex) = spell.strip_prefix("0x").or_else(|| spell.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok()
        } else {
            spell.parse().ok()
        }
    }

    pub fn float_value(&self) -> Option<f64> {
        // Forms like "2." and ".5" parse as-is once the suffix is gone.
        self.spell.trim_end_matches(['f', 'F', 'h', 'H']).parse().ok()
    }

    pub fn is_unsigned(&self) -> bool {
        self.spell.ends_with(['u', 'U'])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    pub fn parse(spell: &str) -> Option<BinaryOp> {
        let op = match spell {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "<" => BinaryOp::Less,
            ">" => BinaryOp::Greater,
            "<=" => BinaryOp::LessEqual,
            ">=" => BinaryOp::GreaterEqual,
            "&&" => BinaryOp::LogicalAnd,
            "||" => BinaryOp::LogicalOr,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::ShiftLeft,
            ">>" => BinaryOp::ShiftRight,
            _ => return None,
        };
        Some(op)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEqual
                | BinaryOp::GreaterEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    LogicalNot,
    BitNot,
    Plus,
    Minus,
    Inc,
    Dec,
}

impl UnaryOp {
    pub fn parse(spell: &str) -> Option<UnaryOp> {
        match spell {
            "!" => Some(UnaryOp::LogicalNot),
            "~" => Some(UnaryOp::BitNot),
            "+" => Some(UnaryOp::Plus),
            "-" => Some(UnaryOp::Minus),
            "++" => Some(UnaryOp::Inc),
            "--" => Some(UnaryOp::Dec),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    ShiftLeft,
    ShiftRight,
    And,
    Or,
    Xor,
}

impl AssignOp {
    pub fn parse(spell: &str) -> Option<AssignOp> {
        let op = match spell {
            "=" => AssignOp::Set,
            "+=" => AssignOp::Add,
            "-=" => AssignOp::Sub,
            "*=" => AssignOp::Mul,
            "/=" => AssignOp::Div,
            "%=" => AssignOp::Mod,
            "<<=" => AssignOp::ShiftLeft,
            ">>=" => AssignOp::ShiftRight,
            "&=" => AssignOp::And,
            "|=" => AssignOp::Or,
            "^=" => AssignOp::Xor,
            _ => return None,
        };
        Some(op)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::ShiftLeft => "<<=",
            AssignOp::ShiftRight => ">>=",
            AssignOp::And => "&=",
            AssignOp::Or => "|=",
            AssignOp::Xor => "^=",
        }
    }
}

/// Intrinsic functions the analyzer types directly and the converters may
/// rename or restructure for the target dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Abs,
    Acos,
    All,
    Any,
    Asin,
    Atan,
    Atan2,
    Ceil,
    Clamp,
    Cos,
    Cosh,
    Cross,
    Ddx,
    Ddy,
    Degrees,
    Distance,
    Dot,
    Exp,
    Exp2,
    Floor,
    Fmod,
    Frac,
    Length,
    Lerp,
    Log,
    Log2,
    Max,
    Min,
    Mul,
    Normalize,
    Pow,
    Radians,
    Reflect,
    Refract,
    Round,
    Rsqrt,
    Saturate,
    Sign,
    Sin,
    Sinh,
    SmoothStep,
    Sqrt,
    Step,
    Tan,
    Tanh,
    Transpose,
    Tex1D,
    Tex2D,
    Tex3D,
    TexCube,
    Sample,
    SampleLevel,
}

impl Intrinsic {
    pub fn parse(spell: &str) -> Option<Intrinsic> {
        let intrinsic = match spell {
            "abs" => Intrinsic::Abs,
            "acos" => Intrinsic::Acos,
            "all" => Intrinsic::All,
            "any" => Intrinsic::Any,
            "asin" => Intrinsic::Asin,
            "atan" => Intrinsic::Atan,
            "atan2" => Intrinsic::Atan2,
            "ceil" => Intrinsic::Ceil,
            "clamp" => Intrinsic::Clamp,
            "cos" => Intrinsic::Cos,
            "cosh" => Intrinsic::Cosh,
            "cross" => Intrinsic::Cross,
            "ddx" => Intrinsic::Ddx,
            "ddy" => Intrinsic::Ddy,
            "degrees" => Intrinsic::Degrees,
            "distance" => Intrinsic::Distance,
            "dot" => Intrinsic::Dot,
            "exp" => Intrinsic::Exp,
            "exp2" => Intrinsic::Exp2,
            "floor" => Intrinsic::Floor,
            "fmod" => Intrinsic::Fmod,
            "frac" => Intrinsic::Frac,
            "length" => Intrinsic::Length,
            "lerp" => Intrinsic::Lerp,
            "log" => Intrinsic::Log,
            "log2" => Intrinsic::Log2,
            "max" => Intrinsic::Max,
            "min" => Intrinsic::Min,
            "mul" => Intrinsic::Mul,
            "normalize" => Intrinsic::Normalize,
            "pow" => Intrinsic::Pow,
            "radians" => Intrinsic::Radians,
            "reflect" => Intrinsic::Reflect,
            "refract" => Intrinsic::Refract,
            "round" => Intrinsic::Round,
            "rsqrt" => Intrinsic::Rsqrt,
            "saturate" => Intrinsic::Saturate,
            "sign" => Intrinsic::Sign,
            "sin" => Intrinsic::Sin,
            "sinh" => Intrinsic::Sinh,
            "smoothstep" => Intrinsic::SmoothStep,
            "sqrt" => Intrinsic::Sqrt,
            "step" => Intrinsic::Step,
            "tan" => Intrinsic::Tan,
            "tanh" => Intrinsic::Tanh,
            "transpose" => Intrinsic::Transpose,
            "tex1D" => Intrinsic::Tex1D,
            "tex2D" => Intrinsic::Tex2D,
            "tex3D" => Intrinsic::Tex3D,
            "texCUBE" => Intrinsic::TexCube,
            "Sample" => Intrinsic::Sample,
            "SampleLevel" => Intrinsic::SampleLevel,
            _ => return None,
        };
        Some(intrinsic)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectExpr {
    pub prefix: Option<Box<Expr>>,
    pub ident: Ident,
    /// Resolved declaration, if the name bound to one.
    pub symbol_ref: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub prefix: Option<Box<Expr>>,
    /// Function name; None for a type constructor call.
    pub ident: Option<Ident>,
    /// Constructed type for type constructor calls like `float4(...)`.
    pub type_ctor: Option<Rc<TypeDenoter>>,
    pub args: Vec<Expr>,
    pub func_ref: Option<NodeId>,
    pub intrinsic: Option<Intrinsic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Sequence(Vec<Expr>),
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    PostUnary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call(CallExpr),
    Bracket(Box<Expr>),
    Object(ObjectExpr),
    Array {
        prefix: Box<Expr>,
        indices: Vec<Expr>,
    },
    Cast {
        type_spec: Box<TypeSpecifier>,
        operand: Box<Expr>,
    },
    Assign {
        lhs: Box<Expr>,
        op: AssignOp,
        rhs: Box<Expr>,
    },
    Initializer(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub area: SourceArea,
    /// Computed type denoter; set by the analyzer.
    pub ty: Option<Rc<TypeDenoter>>,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(area: SourceArea, kind: ExprKind) -> Self {
        Expr {
            area,
            ty: None,
            kind,
        }
    }

    pub fn type_denoter(&self) -> Option<Rc<TypeDenoter>> {
        self.ty.clone()
    }
}

/* ----- Per-stage layout records ----- */

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessControlLayout {
    pub output_control_points: u32,
    pub max_tess_factor: f32,
    pub patch_constant_func: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessEvalLayout {
    pub domain: Option<String>,
    pub partitioning: Option<String>,
    pub output_topology: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryLayout {
    pub input_primitive: Option<String>,
    pub output_topology: Option<String>,
    pub max_vertices: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentLayout {
    pub early_depth_stencil: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeLayout {
    pub num_threads: [u32; 3],
}

impl Default for ComputeLayout {
    fn default() -> Self {
        ComputeLayout { num_threads: [1, 1, 1] }
    }
}

/// Flattened entry point interface for targets without parameter
/// semantics; filled by the analyzer, consumed by the generators.
#[derive(Debug, Clone, PartialEq)]
pub struct IoVar {
    /// Global variable name in the output.
    pub name: String,
    /// Entry parameter this came from; empty for the return value.
    pub param: String,
    /// Struct member within the parameter, for struct typed IO.
    pub member: Option<String>,
    pub semantic: Semantic,
    pub ty: Rc<TypeDenoter>,
    pub interp_modifiers: Vec<InterpModifier>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryIo {
    pub inputs: Vec<IoVar>,
    pub outputs: Vec<IoVar>,
}

/// Root of the AST, owning all nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub global_stmts: Vec<Stmt>,
    pub entry_point: Option<NodeId>,
    pub entry_io: EntryIo,
    /// Source comments by line, kept when comment preservation is on.
    pub comments: Vec<(u32, String)>,
    pub tess_control_layout: TessControlLayout,
    pub tess_eval_layout: TessEvalLayout,
    pub geometry_layout: GeometryLayout,
    pub fragment_layout: FragmentLayout,
    pub compute_layout: ComputeLayout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = Flags::default();
        assert!(!flags.contains(Flags::REACHABLE));
        flags.insert(Flags::REACHABLE | Flags::IS_ENTRY_POINT);
        assert!(flags.contains(Flags::REACHABLE));
        assert!(flags.contains(Flags::IS_ENTRY_POINT));
        flags.remove(Flags::REACHABLE);
        assert!(!flags.contains(Flags::REACHABLE));
        assert!(flags.contains(Flags::IS_ENTRY_POINT));
    }

    #[test]
    fn test_semantic_parse() {
        let sem = Semantic::parse("TEXCOORD3");
        assert_eq!(sem.name, "TEXCOORD");
        assert_eq!(sem.index, 3);
        assert!(!sem.is_system_value());

        let sem = Semantic::parse("SV_Target");
        assert_eq!(sem.name, "SV_Target");
        assert_eq!(sem.index, 0);
        assert!(sem.is_system_value());
    }

    #[test]
    fn test_literal_values() {
        let lit = Literal {
            kind: LiteralKind::Int,
            spell: "0x2Au".into(),
        };
        assert_eq!(lit.int_value(), Some(42));
        assert!(lit.is_unsigned());

        let lit = Literal {
            kind: LiteralKind::Float,
            spell: "1.5f".into(),
        };
        assert_eq!(lit.float_value(), Some(1.5));
    }

    #[test]
    fn test_ident_rename() {
        let mut ident = Ident::new("f");
        assert_eq!(ident.final_name(), "f");
        ident.rename("f_1");
        assert_eq!(ident.final_name(), "f_1");
        assert_eq!(ident.original, "f");
    }
}
