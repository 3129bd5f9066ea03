//! Structural type representation shared across the AST.
//!
//! Type denoters are immutable after construction and shared by reference
//! count, since many expressions denote the same type. Aliased denoters
//! form a forward chain that `get_aliased` follows before any structural
//! inspection.

use crate::ast::NodeId;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Half,
    Float,
    Double,
}

impl ScalarType {
    pub fn parse(spell: &str) -> Option<ScalarType> {
        match spell {
            "bool" => Some(ScalarType::Bool),
            "int" => Some(ScalarType::Int),
            "uint" | "dword" => Some(ScalarType::UInt),
            "half" => Some(ScalarType::Half),
            "float" => Some(ScalarType::Float),
            "double" => Some(ScalarType::Double),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, ScalarType::Bool | ScalarType::Int | ScalarType::UInt)
    }

    pub fn is_real(&self) -> bool {
        matches!(self, ScalarType::Half | ScalarType::Float | ScalarType::Double)
    }

    /// Promotion order for implicit widening.
    pub fn rank(&self) -> u8 {
        match self {
            ScalarType::Bool => 0,
            ScalarType::Int => 1,
            ScalarType::UInt => 2,
            ScalarType::Half => 3,
            ScalarType::Float => 4,
            ScalarType::Double => 5,
        }
    }

    pub fn to_hlsl(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Half => "half",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }
}

/// Scalar, vector or matrix shape of a base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Scalar(ScalarType),
    Vector(ScalarType, u8),
    Matrix(ScalarType, u8, u8),
}

impl DataType {
    /// Parse an HLSL base type keyword such as `float`, `int3` or `half4x4`.
    pub fn parse(spell: &str) -> Option<DataType> {
        if let Some(scalar) = ScalarType::parse(spell) {
            return Some(DataType::Scalar(scalar));
        }
        let scalar_end = spell.find(|c: char| c.is_ascii_digit())?;
        let scalar = ScalarType::parse(&spell[..scalar_end])?;
        let suffix = &spell[scalar_end..];
        let mut chars = suffix.chars();
        let rows = chars.next()?.to_digit(10)? as u8;
        if !(1..=4).contains(&rows) {
            return None;
        }
        match (chars.next(), chars.next(), chars.next()) {
            (None, _, _) => Some(DataType::Vector(scalar, rows)),
            (Some('x'), Some(c), None) => {
                let cols = c.to_digit(10)? as u8;
                if (1..=4).contains(&cols) {
                    Some(DataType::Matrix(scalar, rows, cols))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            DataType::Scalar(s) | DataType::Vector(s, _) | DataType::Matrix(s, _, _) => *s,
        }
    }

    /// Total component count.
    pub fn dimensions(&self) -> u8 {
        match self {
            DataType::Scalar(_) => 1,
            DataType::Vector(_, n) => *n,
            DataType::Matrix(_, n, m) => n * m,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, DataType::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::Vector(..))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, DataType::Matrix(..))
    }

    pub fn with_scalar(&self, scalar: ScalarType) -> DataType {
        match self {
            DataType::Scalar(_) => DataType::Scalar(scalar),
            DataType::Vector(_, n) => DataType::Vector(scalar, *n),
            DataType::Matrix(_, n, m) => DataType::Matrix(scalar, *n, *m),
        }
    }

    pub fn to_hlsl(&self) -> String {
        match self {
            DataType::Scalar(s) => s.to_hlsl().to_string(),
            DataType::Vector(s, n) => format!("{}{}", s.to_hlsl(), n),
            DataType::Matrix(s, n, m) => format!("{}{}x{}", s.to_hlsl(), n, m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Buffer,
    RWBuffer,
    ByteAddressBuffer,
    RWByteAddressBuffer,
    StructuredBuffer,
    RWStructuredBuffer,
    AppendStructuredBuffer,
    ConsumeStructuredBuffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    RWTexture1D,
    RWTexture1DArray,
    RWTexture2D,
    RWTexture2DArray,
    RWTexture3D,
    GenericTexture,
}

impl BufferKind {
    pub fn parse(spell: &str) -> Option<BufferKind> {
        let kind = match spell {
            "Buffer" => BufferKind::Buffer,
            "RWBuffer" => BufferKind::RWBuffer,
            "ByteAddressBuffer" => BufferKind::ByteAddressBuffer,
            "RWByteAddressBuffer" => BufferKind::RWByteAddressBuffer,
            "StructuredBuffer" => BufferKind::StructuredBuffer,
            "RWStructuredBuffer" => BufferKind::RWStructuredBuffer,
            "AppendStructuredBuffer" => BufferKind::AppendStructuredBuffer,
            "ConsumeStructuredBuffer" => BufferKind::ConsumeStructuredBuffer,
            "Texture1D" => BufferKind::Texture1D,
            "Texture1DArray" => BufferKind::Texture1DArray,
            "Texture2D" => BufferKind::Texture2D,
            "Texture2DArray" => BufferKind::Texture2DArray,
            "Texture2DMS" => BufferKind::Texture2DMS,
            "Texture2DMSArray" => BufferKind::Texture2DMSArray,
            "Texture3D" => BufferKind::Texture3D,
            "TextureCube" => BufferKind::TextureCube,
            "TextureCubeArray" => BufferKind::TextureCubeArray,
            "RWTexture1D" => BufferKind::RWTexture1D,
            "RWTexture1DArray" => BufferKind::RWTexture1DArray,
            "RWTexture2D" => BufferKind::RWTexture2D,
            "RWTexture2DArray" => BufferKind::RWTexture2DArray,
            "RWTexture3D" => BufferKind::RWTexture3D,
            "texture" => BufferKind::GenericTexture,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_texture(&self) -> bool {
        use BufferKind::*;
        matches!(
            self,
            Texture1D
                | Texture1DArray
                | Texture2D
                | Texture2DArray
                | Texture2DMS
                | Texture2DMSArray
                | Texture3D
                | TextureCube
                | TextureCubeArray
                | RWTexture1D
                | RWTexture1DArray
                | RWTexture2D
                | RWTexture2DArray
                | RWTexture3D
                | GenericTexture
        )
    }

    pub fn to_hlsl(&self) -> &'static str {
        use BufferKind::*;
        match self {
            Buffer => "Buffer",
            RWBuffer => "RWBuffer",
            ByteAddressBuffer => "ByteAddressBuffer",
            RWByteAddressBuffer => "RWByteAddressBuffer",
            StructuredBuffer => "StructuredBuffer",
            RWStructuredBuffer => "RWStructuredBuffer",
            AppendStructuredBuffer => "AppendStructuredBuffer",
            ConsumeStructuredBuffer => "ConsumeStructuredBuffer",
            Texture1D => "Texture1D",
            Texture1DArray => "Texture1DArray",
            Texture2D => "Texture2D",
            Texture2DArray => "Texture2DArray",
            Texture2DMS => "Texture2DMS",
            Texture2DMSArray => "Texture2DMSArray",
            Texture3D => "Texture3D",
            TextureCube => "TextureCube",
            TextureCubeArray => "TextureCubeArray",
            RWTexture1D => "RWTexture1D",
            RWTexture1DArray => "RWTexture1DArray",
            RWTexture2D => "RWTexture2D",
            RWTexture2DArray => "RWTexture2DArray",
            RWTexture3D => "RWTexture3D",
            GenericTexture => "texture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Generic,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    SamplerState,
    SamplerComparisonState,
}

impl SamplerKind {
    pub fn parse(spell: &str) -> Option<SamplerKind> {
        let kind = match spell {
            "sampler" => SamplerKind::Generic,
            "sampler1D" => SamplerKind::Sampler1D,
            "sampler2D" => SamplerKind::Sampler2D,
            "sampler3D" => SamplerKind::Sampler3D,
            "samplerCUBE" => SamplerKind::SamplerCube,
            "sampler_state" | "SamplerState" => SamplerKind::SamplerState,
            "SamplerComparisonState" => SamplerKind::SamplerComparisonState,
            _ => return None,
        };
        Some(kind)
    }

    pub fn to_hlsl(&self) -> &'static str {
        match self {
            SamplerKind::Generic => "sampler",
            SamplerKind::Sampler1D => "sampler1D",
            SamplerKind::Sampler2D => "sampler2D",
            SamplerKind::Sampler3D => "sampler3D",
            SamplerKind::SamplerCube => "samplerCUBE",
            SamplerKind::SamplerState => "SamplerState",
            SamplerKind::SamplerComparisonState => "SamplerComparisonState",
        }
    }
}

/// Per-argument cost class for overload ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionCost {
    Exact,
    Promotion,
    Implicit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDenoter {
    Void,
    Base(DataType),
    Buffer {
        kind: BufferKind,
        generic: Option<Rc<TypeDenoter>>,
    },
    Sampler {
        kind: SamplerKind,
    },
    Struct {
        ident: String,
        decl: Option<NodeId>,
    },
    Alias {
        ident: String,
        decl: Option<NodeId>,
        aliased: Rc<TypeDenoter>,
    },
    Array {
        base: Rc<TypeDenoter>,
        /// One entry per dimension; `None` for a dynamic dimension `[]`.
        dimensions: Vec<Option<u32>>,
    },
}

impl TypeDenoter {
    pub fn base(data_type: DataType) -> Rc<TypeDenoter> {
        Rc::new(TypeDenoter::Base(data_type))
    }

    pub fn scalar(scalar: ScalarType) -> Rc<TypeDenoter> {
        TypeDenoter::base(DataType::Scalar(scalar))
    }

    pub fn void() -> Rc<TypeDenoter> {
        Rc::new(TypeDenoter::Void)
    }

    /// Follow the alias chain to the first non-alias denoter.
    pub fn get_aliased(self: &Rc<Self>) -> Rc<TypeDenoter> {
        match self.as_ref() {
            TypeDenoter::Alias { aliased, .. } => aliased.get_aliased(),
            _ => Rc::clone(self),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDenoter::Void)
    }

    pub fn as_base(&self) -> Option<DataType> {
        match self {
            TypeDenoter::Base(dt) => Some(*dt),
            TypeDenoter::Alias { aliased, .. } => aliased.as_base(),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.as_base().is_some_and(|dt| dt.is_scalar())
    }

    pub fn is_vector(&self) -> bool {
        self.as_base().is_some_and(|dt| dt.is_vector())
    }

    pub fn is_matrix(&self) -> bool {
        self.as_base().is_some_and(|dt| dt.is_matrix())
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, TypeDenoter::Struct { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeDenoter::Array { .. })
    }

    pub fn struct_decl(&self) -> Option<NodeId> {
        match self {
            TypeDenoter::Struct { decl, .. } => *decl,
            TypeDenoter::Alias { aliased, .. } => aliased.struct_decl(),
            _ => None,
        }
    }

    /// Cost of implicitly converting a value of type `self` into `target`.
    /// `None` means no implicit conversion exists.
    pub fn conversion_cost(&self, target: &TypeDenoter) -> Option<ConversionCost> {
        let from = match self {
            TypeDenoter::Alias { aliased, .. } => return aliased.conversion_cost(target),
            other => other,
        };
        let to = match target {
            TypeDenoter::Alias { aliased, .. } => return from.conversion_cost(aliased),
            other => other,
        };

        if from == to {
            return Some(ConversionCost::Exact);
        }

        match (from, to) {
            (TypeDenoter::Base(a), TypeDenoter::Base(b)) => {
                if a == b {
                    Some(ConversionCost::Exact)
                } else if a.dimensions() == b.dimensions()
                    && std::mem::discriminant(a) == std::mem::discriminant(b)
                {
                    // Same shape, differing scalar type.
                    if b.scalar_type().rank() > a.scalar_type().rank() {
                        Some(ConversionCost::Promotion)
                    } else {
                        Some(ConversionCost::Implicit)
                    }
                } else if a.is_scalar() {
                    // Scalar broadcast to any shape.
                    Some(ConversionCost::Implicit)
                } else if b.is_scalar() || (a.is_vector() && b.is_vector()) {
                    // Truncation (reported as a warning at use sites).
                    Some(ConversionCost::Implicit)
                } else {
                    None
                }
            }
            (
                TypeDenoter::Struct { ident: a, .. },
                TypeDenoter::Struct { ident: b, .. },
            ) if a == b => Some(ConversionCost::Exact),
            (
                TypeDenoter::Array {
                    base: a,
                    dimensions: da,
                },
                TypeDenoter::Array {
                    base: b,
                    dimensions: db,
                },
            ) if da == db && a.conversion_cost(b) == Some(ConversionCost::Exact) => {
                Some(ConversionCost::Exact)
            }
            (TypeDenoter::Sampler { kind: a }, TypeDenoter::Sampler { kind: b }) if a == b => {
                Some(ConversionCost::Exact)
            }
            _ => None,
        }
    }

    /// Result type of a binary arithmetic operation over two base types,
    /// per the HLSL promotion rules: the scalar type widens to the higher
    /// rank and scalars broadcast against vectors and matrices.
    pub fn common_type(lhs: &Rc<TypeDenoter>, rhs: &Rc<TypeDenoter>) -> Option<Rc<TypeDenoter>> {
        let a = lhs.get_aliased();
        let b = rhs.get_aliased();
        let (da, db) = (a.as_base()?, b.as_base()?);
        let scalar = if da.scalar_type().rank() >= db.scalar_type().rank() {
            da.scalar_type()
        } else {
            db.scalar_type()
        };
        let shape = match (da, db) {
            (DataType::Scalar(_), other) | (other, DataType::Scalar(_)) => other,
            (a_shape, b_shape) if a_shape.with_scalar(scalar) == b_shape.with_scalar(scalar) => {
                a_shape
            }
            _ => return None,
        };
        Some(TypeDenoter::base(shape.with_scalar(scalar)))
    }
}

impl fmt::Display for TypeDenoter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDenoter::Void => write!(f, "void"),
            TypeDenoter::Base(dt) => write!(f, "{}", dt.to_hlsl()),
            TypeDenoter::Buffer { kind, generic } => {
                write!(f, "{}", kind.to_hlsl())?;
                if let Some(generic) = generic {
                    write!(f, "<{}>", generic)?;
                }
                Ok(())
            }
            TypeDenoter::Sampler { kind } => write!(f, "{}", kind.to_hlsl()),
            TypeDenoter::Struct { ident, .. } => write!(f, "struct {}", ident),
            TypeDenoter::Alias { ident, .. } => write!(f, "{}", ident),
            TypeDenoter::Array { base, dimensions } => {
                write!(f, "{}", base)?;
                for dim in dimensions {
                    match dim {
                        Some(n) => write!(f, "[{}]", n)?,
                        None => write!(f, "[]")?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_types() {
        assert_eq!(DataType::parse("float"), Some(DataType::Scalar(ScalarType::Float)));
        assert_eq!(DataType::parse("int3"), Some(DataType::Vector(ScalarType::Int, 3)));
        assert_eq!(
            DataType::parse("half4x4"),
            Some(DataType::Matrix(ScalarType::Half, 4, 4))
        );
        assert_eq!(DataType::parse("dword"), Some(DataType::Scalar(ScalarType::UInt)));
        assert_eq!(DataType::parse("float5"), None);
        assert_eq!(DataType::parse("foo"), None);
    }

    #[test]
    fn test_alias_chain() {
        let base = TypeDenoter::base(DataType::Vector(ScalarType::Float, 4));
        let inner = Rc::new(TypeDenoter::Alias {
            ident: "Color".into(),
            decl: None,
            aliased: Rc::clone(&base),
        });
        let outer = Rc::new(TypeDenoter::Alias {
            ident: "Rgba".into(),
            decl: None,
            aliased: inner,
        });
        assert_eq!(outer.get_aliased(), base);
        assert!(outer.is_vector());
    }

    #[test]
    fn test_conversion_costs() {
        let float1 = TypeDenoter::scalar(ScalarType::Float);
        let int1 = TypeDenoter::scalar(ScalarType::Int);
        let float4 = TypeDenoter::base(DataType::Vector(ScalarType::Float, 4));
        assert_eq!(float1.conversion_cost(&float1), Some(ConversionCost::Exact));
        assert_eq!(int1.conversion_cost(&float1), Some(ConversionCost::Promotion));
        assert_eq!(float1.conversion_cost(&int1), Some(ConversionCost::Implicit));
        assert_eq!(float1.conversion_cost(&float4), Some(ConversionCost::Implicit));
        assert_eq!(float4.conversion_cost(&TypeDenoter::void()), None);
    }

    #[test]
    fn test_common_type_broadcast() {
        let float1 = TypeDenoter::scalar(ScalarType::Float);
        let int4 = TypeDenoter::base(DataType::Vector(ScalarType::Int, 4));
        let common = TypeDenoter::common_type(&float1, &int4).unwrap();
        assert_eq!(common.as_base(), Some(DataType::Vector(ScalarType::Float, 4)));
    }

    #[test]
    fn test_display() {
        let arr = TypeDenoter::Array {
            base: TypeDenoter::base(DataType::Vector(ScalarType::Float, 4)),
            dimensions: vec![Some(3), None],
        };
        assert_eq!(arr.to_string(), "float4[3][]");
    }
}
