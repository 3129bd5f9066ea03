//! HLSL to GLSL keyword, type, semantic and intrinsic mappings.

use crate::ast::{Intrinsic, Semantic};
use crate::options::ShaderTarget;
use crate::type_denoter::{BufferKind, DataType, ScalarType, TypeDenoter};
use std::rc::Rc;

/// GLSL spelling of a base data type. Half maps to float; GLSL has no
/// half-precision scalar type outside of ESSL precision qualifiers.
pub fn glsl_data_type(data_type: DataType) -> String {
    match data_type {
        DataType::Scalar(scalar) => glsl_scalar_type(scalar).to_string(),
        DataType::Vector(scalar, n) => match scalar {
            ScalarType::Bool => format!("bvec{}", n),
            ScalarType::Int => format!("ivec{}", n),
            ScalarType::UInt => format!("uvec{}", n),
            ScalarType::Double => format!("dvec{}", n),
            ScalarType::Half | ScalarType::Float => format!("vec{}", n),
        },
        DataType::Matrix(scalar, rows, cols) => {
            let prefix = if scalar == ScalarType::Double { "dmat" } else { "mat" };
            if rows == cols {
                format!("{}{}", prefix, rows)
            } else {
                format!("{}{}x{}", prefix, rows, cols)
            }
        }
    }
}

pub fn glsl_scalar_type(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Bool => "bool",
        ScalarType::Int => "int",
        ScalarType::UInt => "uint",
        ScalarType::Half | ScalarType::Float => "float",
        ScalarType::Double => "double",
    }
}

/// Combined texture-sampler type for a texture declaration, honoring the
/// generic component type (e.g. `Texture2D<int4>` becomes `isampler2D`).
pub fn glsl_sampler_type(kind: BufferKind, generic: Option<&Rc<TypeDenoter>>) -> Option<String> {
    let prefix = match generic.and_then(|ty| ty.as_base()).map(|dt| dt.scalar_type()) {
        Some(ScalarType::Int) => "i",
        Some(ScalarType::UInt) => "u",
        _ => "",
    };
    let base = match kind {
        BufferKind::Texture1D => "sampler1D",
        BufferKind::Texture1DArray => "sampler1DArray",
        BufferKind::Texture2D => "sampler2D",
        BufferKind::Texture2DArray => "sampler2DArray",
        BufferKind::Texture2DMS => "sampler2DMS",
        BufferKind::Texture2DMSArray => "sampler2DMSArray",
        BufferKind::Texture3D => "sampler3D",
        BufferKind::TextureCube => "samplerCube",
        BufferKind::TextureCubeArray => "samplerCubeArray",
        BufferKind::GenericTexture => "sampler2D",
        _ => return None,
    };
    Some(format!("{}{}", prefix, base))
}

/// GLSL builtin variable for a system value semantic, if one exists for
/// the stage and direction. Returns None for user varyings.
pub fn glsl_semantic_builtin(
    semantic: &Semantic,
    target: ShaderTarget,
    is_input: bool,
) -> Option<&'static str> {
    let upper = semantic.name.to_ascii_uppercase();
    match upper.as_str() {
        "SV_POSITION" => match (target, is_input) {
            (ShaderTarget::FragmentShader, true) => Some("gl_FragCoord"),
            (ShaderTarget::VertexShader, false) => Some("gl_Position"),
            (ShaderTarget::TessellationEvaluationShader, false) => Some("gl_Position"),
            (ShaderTarget::GeometryShader, false) => Some("gl_Position"),
            _ => None,
        },
        "SV_DEPTH" => {
            if target == ShaderTarget::FragmentShader && !is_input {
                Some("gl_FragDepth")
            } else {
                None
            }
        }
        "SV_VERTEXID" => {
            if target == ShaderTarget::VertexShader && is_input {
                Some("gl_VertexID")
            } else {
                None
            }
        }
        "SV_INSTANCEID" => {
            if target == ShaderTarget::VertexShader && is_input {
                Some("gl_InstanceID")
            } else {
                None
            }
        }
        "SV_ISFRONTFACE" => {
            if target == ShaderTarget::FragmentShader && is_input {
                Some("gl_FrontFacing")
            } else {
                None
            }
        }
        "SV_DISPATCHTHREADID" => is_input.then_some("gl_GlobalInvocationID"),
        "SV_GROUPID" => is_input.then_some("gl_WorkGroupID"),
        "SV_GROUPTHREADID" => is_input.then_some("gl_LocalInvocationID"),
        "SV_GROUPINDEX" => is_input.then_some("gl_LocalInvocationIndex"),
        _ => None,
    }
}

/// GLSL function name of an intrinsic. `Mul` never reaches emission; the
/// converter rewrote it into an operator. `Saturate` is special cased in
/// the generator because it expands to a `clamp` call.
pub fn glsl_intrinsic_name(intrinsic: Intrinsic) -> &'static str {
    use Intrinsic::*;
    match intrinsic {
        Abs => "abs",
        Acos => "acos",
        All => "all",
        Any => "any",
        Asin => "asin",
        Atan => "atan",
        Atan2 => "atan",
        Ceil => "ceil",
        Clamp => "clamp",
        Cos => "cos",
        Cosh => "cosh",
        Cross => "cross",
        Ddx => "dFdx",
        Ddy => "dFdy",
        Degrees => "degrees",
        Distance => "distance",
        Dot => "dot",
        Exp => "exp",
        Exp2 => "exp2",
        Floor => "floor",
        Fmod => "mod",
        Frac => "fract",
        Length => "length",
        Lerp => "mix",
        Log => "log",
        Log2 => "log2",
        Max => "max",
        Min => "min",
        Mul => "mul",
        Normalize => "normalize",
        Pow => "pow",
        Radians => "radians",
        Reflect => "reflect",
        Refract => "refract",
        Round => "round",
        Rsqrt => "inversesqrt",
        Saturate => "clamp",
        Sign => "sign",
        Sin => "sin",
        Sinh => "sinh",
        SmoothStep => "smoothstep",
        Sqrt => "sqrt",
        Step => "step",
        Tan => "tan",
        Tanh => "tanh",
        Transpose => "transpose",
        Tex1D | Tex2D | Tex3D | TexCube | Sample => "texture",
        SampleLevel => "textureLod",
    }
}

/// GLSL reserved words that need renaming when used as identifiers.
pub fn is_glsl_reserved_word(ident: &str) -> bool {
    matches!(
        ident,
        "input"
            | "output"
            | "attribute"
            | "varying"
            | "uniform"
            | "buffer"
            | "shared"
            | "coherent"
            | "volatile"
            | "restrict"
            | "readonly"
            | "writeonly"
            | "layout"
            | "centroid"
            | "flat"
            | "smooth"
            | "noperspective"
            | "patch"
            | "sample"
            | "subroutine"
            | "invariant"
            | "precise"
            | "discard"
            | "mat2"
            | "mat3"
            | "mat4"
            | "vec2"
            | "vec3"
            | "vec4"
            | "ivec2"
            | "ivec3"
            | "ivec4"
            | "bvec2"
            | "bvec3"
            | "bvec4"
            | "uvec2"
            | "uvec3"
            | "uvec4"
            | "lowp"
            | "mediump"
            | "highp"
            | "precision"
            | "texture"
            | "main"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_mapping() {
        assert_eq!(glsl_data_type(DataType::Vector(ScalarType::Float, 4)), "vec4");
        assert_eq!(glsl_data_type(DataType::Vector(ScalarType::Int, 3)), "ivec3");
        assert_eq!(glsl_data_type(DataType::Matrix(ScalarType::Float, 4, 4)), "mat4");
        assert_eq!(glsl_data_type(DataType::Matrix(ScalarType::Float, 2, 3)), "mat2x3");
        assert_eq!(glsl_data_type(DataType::Scalar(ScalarType::Half)), "float");
    }

    #[test]
    fn test_sampler_type_mapping() {
        let int4 = TypeDenoter::base(DataType::Vector(ScalarType::Int, 4));
        assert_eq!(
            glsl_sampler_type(BufferKind::Texture2D, Some(&int4)),
            Some("isampler2D".into())
        );
        assert_eq!(
            glsl_sampler_type(BufferKind::TextureCube, None),
            Some("samplerCube".into())
        );
        assert_eq!(glsl_sampler_type(BufferKind::StructuredBuffer, None), None);
    }

    #[test]
    fn test_semantic_builtins() {
        let position = Semantic::parse("SV_Position");
        assert_eq!(
            glsl_semantic_builtin(&position, ShaderTarget::VertexShader, false),
            Some("gl_Position")
        );
        assert_eq!(
            glsl_semantic_builtin(&position, ShaderTarget::FragmentShader, true),
            Some("gl_FragCoord")
        );
        let target = Semantic::parse("SV_Target");
        assert_eq!(
            glsl_semantic_builtin(&target, ShaderTarget::FragmentShader, false),
            None
        );
    }

    #[test]
    fn test_intrinsic_renames() {
        assert_eq!(glsl_intrinsic_name(Intrinsic::Frac), "fract");
        assert_eq!(glsl_intrinsic_name(Intrinsic::Lerp), "mix");
        assert_eq!(glsl_intrinsic_name(Intrinsic::Rsqrt), "inversesqrt");
        assert_eq!(glsl_intrinsic_name(Intrinsic::Tex2D), "texture");
    }
}
