//! Public descriptor types of the compile entry point.

use std::fmt;

/// Shader pipeline stage the entry point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderTarget {
    #[default]
    Undefined,
    VertexShader,
    TessellationControlShader,
    TessellationEvaluationShader,
    GeometryShader,
    FragmentShader,
    ComputeShader,
}

impl ShaderTarget {
    /// Conventional output file extension for this stage.
    pub fn file_ext(&self) -> &'static str {
        match self {
            ShaderTarget::VertexShader => "vert",
            ShaderTarget::TessellationControlShader => "tesc",
            ShaderTarget::TessellationEvaluationShader => "tese",
            ShaderTarget::GeometryShader => "geom",
            ShaderTarget::FragmentShader => "frag",
            ShaderTarget::ComputeShader => "comp",
            ShaderTarget::Undefined => "glsl",
        }
    }
}

impl fmt::Display for ShaderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderTarget::Undefined => "Undefined",
            ShaderTarget::VertexShader => "Vertex Shader",
            ShaderTarget::TessellationControlShader => "Tessellation-Control Shader",
            ShaderTarget::TessellationEvaluationShader => "Tessellation-Evaluation Shader",
            ShaderTarget::GeometryShader => "Geometry Shader",
            ShaderTarget::FragmentShader => "Fragment Shader",
            ShaderTarget::ComputeShader => "Compute Shader",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum InputShaderVersion {
    HLSL3,
    HLSL4,
    #[default]
    HLSL5,
}

impl fmt::Display for InputShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputShaderVersion::HLSL3 => "HLSL 3.0",
            InputShaderVersion::HLSL4 => "HLSL 4.0",
            InputShaderVersion::HLSL5 => "HLSL 5.0",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputShaderVersion {
    GLSL110,
    GLSL120,
    GLSL130,
    GLSL140,
    GLSL150,
    GLSL330,
    GLSL400,
    GLSL410,
    GLSL420,
    GLSL430,
    GLSL440,
    #[default]
    GLSL450,
    ESSL100,
    ESSL300,
    ESSL310,
    ESSL320,
    VKSL450,
    /// Re-emit the HLSL input.
    HLSL5,
}

impl OutputShaderVersion {
    pub fn is_glsl(&self) -> bool {
        use OutputShaderVersion::*;
        matches!(
            self,
            GLSL110 | GLSL120 | GLSL130 | GLSL140 | GLSL150 | GLSL330 | GLSL400 | GLSL410
                | GLSL420 | GLSL430 | GLSL440 | GLSL450
        )
    }

    pub fn is_essl(&self) -> bool {
        use OutputShaderVersion::*;
        matches!(self, ESSL100 | ESSL300 | ESSL310 | ESSL320)
    }

    pub fn is_vksl(&self) -> bool {
        matches!(self, OutputShaderVersion::VKSL450)
    }

    pub fn is_hlsl(&self) -> bool {
        matches!(self, OutputShaderVersion::HLSL5)
    }

    /// Any member of the GLSL family, including ESSL and Vulkan-GLSL.
    pub fn is_glsl_family(&self) -> bool {
        self.is_glsl() || self.is_essl() || self.is_vksl()
    }

    /// Number in the `#version` directive.
    pub fn version_number(&self) -> u32 {
        use OutputShaderVersion::*;
        match self {
            GLSL110 => 110,
            GLSL120 => 120,
            GLSL130 => 130,
            GLSL140 => 140,
            GLSL150 => 150,
            GLSL330 => 330,
            GLSL400 => 400,
            GLSL410 => 410,
            GLSL420 => 420,
            GLSL430 => 430,
            GLSL440 => 440,
            GLSL450 | VKSL450 => 450,
            ESSL100 => 100,
            ESSL300 => 300,
            ESSL310 => 310,
            ESSL320 => 320,
            HLSL5 => 50,
        }
    }

    pub fn supports_doubles(&self) -> bool {
        if self.is_hlsl() || self.is_vksl() {
            return true;
        }
        self.is_glsl() && self.version_number() >= 400
    }

    pub fn supports_explicit_bindings(&self) -> bool {
        self.is_vksl() || (self.is_glsl() && self.version_number() >= 420) || (self.is_essl() && self.version_number() >= 310)
    }
}

impl fmt::Display for OutputShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OutputShaderVersion::*;
        let name = match self {
            GLSL110 => "GLSL 1.10",
            GLSL120 => "GLSL 1.20",
            GLSL130 => "GLSL 1.30",
            GLSL140 => "GLSL 1.40",
            GLSL150 => "GLSL 1.50",
            GLSL330 => "GLSL 3.30",
            GLSL400 => "GLSL 4.00",
            GLSL410 => "GLSL 4.10",
            GLSL420 => "GLSL 4.20",
            GLSL430 => "GLSL 4.30",
            GLSL440 => "GLSL 4.40",
            GLSL450 => "GLSL 4.50",
            ESSL100 => "ESSL 1.00",
            ESSL300 => "ESSL 3.00",
            ESSL310 => "ESSL 3.10",
            ESSL320 => "ESSL 3.20",
            VKSL450 => "VKSL 4.50",
            HLSL5 => "HLSL 5.0",
        };
        write!(f, "{}", name)
    }
}

/// Warning classes, enabled per bit in `ShaderInput::warnings`.
pub mod warnings {
    pub const PREPROCESSOR: u32 = 1 << 0;
    pub const SYNTAX: u32 = 1 << 1;
    pub const SEMANTICS: u32 = 1 << 2;
    pub const REFLECTION: u32 = 1 << 3;
    pub const ALL: u32 = PREPROCESSOR | SYNTAX | SEMANTICS | REFLECTION;
}

/// Output generation switches.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Emit the preprocessed stream verbatim and stop.
    pub preprocess_only: bool,
    /// Run all checks but write nothing.
    pub validate_only: bool,
    pub optimize: bool,
    pub preserve_comments: bool,
    pub allow_extensions: bool,
    pub separate_shaders: bool,
    /// Assign binding locations automatically; implies `explicit_binding`.
    pub auto_binding: bool,
    pub explicit_binding: bool,
    pub row_major_alignment: bool,
    /// Dump the decorated AST to the log.
    pub show_ast: bool,
}

/// Output formatting switches.
#[derive(Debug, Clone)]
pub struct Formatting {
    pub indent: String,
    pub blanks: bool,
    pub line_marks: bool,
    pub compact_wrappers: bool,
    pub always_braced_scopes: bool,
}

impl Default for Formatting {
    fn default() -> Self {
        Formatting {
            indent: "    ".into(),
            blanks: true,
            line_marks: false,
            compact_wrappers: false,
            always_braced_scopes: false,
        }
    }
}

/// Prefixes used to generate collision free names in the output.
/// All five must be pairwise distinct; the reserved word and temporary
/// prefixes must not be empty.
#[derive(Debug, Clone)]
pub struct NameMangling {
    pub input_prefix: String,
    pub output_prefix: String,
    pub reserved_word_prefix: String,
    pub temporary_prefix: String,
    pub namespace_prefix: String,
}

impl Default for NameMangling {
    fn default() -> Self {
        NameMangling {
            input_prefix: "xsi_".into(),
            output_prefix: "xso_".into(),
            reserved_word_prefix: "xsr_".into(),
            temporary_prefix: "xst_".into(),
            namespace_prefix: String::new(),
        }
    }
}

/// Explicit semantic-to-location binding for vertex inputs or fragment
/// outputs.
#[derive(Debug, Clone)]
pub struct SemanticBinding {
    pub semantic: String,
    pub location: u32,
}
