//! Code generation backends, one per output dialect family.

mod glsl;
mod glsl_keywords;
mod hlsl;

pub use glsl::GlslGenerator;
pub use glsl_keywords::{glsl_data_type, glsl_sampler_type, glsl_semantic_builtin};
pub use hlsl::HlslGenerator;
