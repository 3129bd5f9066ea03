//! End-to-end compilation tests through the public entry point.

use slx_core::{
    compile_shader, MemoryIncludeHandler, Options, OutputShaderVersion, ReflectionData,
    ShaderInput, ShaderOutput, ShaderTarget, StdLog,
};

struct Compiled {
    success: bool,
    output: String,
    log: StdLog,
    reflection: ReflectionData,
}

fn compile_with(
    source: &str,
    target: ShaderTarget,
    version: OutputShaderVersion,
    configure: impl FnOnce(&mut Options),
) -> Compiled {
    let mut input = ShaderInput::new("test.hlsl", source);
    input.shader_target = target;
    let mut sink: Vec<u8> = Vec::new();
    let mut output = ShaderOutput::new(&mut sink);
    output.shader_version = version;
    configure(&mut output.options);
    let mut log = StdLog::new();
    let mut reflection = ReflectionData::default();
    let success = compile_shader(input, output, Some(&mut log), Some(&mut reflection));
    Compiled {
        success,
        output: String::from_utf8(sink).expect("output is UTF-8"),
        log,
        reflection,
    }
}

fn compile_fragment(source: &str) -> Compiled {
    compile_with(
        source,
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |_| {},
    )
}

/* ----- End-to-end scenarios ----- */

#[test]
fn scenario_s1_fragment_shader_to_glsl() {
    let result = compile_fragment("float4 main() : SV_Target { return float4(1, 0, 0, 1); }");
    assert!(result.success, "reports: {:?}", result.log.reports());
    let text = &result.output;
    assert!(text.contains("#version 450"), "missing version: {}", text);
    assert!(text.contains("out vec4 xso_SV_Target;"), "missing output decl: {}", text);
    assert!(text.contains("void main()"), "missing wrapper: {}", text);
    assert!(
        text.contains("vec4(1.0f, 0.0f, 0.0f, 1.0f)"),
        "missing literal constructor: {}",
        text
    );
    assert!(
        text.contains("xso_SV_Target = "),
        "missing output assignment: {}",
        text
    );
}

#[test]
fn scenario_s2_macro_expansion_preserves_parentheses() {
    let result = compile_with(
        "#define SQR(x) ((x)*(x))\nSQR(1+2)\n",
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| options.preprocess_only = true,
    );
    assert!(result.success);
    assert_eq!(result.output, "((1+2)*(1+2))\n");
}

#[test]
fn scenario_s3_overloads_resolve_and_mangle() {
    let source = "float f(float x) { return x * 2.0; }\n\
                  float f(int x) { return 1.0; }\n\
                  float4 main() : SV_Target { return (f(1) + f(1.5f)).xxxx; }";
    let result = compile_fragment(source);
    assert!(result.success, "reports: {:?}", result.log.reports());
    let text = &result.output;
    assert!(text.contains("f_i1"), "int overload not mangled: {}", text);
    assert!(text.contains("f_f1"), "float overload not mangled: {}", text);
}

#[test]
fn scenario_s4_cbuffer_reflection() {
    let source = "cbuffer C { float4 x; };\nfloat4 main() : SV_Target { return x; }";
    let result = compile_fragment(source);
    assert!(result.success, "reports: {:?}", result.log.reports());
    assert_eq!(result.reflection.constant_buffers.len(), 1);
    let cb = &result.reflection.constant_buffers[0];
    assert_eq!(cb.ident, "C");
    assert_eq!(cb.members, vec!["x".to_string()]);
}

#[test]
fn scenario_s5_validate_only_with_syntax_error() {
    let result = compile_with(
        "float4 main( : SV_Target { return 0; }",
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| options.validate_only = true,
    );
    assert!(!result.success);
    assert!(result.log.has_errors());
    assert!(result.output.is_empty(), "sink must stay untouched");
}

#[test]
fn scenario_s6_auto_binding_implies_explicit_binding() {
    let source = "cbuffer C { float4 tint; };\nfloat4 main() : SV_Target { return tint; }";
    let result = compile_with(
        source,
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| {
            options.auto_binding = true;
            options.explicit_binding = false;
        },
    );
    assert!(result.success, "reports: {:?}", result.log.reports());
    assert!(
        result.output.contains("layout(std140, binding = 0) uniform C"),
        "missing generated layout qualifier: {}",
        result.output
    );
}

/* ----- Testable properties ----- */

#[test]
fn property_preprocessor_idempotence() {
    let source = "float4 color;\nfloat4 helper() { return color; }\n";
    let result = compile_with(
        source,
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| options.preprocess_only = true,
    );
    assert!(result.success);
    assert_eq!(result.output, source);
}

#[test]
fn property_macro_self_recursion_stops() {
    let result = compile_with(
        "#define A A\nA\n",
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| options.preprocess_only = true,
    );
    assert!(result.success);
    assert_eq!(result.output, "A\n");
}

#[test]
fn property_skipped_conditionals_produce_no_errors() {
    let source = "#if 0\n#if UNDEFINED(oops\nnot code at all $$$\n#endif\n#endif\n\
                  float4 main() : SV_Target { return float4(0, 0, 0, 1); }";
    let result = compile_fragment(source);
    assert!(result.success, "reports: {:?}", result.log.reports());
}

#[test]
fn property_pragma_once_dedups_includes() {
    let mut handler = MemoryIncludeHandler::new();
    handler.add_file(
        "common.hlsl",
        "#pragma once\nfloat4 common_color() { return float4(1, 1, 1, 1); }\n",
    );
    handler.add_file("a.hlsl", "#include \"common.hlsl\"\n");
    handler.add_file("b.hlsl", "#include \"common.hlsl\"\n");
    let source = "#include \"a.hlsl\"\n#include \"b.hlsl\"\n\
                  float4 main() : SV_Target { return common_color(); }";
    let mut input = ShaderInput::new("test.hlsl", source);
    input.shader_target = ShaderTarget::FragmentShader;
    input.include_handler = Some(&mut handler);
    let mut sink: Vec<u8> = Vec::new();
    let output = ShaderOutput::new(&mut sink);
    let mut log = StdLog::new();
    let success = compile_shader(input, output, Some(&mut log), None);
    assert!(success, "reports: {:?}", log.reports());
    let text = String::from_utf8(sink).unwrap();
    assert_eq!(
        text.matches("common_color").count(),
        2,
        "declaration plus one call expected: {}",
        text
    );
}

#[test]
fn property_ambiguous_overload_is_an_error() {
    let source = "float f(float x, int y) { return x; }\n\
                  float f(int x, float y) { return y; }\n\
                  float4 main() : SV_Target { return f(1, 1).xxxx; }";
    let result = compile_fragment(source);
    assert!(!result.success);
    assert!(result
        .log
        .reports()
        .iter()
        .any(|r| r.message.contains("ambiguous")));
}

#[test]
fn property_unreachable_declarations_not_emitted() {
    let source = "float unused_helper(float x) { return x; }\n\
                  float used_helper(float x) { return x * 2.0; }\n\
                  cbuffer UnusedBuffer { float4 unused_value; };\n\
                  float4 main() : SV_Target { return used_helper(0.5).xxxx; }";
    let result = compile_fragment(source);
    assert!(result.success, "reports: {:?}", result.log.reports());
    let text = &result.output;
    assert!(!text.contains("unused_helper"), "dead function emitted: {}", text);
    assert!(!text.contains("UnusedBuffer"), "dead cbuffer emitted: {}", text);
    assert!(text.contains("used_helper"));
}

#[test]
fn property_hlsl_round_trip_is_stable() {
    let source = "cbuffer Scene : register(b0)\n{\n    float4x4 world;\n};\n\
                  float4 main(float4 pos : POSITION) : SV_Position\n{\n    return mul(world, pos);\n}\n";
    let first = compile_with(
        source,
        ShaderTarget::VertexShader,
        OutputShaderVersion::HLSL5,
        |_| {},
    );
    assert!(first.success, "reports: {:?}", first.log.reports());
    let second = compile_with(
        &first.output,
        ShaderTarget::VertexShader,
        OutputShaderVersion::HLSL5,
        |_| {},
    );
    assert!(second.success, "reports: {:?}", second.log.reports());
    assert_eq!(first.output, second.output);
}

#[test]
fn property_validate_only_never_writes() {
    let result = compile_with(
        "float4 main() : SV_Target { return float4(0, 0, 0, 1); }",
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| options.validate_only = true,
    );
    assert!(result.success, "reports: {:?}", result.log.reports());
    assert!(result.output.is_empty());
}

/* ----- Additional pipeline coverage ----- */

#[test]
fn vertex_shader_with_struct_io() {
    let source = "struct VsIn\n{\n    float4 position : POSITION;\n    float2 uv : TEXCOORD0;\n};\n\
                  struct VsOut\n{\n    float4 position : SV_Position;\n    float2 uv : TEXCOORD0;\n};\n\
                  VsOut main(VsIn input_data)\n{\n    VsOut result;\n    result.position = input_data.position;\n    result.uv = input_data.uv;\n    return result;\n}\n";
    let result = compile_with(
        source,
        ShaderTarget::VertexShader,
        OutputShaderVersion::GLSL450,
        |_| {},
    );
    assert!(result.success, "reports: {:?}", result.log.reports());
    let text = &result.output;
    assert!(text.contains("in vec4 xsi_position;"), "missing input: {}", text);
    assert!(text.contains("in vec2 xsi_uv;"), "missing input: {}", text);
    // SV_Position routes into gl_Position instead of a declared output.
    assert!(text.contains("gl_Position"), "missing builtin routing: {}", text);
    assert!(text.contains("out vec2 xso_uv;"), "missing varying: {}", text);
    assert!(text.contains("struct VsIn"), "IO struct needed by wrapper: {}", text);
}

#[test]
fn texture_sampling_maps_to_combined_sampler() {
    let source = "Texture2D<float4> albedo : register(t0);\n\
                  SamplerState linear_sampler : register(s0);\n\
                  float4 main(float2 uv : TEXCOORD0) : SV_Target\n{\n    return albedo.Sample(linear_sampler, uv);\n}\n";
    let result = compile_with(
        source,
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| options.explicit_binding = true,
    );
    assert!(result.success, "reports: {:?}", result.log.reports());
    let text = &result.output;
    assert!(
        text.contains("layout(binding = 0) uniform sampler2D albedo;"),
        "missing combined sampler: {}",
        text
    );
    assert!(
        text.contains("texture(albedo, "),
        "Sample call not converted: {}",
        text
    );
    assert!(
        !text.contains("linear_sampler"),
        "separate sampler state leaked into output: {}",
        text
    );
}

#[test]
fn compute_shader_layout_and_reflection() {
    let source = "[numthreads(8, 4, 1)]\nvoid main(uint3 id : SV_DispatchThreadID)\n{\n}\n";
    let result = compile_with(
        source,
        ShaderTarget::ComputeShader,
        OutputShaderVersion::GLSL450,
        |_| {},
    );
    assert!(result.success, "reports: {:?}", result.log.reports());
    assert!(result
        .output
        .contains("layout(local_size_x = 8, local_size_y = 4, local_size_z = 1) in;"));
    assert_eq!(result.reflection.num_threads, [8, 4, 1]);
}

#[test]
fn essl_output_rejects_doubles() {
    let source = "double precise_value;\nfloat4 main() : SV_Target { return float4(0, 0, 0, 1); }";
    let result = compile_with(
        source,
        ShaderTarget::FragmentShader,
        OutputShaderVersion::ESSL310,
        |_| {},
    );
    assert!(!result.success);
    assert!(result
        .log
        .reports()
        .iter()
        .any(|r| r.message.contains("double")));
}

#[test]
fn intrinsics_rename_for_glsl() {
    let source = "float4 main(float2 uv : TEXCOORD0) : SV_Target\n{\n    \
                  float a = frac(uv.x);\n    float b = lerp(a, 1.0, 0.5);\n    \
                  float c = saturate(b);\n    float d = rsqrt(c + 1.0);\n    \
                  return float4(a, b, c, d);\n}\n";
    let result = compile_fragment(source);
    assert!(result.success, "reports: {:?}", result.log.reports());
    let text = &result.output;
    assert!(text.contains("fract("), "frac not renamed: {}", text);
    assert!(text.contains("mix("), "lerp not renamed: {}", text);
    assert!(text.contains("clamp(b, 0.0f, 1.0f)"), "saturate not expanded: {}", text);
    assert!(text.contains("inversesqrt("), "rsqrt not renamed: {}", text);
}

#[test]
fn optimizer_folds_constants() {
    let source = "float4 main() : SV_Target { float x = 2.0 * 3.0 + 1.0; return x.xxxx; }";
    let result = compile_with(
        source,
        ShaderTarget::FragmentShader,
        OutputShaderVersion::GLSL450,
        |options| options.optimize = true,
    );
    assert!(result.success, "reports: {:?}", result.log.reports());
    assert!(
        result.output.contains("7.0f"),
        "constant not folded: {}",
        result.output
    );
}

#[test]
fn preprocess_error_aborts_pipeline() {
    let result = compile_fragment("#error build stopped here\nfloat4 main() : SV_Target { return 0; }");
    assert!(!result.success);
    assert!(result
        .log
        .reports()
        .iter()
        .any(|r| r.message.contains("build stopped here")));
    assert!(result.output.is_empty());
}

#[test]
fn macros_reported_in_reflection() {
    let source = "#define USE_FOG 1\n#define MAX_LIGHTS 4\n\
                  float4 main() : SV_Target { return float4(0, 0, 0, MAX_LIGHTS); }";
    let result = compile_fragment(source);
    assert!(result.success, "reports: {:?}", result.log.reports());
    assert_eq!(
        result.reflection.macros,
        vec!["MAX_LIGHTS".to_string(), "USE_FOG".to_string()]
    );
}

#[test]
fn multiple_semantic_errors_reported_in_one_run() {
    let source = "float4 main() : SV_Target\n{\n    float a = missing_one;\n    float b = missing_two;\n    return float4(a, b, 0, 1);\n}\n";
    let result = compile_fragment(source);
    assert!(!result.success);
    let undefined = result
        .log
        .reports()
        .iter()
        .filter(|r| r.message.contains("undefined identifier"))
        .count();
    assert_eq!(undefined, 2);
}
