//! slx-core: HLSL to GLSL/ESSL/VKSL source-to-source cross compiler.
//!
//! The pipeline is strictly linear: preprocess, parse, analyze,
//! transform, then either generate target code or stop after validation.
//! Stages communicate through the shared log sink and the input/output
//! descriptors; a failed stage skips everything after it.

pub mod analyzer;
pub mod ast;
pub mod ast_printer;
pub mod error;
pub mod eval;
pub mod generator;
pub mod include_handler;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod preprocessor;
pub mod reflection;
pub mod report;
pub mod source;
pub mod symbol_table;
pub mod token;
pub mod transformer;
pub mod type_denoter;
pub mod visitor;
pub mod writer;

pub use error::{CompilerError, Result};
pub use include_handler::{IncludeHandler, MemoryIncludeHandler, StdIncludeHandler};
pub use options::{
    warnings, Formatting, InputShaderVersion, NameMangling, Options, OutputShaderVersion,
    SemanticBinding, ShaderTarget,
};
pub use reflection::{print_reflection, ReflectionData};
pub use report::{Log, Report, ReportKind, StdLog};

use analyzer::{Analyzer, AnalyzerContext};
use ast_printer::AstPrinter;
use generator::{GlslGenerator, HlslGenerator};
use log::debug;
use parser::Parser;
use preprocessor::Preprocessor;
use reflection::ReflectionAnalyzer;
use report::ReportHandler;
use source::SourceCode;
use std::io::{self, Write};
use transformer::converter::Converter;
use transformer::func_names::FuncNameConverter;
use transformer::optimizer::Optimizer;
use transformer::reference::ReferenceAnalyzer;
use transformer::struct_params::StructParameterAnalyzer;

/// Input descriptor of one compilation.
pub struct ShaderInput<'a> {
    pub filename: String,
    pub entry_point: String,
    pub secondary_entry_point: Option<String>,
    pub shader_target: ShaderTarget,
    pub shader_version: InputShaderVersion,
    pub source_code: &'a str,
    pub include_handler: Option<&'a mut dyn IncludeHandler>,
    /// Bitmask over `warnings::*`.
    pub warnings: u32,
    /// Language extension bitmask; extensions are not supported by this
    /// build and produce a warning when requested.
    pub extensions: u32,
}

impl<'a> ShaderInput<'a> {
    pub fn new(filename: impl Into<String>, source_code: &'a str) -> Self {
        ShaderInput {
            filename: filename.into(),
            entry_point: "main".into(),
            secondary_entry_point: None,
            shader_target: ShaderTarget::VertexShader,
            shader_version: InputShaderVersion::HLSL5,
            source_code,
            include_handler: None,
            warnings: warnings::ALL,
            extensions: 0,
        }
    }
}

/// Output descriptor of one compilation.
pub struct ShaderOutput<'a> {
    pub source_code: &'a mut dyn Write,
    pub shader_version: OutputShaderVersion,
    pub options: Options,
    pub formatting: Formatting,
    pub name_mangling: NameMangling,
    pub vertex_semantics: Vec<SemanticBinding>,
    pub fragment_semantics: Vec<SemanticBinding>,
}

impl<'a> ShaderOutput<'a> {
    pub fn new(source_code: &'a mut dyn Write) -> Self {
        ShaderOutput {
            source_code,
            shader_version: OutputShaderVersion::default(),
            options: Options::default(),
            formatting: Formatting::default(),
            name_mangling: NameMangling::default(),
            vertex_semantics: Vec::new(),
            fragment_semantics: Vec::new(),
        }
    }
}

fn reborrow_log<'a>(log: &'a mut Option<&mut dyn Log>) -> Option<&'a mut dyn Log> {
    match log {
        Some(l) => Some(&mut **l),
        None => None,
    }
}

fn validate_arguments(target: ShaderTarget, mangling: &NameMangling) -> Result<()> {
    if target == ShaderTarget::Undefined {
        return Err(CompilerError::ArgumentError(
            "shader target must not be undefined".into(),
        ));
    }
    if mangling.reserved_word_prefix.is_empty() {
        return Err(CompilerError::ArgumentError(
            "name mangling prefix for reserved words must not be empty".into(),
        ));
    }
    if mangling.temporary_prefix.is_empty() {
        return Err(CompilerError::ArgumentError(
            "name mangling prefix for temporaries must not be empty".into(),
        ));
    }
    let prefixes = [
        &mangling.input_prefix,
        &mangling.output_prefix,
        &mangling.reserved_word_prefix,
        &mangling.temporary_prefix,
        &mangling.namespace_prefix,
    ];
    for (i, a) in prefixes.iter().enumerate() {
        for b in prefixes.iter().skip(i + 1) {
            if !a.is_empty() && a == b {
                return Err(CompilerError::ArgumentError(
                    "name mangling prefixes must be pairwise distinct".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Cross compile one shader. All diagnostics go into `log`; the return
/// value is the overall verdict. With `Options::validate_only` the sink
/// receives no bytes; with `Options::preprocess_only` the preprocessed
/// stream is emitted verbatim and all later stages are skipped.
pub fn compile_shader(
    input: ShaderInput,
    output: ShaderOutput,
    mut log: Option<&mut dyn Log>,
    mut reflection_data: Option<&mut ReflectionData>,
) -> bool {
    {
        let mut handler = ReportHandler::new(reborrow_log(&mut log), "compiler");
        if let Err(err) = validate_arguments(input.shader_target, &output.name_mangling) {
            handler.submit_error(&err);
            return false;
        }
        if input.extensions != 0 {
            handler.warning(
                "language extensions are not supported by this build",
                source::SourceArea::ZERO,
            );
        }
    }

    let ShaderOutput {
        source_code: sink,
        shader_version: output_version,
        mut options,
        formatting,
        name_mangling,
        vertex_semantics,
        fragment_semantics,
    } = output;

    // 'auto_binding' assigns locations itself, which only makes sense
    // with explicit binding emission.
    if options.auto_binding {
        options.explicit_binding = true;
    }

    let mut null_sink = io::sink();
    let sink: &mut dyn Write = if options.validate_only { &mut null_sink } else { sink };

    let ShaderInput {
        filename,
        entry_point,
        secondary_entry_point,
        shader_target,
        shader_version: _,
        source_code,
        include_handler,
        warnings: warning_mask,
        extensions: _,
    } = input;

    /* ----- Pre-processing ----- */

    debug!("stage: preprocessor");
    let mut std_include_handler;
    let include_handler: &mut dyn IncludeHandler = match include_handler {
        Some(handler) => handler,
        None => {
            std_include_handler = StdIncludeHandler::new();
            &mut std_include_handler
        }
    };

    let mut preprocessor = Preprocessor::new(include_handler, reborrow_log(&mut log))
        .with_warnings(warning_mask & warnings::PREPROCESSOR != 0);
    let processed = preprocessor.process(&SourceCode::new(filename, source_code));
    if let Some(data) = reflection_data.as_deref_mut() {
        data.macros = preprocessor.list_defined_macro_idents();
    }
    drop(preprocessor);

    let Some(processed) = processed else {
        return submit_stage_error(log, "preprocessing source code failed");
    };

    if options.preprocess_only {
        if sink.write_all(processed.as_bytes()).is_err() {
            return submit_stage_error(log, "writing preprocessed output failed");
        }
        return true;
    }

    /* ----- Parsing ----- */

    debug!("stage: parser");
    let program = {
        let (tokens, lex_errors) = lexer::tokenize(&processed, options.preserve_comments);
        let mut parser = Parser::new(tokens, reborrow_log(&mut log))
            .with_warnings(warning_mask & warnings::SYNTAX != 0);
        let had_lex_errors = !lex_errors.is_empty();
        for err in &lex_errors {
            parser.submit_error(err);
        }
        let program = parser.parse_program();
        if had_lex_errors {
            None
        } else {
            program
        }
    };
    let Some(mut program) = program else {
        return submit_stage_error(log, "parsing source code failed");
    };

    /* ----- Context analysis ----- */

    debug!("stage: analyzer");
    let analyzed = {
        let mut analyzer = Analyzer::new(reborrow_log(&mut log));
        let ctx = AnalyzerContext {
            entry_point: &entry_point,
            secondary_entry_point: secondary_entry_point.as_deref(),
            shader_target,
            output_version,
            name_mangling: &name_mangling,
            warnings_enabled: warning_mask & warnings::SEMANTICS != 0,
        };
        analyzer.decorate(&mut program, &ctx)
    };

    if options.show_ast {
        if let Some(log) = reborrow_log(&mut log) {
            for line in AstPrinter::print_program(&program).lines() {
                log.submit_report(Report::new(ReportKind::Info, line).with_context("ast"));
            }
        }
    }

    if !analyzed {
        return submit_stage_error(log, "context analysis failed");
    }

    /* ----- Optimization ----- */

    if options.optimize {
        debug!("stage: optimizer");
        Optimizer::optimize(&mut program);
    }

    /* ----- AST transformation ----- */

    debug!("stage: transformers");
    ReferenceAnalyzer::mark_references_from_entry_point(&mut program);
    if output_version.is_glsl_family() {
        StructParameterAnalyzer::mark_non_io_struct_usage(&mut program);
        FuncNameConverter::convert_function_names(&mut program, &name_mangling);
        Converter::convert_for_glsl(&mut program);
    }

    /* ----- Code generation ----- */

    debug!("stage: generator");
    let generated = if output_version.is_glsl_family() {
        GlslGenerator::new(
            shader_target,
            output_version,
            &options,
            &formatting,
            &name_mangling,
            &vertex_semantics,
            &fragment_semantics,
        )
        .generate_code(&program)
    } else {
        HlslGenerator::new(&options, &formatting).generate_code(&program)
    };

    let generated = match generated {
        Ok(text) => text,
        Err(err) => {
            if let Some(log) = reborrow_log(&mut log) {
                log.submit_report(
                    Report::new(ReportKind::Error, err.to_string()).with_context("generator"),
                );
            }
            return submit_stage_error(log, "generating output code failed");
        }
    };
    if sink.write_all(generated.as_bytes()).is_err() {
        return submit_stage_error(log, "writing output code failed");
    }

    /* ----- Code reflection ----- */

    if let Some(data) = reflection_data {
        debug!("stage: reflection");
        ReflectionAnalyzer::new(data, shader_target, options.auto_binding).reflect(&program);
    }

    true
}

fn submit_stage_error(log: Option<&mut dyn Log>, message: &str) -> bool {
    if let Some(log) = log {
        log.submit_report(Report::new(ReportKind::Error, message).with_context("compiler"));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_target_is_argument_error() {
        let source = "float4 main() : SV_Target { return float4(0, 0, 0, 0); }";
        let mut input = ShaderInput::new("test.hlsl", source);
        input.shader_target = ShaderTarget::Undefined;
        let mut sink = Vec::new();
        let output = ShaderOutput::new(&mut sink);
        let mut log = StdLog::new();
        assert!(!compile_shader(input, output, Some(&mut log), None));
        assert!(log
            .reports()
            .iter()
            .any(|r| r.message.contains("shader target")));
    }

    #[test]
    fn test_overlapping_mangling_prefixes_rejected() {
        let source = "float4 main() : SV_Target { return float4(0, 0, 0, 0); }";
        let mut input = ShaderInput::new("test.hlsl", source);
        input.shader_target = ShaderTarget::FragmentShader;
        let mut sink = Vec::new();
        let mut output = ShaderOutput::new(&mut sink);
        output.name_mangling.input_prefix = "dup_".into();
        output.name_mangling.output_prefix = "dup_".into();
        let mut log = StdLog::new();
        assert!(!compile_shader(input, output, Some(&mut log), None));
        assert!(log
            .reports()
            .iter()
            .any(|r| r.message.contains("pairwise distinct")));
    }

    #[test]
    fn test_empty_reserved_prefix_rejected() {
        let source = "float4 main() : SV_Target { return float4(0, 0, 0, 0); }";
        let mut input = ShaderInput::new("test.hlsl", source);
        input.shader_target = ShaderTarget::FragmentShader;
        let mut sink = Vec::new();
        let mut output = ShaderOutput::new(&mut sink);
        output.name_mangling.reserved_word_prefix = String::new();
        let mut log = StdLog::new();
        assert!(!compile_shader(input, output, Some(&mut log), None));
    }
}
