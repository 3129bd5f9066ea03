use clap::{Parser, ValueEnum};
use log::info;
use slx_core::{
    compile_shader, print_reflection, Formatting, InputShaderVersion, Log, NameMangling, Options,
    OutputShaderVersion, ReflectionData, Report, ReportKind, ShaderInput, ShaderOutput,
    ShaderTarget, StdIncludeHandler,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "slx")]
#[command(about = "HLSL to GLSL/ESSL/VKSL shader cross-compiler", long_about = None)]
struct Cli {
    /// Input shader files
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Shader entry point
    #[arg(short = 'E', long, default_value = "main")]
    entry: String,

    /// Secondary entry point (e.g. the patch constant function)
    #[arg(long)]
    entry2: Option<String>,

    /// Shader stage of the entry point
    #[arg(short = 'T', long, value_enum, default_value_t = TargetArg::Vertex)]
    target: TargetArg,

    /// Input shader model
    #[arg(long, value_enum, default_value_t = InputVersionArg::Hlsl5)]
    input_version: InputVersionArg,

    /// Output shader dialect and version
    #[arg(short = 'V', long, value_enum, default_value_t = OutputVersionArg::Glsl450)]
    output_version: OutputVersionArg,

    /// Output file; with multiple inputs the default naming applies
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Include search directory (repeatable)
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Predefine a macro as NAME or NAME=VALUE (repeatable)
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Emit the preprocessed stream and stop
    #[arg(short = 'P', long)]
    preprocess_only: bool,

    /// Run all checks but write no output
    #[arg(short = 'C', long)]
    validate_only: bool,

    /// Enable constant folding and dead code removal
    #[arg(short = 'O', long)]
    optimize: bool,

    /// Keep source comments in the output
    #[arg(long)]
    comments: bool,

    /// Allow GLSL extensions in the output
    #[arg(long)]
    extensions: bool,

    /// Generate layout qualifiers with automatic binding slots
    #[arg(long)]
    auto_binding: bool,

    /// Generate layout qualifiers from explicit register slots
    #[arg(long)]
    explicit_binding: bool,

    /// Align matrices row major
    #[arg(long)]
    row_major: bool,

    /// Dump the decorated AST
    #[arg(long)]
    show_ast: bool,

    /// Print code reflection after a successful compile
    #[arg(short = 'R', long)]
    reflect: bool,

    /// Print verbose progress output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Vertex,
    TessControl,
    TessEval,
    Geometry,
    Fragment,
    Compute,
}

impl From<TargetArg> for ShaderTarget {
    fn from(target: TargetArg) -> Self {
        match target {
            TargetArg::Vertex => ShaderTarget::VertexShader,
            TargetArg::TessControl => ShaderTarget::TessellationControlShader,
            TargetArg::TessEval => ShaderTarget::TessellationEvaluationShader,
            TargetArg::Geometry => ShaderTarget::GeometryShader,
            TargetArg::Fragment => ShaderTarget::FragmentShader,
            TargetArg::Compute => ShaderTarget::ComputeShader,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InputVersionArg {
    Hlsl3,
    Hlsl4,
    Hlsl5,
}

impl From<InputVersionArg> for InputShaderVersion {
    fn from(version: InputVersionArg) -> Self {
        match version {
            InputVersionArg::Hlsl3 => InputShaderVersion::HLSL3,
            InputVersionArg::Hlsl4 => InputShaderVersion::HLSL4,
            InputVersionArg::Hlsl5 => InputShaderVersion::HLSL5,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputVersionArg {
    Glsl110,
    Glsl120,
    Glsl130,
    Glsl140,
    Glsl150,
    Glsl330,
    Glsl400,
    Glsl410,
    Glsl420,
    Glsl430,
    Glsl440,
    Glsl450,
    Essl100,
    Essl300,
    Essl310,
    Essl320,
    Vksl450,
    Hlsl5,
}

impl From<OutputVersionArg> for OutputShaderVersion {
    fn from(version: OutputVersionArg) -> Self {
        use OutputVersionArg::*;
        match version {
            Glsl110 => OutputShaderVersion::GLSL110,
            Glsl120 => OutputShaderVersion::GLSL120,
            Glsl130 => OutputShaderVersion::GLSL130,
            Glsl140 => OutputShaderVersion::GLSL140,
            Glsl150 => OutputShaderVersion::GLSL150,
            Glsl330 => OutputShaderVersion::GLSL330,
            Glsl400 => OutputShaderVersion::GLSL400,
            Glsl410 => OutputShaderVersion::GLSL410,
            Glsl420 => OutputShaderVersion::GLSL420,
            Glsl430 => OutputShaderVersion::GLSL430,
            Glsl440 => OutputShaderVersion::GLSL440,
            Glsl450 => OutputShaderVersion::GLSL450,
            Essl100 => OutputShaderVersion::ESSL100,
            Essl300 => OutputShaderVersion::ESSL300,
            Essl310 => OutputShaderVersion::ESSL310,
            Essl320 => OutputShaderVersion::ESSL320,
            Vksl450 => OutputShaderVersion::VKSL450,
            Hlsl5 => OutputShaderVersion::HLSL5,
        }
    }
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Forwards reports to stderr and tracks the error count for the exit
/// code.
#[derive(Default)]
struct CliLog {
    errors: usize,
}

impl Log for CliLog {
    fn submit_report(&mut self, report: Report) {
        if report.kind == ReportKind::Error {
            self.errors += 1;
        }
        eprintln!("{}", report);
        for hint in &report.hints {
            eprintln!("  note: {}", hint);
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut failed = false;
    for input in &cli.inputs {
        match compile_file(&cli, input) {
            Ok(true) => {}
            Ok(false) => failed = true,
            Err(err) => {
                eprintln!("error: {}", err);
                failed = true;
            }
        }
        // Per-file state such as the output filename resets here; only
        // the explicitly given flags carry over to the next input.
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Default output name: `<input-stem>.<entry>.<ext>` next to the input.
fn default_output_path(input: &Path, entry: &str, target: ShaderTarget, version: OutputShaderVersion) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "shader".into());
    let ext = if version.is_hlsl() { "hlsl" } else { target.file_ext() };
    input.with_file_name(format!("{}.{}.{}", stem, entry, ext))
}

fn compile_file(cli: &Cli, input_path: &Path) -> Result<bool, DriverError> {
    if cli.verbose {
        info!("compiling {}...", input_path.display());
    }

    let mut source = String::new();
    for define in &cli.defines {
        match define.split_once('=') {
            Some((name, value)) => source.push_str(&format!("#define {} {}\n", name, value)),
            None => source.push_str(&format!("#define {} 1\n", define)),
        }
    }
    source.push_str(&fs::read_to_string(input_path)?);

    let mut include_handler = StdIncludeHandler::with_search_paths(cli.include_dirs.clone());
    let target = ShaderTarget::from(cli.target);
    let output_version = OutputShaderVersion::from(cli.output_version);

    let input = ShaderInput {
        filename: input_path.to_string_lossy().into_owned(),
        entry_point: cli.entry.clone(),
        secondary_entry_point: cli.entry2.clone(),
        shader_target: target,
        shader_version: cli.input_version.into(),
        source_code: &source,
        include_handler: Some(&mut include_handler),
        warnings: slx_core::warnings::ALL,
        extensions: 0,
    };

    let mut generated: Vec<u8> = Vec::new();
    let output = ShaderOutput {
        source_code: &mut generated,
        shader_version: output_version,
        options: Options {
            preprocess_only: cli.preprocess_only,
            validate_only: cli.validate_only,
            optimize: cli.optimize,
            preserve_comments: cli.comments,
            allow_extensions: cli.extensions,
            separate_shaders: false,
            auto_binding: cli.auto_binding,
            explicit_binding: cli.explicit_binding,
            row_major_alignment: cli.row_major,
            show_ast: cli.show_ast,
        },
        formatting: Formatting::default(),
        name_mangling: NameMangling::default(),
        vertex_semantics: Vec::new(),
        fragment_semantics: Vec::new(),
    };

    let mut log = CliLog::default();
    let mut reflection = cli.reflect.then(ReflectionData::default);
    let success = compile_shader(input, output, Some(&mut log), reflection.as_mut());

    if !success || log.errors > 0 {
        return Ok(false);
    }

    if !cli.validate_only {
        let output_path = cli
            .output
            .clone()
            .filter(|_| cli.inputs.len() == 1)
            .unwrap_or_else(|| default_output_path(input_path, &cli.entry, target, output_version));
        fs::write(&output_path, &generated)?;
        if cli.verbose {
            info!("wrote {}", output_path.display());
        }
    }

    if let Some(reflection) = &reflection {
        print!("{}", print_reflection(reflection));
    }

    Ok(true)
}
