use std::fs;
use std::path::{Path, PathBuf};

use weft_abi::{resolve, Resolution};
use weft_front::{discover, load_file, GeneratorConfig};
use weft_ir::Session;

use crate::context::Emit;
use crate::cpp::emit_cpp;
use crate::error::{CodegenError, CodegenResult};
use crate::header::emit_header;
use crate::output::{write_artifacts, Artifact};
use crate::zig::emit_zig;

/// Inputs of one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Directory searched for declaration files; also holds `weft.toml`.
    pub source_root: PathBuf,
    /// Directory receiving the generated artifacts.
    pub output_root: PathBuf,
    /// Emit exception-state assertions around every native call.
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub declaration_files: usize,
    pub functions: usize,
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Runs the whole pipeline: configuration, discovery, evaluation, resolution, emission and
/// the idempotent write.
///
/// Every declaration file is evaluated and resolved before anything is written, so a
/// failing run leaves the output tree untouched.
pub fn generate(options: &GenerateOptions) -> CodegenResult<GenerateReport> {
    // --- Declarations ---
    let config = GeneratorConfig::load(&options.source_root)?;
    let decls = discover(&options.source_root, &config)?;
    let mut session = Session::new();
    for decl in &decls {
        log::debug!("evaluating {}", decl.display());
        load_file(&mut session, &options.source_root, decl, &config)?;
    }

    // --- Resolution ---
    let resolution = resolve(&mut session)?;

    // --- Emission ---
    fs::create_dir_all(&options.output_root).map_err(|source| CodegenError::Io {
        path: options.output_root.clone(),
        source,
    })?;
    let source_root = absolute(&options.source_root)?;
    let output_root = absolute(&options.output_root)?;
    let artifacts = emit_all(&session, &resolution, &config, &source_root, &output_root, options.debug);

    let report = write_artifacts(&output_root, &artifacts)?;
    log::info!(
        "{} declaration files: {} written, {} unchanged",
        decls.len(),
        report.written.len(),
        report.unchanged.len()
    );
    Ok(GenerateReport {
        declaration_files: decls.len(),
        functions: session.funcs().count(),
        written: report.written,
        unchanged: report.unchanged,
    })
}

fn absolute(path: &Path) -> CodegenResult<PathBuf> {
    fs::canonicalize(path).map_err(|source| CodegenError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders every artifact of a resolved session without touching the filesystem.
///
/// `source_root` and `output_root` only matter for the relative import and include paths
/// between artifacts.
pub fn emit_all(
    session: &Session,
    resolution: &Resolution,
    config: &GeneratorConfig,
    source_root: &Path,
    output_root: &Path,
    debug: bool,
) -> Vec<Artifact> {
    let emit = Emit::new(session, resolution, config, source_root, output_root, debug);
    let mut artifacts = vec![
        Artifact {
            path: PathBuf::from(&config.output.cpp_file),
            contents: emit_cpp(&emit),
        },
        Artifact {
            path: PathBuf::from(&config.output.zig_file),
            contents: emit_zig(&emit),
        },
    ];
    for (file, _) in emit.files() {
        artifacts.push(Artifact {
            path: PathBuf::from(config.header_name(emit.namespace(file))),
            contents: emit_header(&emit, file),
        });
    }
    artifacts
}
