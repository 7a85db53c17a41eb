//! Rill Compiler Library
//!
//! Provides compilation from .rill source to C and to executable binaries.
//!
//! The pipeline is lex -> parse -> analyze -> generate C -> link. The
//! runtime library (`librill_runtime.a`, built from the `rill-runtime`
//! crate) and its C header are embedded into this library at build time and
//! written into the cache directory, where the system C compiler links them
//! with the lowered module:
//!
//! ```text
//! cc -std=c17 -pedantic-errors -o <exe> <module>.c -L<cache> -lrill_runtime
//! ```
//!
//! The cache directory defaults to `~/.rill` and holds the runtime files,
//! one lowered C file per source path (named by an escaped path id) and the
//! linked executables.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod pretty;

pub use analyzer::analyze;
pub use ast::Module;
pub use codegen::{CodeGen, CodeGenError, generate};
pub use config::CompilerConfig;
pub use lexer::lex;
pub use parser::parse;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Instant;

/// Embedded runtime static library (located by build.rs).
static RUNTIME_LIB: &[u8] = include_bytes!(env!("RILL_RUNTIME_LIB_PATH"));

/// Embedded runtime header, the ABI the generated C targets.
static RUNTIME_HEADER: &str = include_str!("../../runtime/include/rill_runtime.h");

const RUNTIME_HEADER_NAME: &str = "rill_runtime.h";
const RUNTIME_LIB_NAME: &str = "librill_runtime.a";

/// Cache for the C-compiler availability check; it runs once per process.
static CC_CHECKED: OnceLock<Result<(), String>> = OnceLock::new();

fn check_cc(cc: &str) -> Result<(), String> {
    CC_CHECKED
        .get_or_init(|| {
            let output = Command::new(cc).arg("--version").output().map_err(|e| {
                format!(
                    "failed to run {}: {}. A C compiler is required to link Rill programs.",
                    cc, e
                )
            })?;
            if !output.status.success() {
                return Err(format!(
                    "{} --version failed with exit code {:?}",
                    cc,
                    output.status.code()
                ));
            }
            Ok(())
        })
        .clone()
}

/// Encode a path as a flat cache file name: alphanumeric bytes pass
/// through, everything else becomes `_` plus two letters carrying the
/// nibbles (`'A' + nibble`).
pub fn path_id(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for &byte in path.as_bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte as char);
        } else {
            out.push('_');
            out.push((b'A' + (byte >> 4)) as char);
            out.push((b'A' + (byte & 0xf)) as char);
        }
    }
    out
}

/// Run the front end on a source string. Returns the analyzed module and
/// the lowered C text.
pub fn compile_source(
    filename: &Path,
    source: String,
    config: &CompilerConfig,
) -> Result<(Module, String), String> {
    let mut module = Module::new(filename.to_path_buf(), source);

    let start = Instant::now();
    let (tokens, interner) = lexer::lex(&module.source)?;
    module.tokens = tokens;
    module.interner = interner;
    let lexed = Instant::now();

    parser::parse(&mut module)?;
    let parsed = Instant::now();

    analyzer::analyze(&mut module, config.strict_undefined)?;
    let analyzed = Instant::now();

    let c_code = codegen::generate(&module).map_err(|e| e.to_string())?;

    if config.verbose {
        eprintln!(
            "[rillc] lex {:?}, parse {:?}, analyze {:?}, generate {:?}",
            lexed - start,
            parsed - lexed,
            analyzed - parsed,
            analyzed.elapsed()
        );
    }

    Ok((module, c_code))
}

/// Lower a source file to C text.
pub fn compile_file_to_c(path: &Path, config: &CompilerConfig) -> Result<String, String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("could not open input file {}: {}", path.display(), e))?;
    let (_, c_code) = compile_source(path, source, config)?;
    Ok(c_code)
}

fn cache_dir(config: &CompilerConfig) -> Result<PathBuf, String> {
    let dir = match &config.cache_dir {
        Some(dir) => dir.clone(),
        None => home::home_dir()
            .ok_or_else(|| "could not determine the home directory".to_string())?
            .join(".rill"),
    };
    fs::create_dir_all(&dir)
        .map_err(|e| format!("could not create cache directory {}: {}", dir.display(), e))?;
    Ok(dir)
}

fn write_runtime_resources(cache: &Path) -> Result<(), String> {
    let header = cache.join(RUNTIME_HEADER_NAME);
    fs::write(&header, RUNTIME_HEADER)
        .map_err(|e| format!("could not write {}: {}", header.display(), e))?;
    let lib = cache.join(RUNTIME_LIB_NAME);
    fs::write(&lib, RUNTIME_LIB)
        .map_err(|e| format!("could not write {}: {}", lib.display(), e))?;
    Ok(())
}

/// Compile a source file to an executable in the cache directory and
/// return the executable's path.
pub fn compile_file(path: &Path, config: &CompilerConfig) -> Result<PathBuf, String> {
    check_cc(&config.cc)?;

    let path = path
        .canonicalize()
        .map_err(|e| format!("could not open input file {}: {}", path.display(), e))?;
    let source = fs::read_to_string(&path)
        .map_err(|e| format!("could not open input file {}: {}", path.display(), e))?;
    let (module, c_code) = compile_source(&path, source, config)?;

    let cache = cache_dir(config)?;
    write_runtime_resources(&cache)?;

    let c_path = cache.join(format!("{}.c", module.path_id));
    fs::write(&c_path, c_code)
        .map_err(|e| format!("could not write {}: {}", c_path.display(), e))?;
    if config.keep_c {
        println!("C written to {}", c_path.display());
    }

    let exe_path = cache.join(&module.path_id);
    let start = Instant::now();
    let output = Command::new(&config.cc)
        .args(["-std=c17", "-pedantic-errors"])
        .arg(&c_path)
        .arg("-o")
        .arg(&exe_path)
        .arg("-L")
        .arg(&cache)
        .args(["-lrill_runtime", "-lpthread", "-ldl", "-lm"])
        .output()
        .map_err(|e| format!("failed to run {}: {}", config.cc, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("C compilation failed:\n{}", stderr));
    }
    if config.verbose {
        eprintln!("[rillc] link {:?}", start.elapsed());
    }

    Ok(exe_path)
}

/// Compile and execute a source file, returning the program's exit code.
pub fn run_file(path: &Path, config: &CompilerConfig) -> Result<i32, String> {
    let exe = compile_file(path, config)?;
    let status = Command::new(&exe)
        .status()
        .map_err(|e| format!("failed to run {}: {}", exe.display(), e))?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_id_passes_alphanumerics() {
        assert_eq!(path_id("abc123"), "abc123");
    }

    #[test]
    fn test_path_id_escapes_other_bytes() {
        // '/' is 0x2f -> "_CP", '.' is 0x2e -> "_CO"
        assert_eq!(path_id("a/b.rill"), "a_CPb_COrill");
    }

    #[test]
    fn test_path_id_is_injective_on_samples() {
        let samples = ["a/b", "a_b", "a.b", "a b", "ab"];
        let mut encoded: Vec<String> = samples.iter().map(|s| path_id(s)).collect();
        encoded.sort();
        encoded.dedup();
        assert_eq!(encoded.len(), samples.len());
    }

    #[test]
    fn test_compile_source_end_to_end() {
        let config = CompilerConfig::default();
        let (module, c_code) = compile_source(
            Path::new("demo.rill"),
            "print 1 + 2 * 3;".to_string(),
            &config,
        )
        .unwrap();
        assert_eq!(module.path_id, "demo_COrill");
        assert!(c_code.contains("INT_VALUE(7)"));
    }

    #[test]
    fn test_compile_source_reports_errors_with_carat() {
        let config = CompilerConfig::default();
        let err = compile_source(
            Path::new("demo.rill"),
            "var x;\nvar x;".to_string(),
            &config,
        )
        .unwrap_err();
        assert!(err.contains("name x already declared"));
        assert!(err.contains('^'));
    }

    #[test]
    fn test_runtime_header_is_embedded() {
        assert!(RUNTIME_HEADER.contains("rill_check_var"));
        assert!(RUNTIME_HEADER.contains("struct ScopeFrame"));
    }
}
