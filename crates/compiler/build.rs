//! Build script for rill-compiler
//!
//! Locates the rill-runtime static library so it can be embedded into the
//! compiler binary and written out next to generated C files at build time.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // OUT_DIR = target/<profile>/build/<pkg>-<hash>/out
    // The staticlib lands in target/<profile>/librill_runtime.a or in
    // target/<profile>/deps/librill_runtime-<hash>.a
    let target_dir = out_dir
        .parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .expect("Could not find target directory");

    let direct_lib = target_dir.join("librill_runtime.a");

    let runtime_lib = if direct_lib.exists() {
        direct_lib
    } else {
        let deps_dir = target_dir.join("deps");
        find_runtime_in_deps(&deps_dir).unwrap_or_else(|| {
            panic!(
                "Runtime library not found.\n\
                 Looked in: {}\n\
                 And deps: {}\n\
                 OUT_DIR was: {}",
                direct_lib.display(),
                deps_dir.display(),
                out_dir.display()
            )
        })
    };

    // Consumed by include_bytes! in lib.rs
    println!(
        "cargo:rustc-env=RILL_RUNTIME_LIB_PATH={}",
        runtime_lib.display()
    );

    println!("cargo:rerun-if-changed={}", runtime_lib.display());
}

fn find_runtime_in_deps(deps_dir: &Path) -> Option<PathBuf> {
    if !deps_dir.exists() {
        return None;
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(deps_dir).ok()?.flatten() {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with("librill_runtime") && name_str.ends_with(".a") {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, entry.path()));
            }
        }
    }

    newest.map(|(_, path)| path)
}
