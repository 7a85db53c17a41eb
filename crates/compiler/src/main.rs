//! Rill Compiler CLI
//!
//! Command-line interface for compiling and running .rill programs.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use rillc::CompilerConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "rillc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rill compiler - compile and run .rill programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct BuildFlags {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// C compiler command (overrides the configuration)
    #[arg(long)]
    cc: Option<String>,

    /// Treat unresolved names as compile errors
    #[arg(long)]
    strict_undefined: bool,

    /// Report the path of the lowered C file
    #[arg(long)]
    keep_c: bool,

    /// Print per-phase timing to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .rill file to an executable in the cache directory
    Build {
        /// Input .rill source file
        input: PathBuf,

        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Compile a .rill file and run it, propagating its exit status
    Run {
        /// Input .rill source file
        input: PathBuf,

        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Lower a .rill file to C without invoking the C compiler
    EmitC {
        /// Input .rill source file
        input: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        flags: BuildFlags,
    },

    /// Dump the token stream or the parsed tree of a .rill file
    Inspect {
        /// Input .rill source file
        input: PathBuf,

        /// Dump the token stream
        #[arg(long)]
        tokens: bool,

        /// Dump the parsed tree (default)
        #[arg(long)]
        ast: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, flags } => {
            let config = load_config(&flags);
            match rillc::compile_file(&input, &config) {
                Ok(exe) => println!("Compiled {} -> {}", input.display(), exe.display()),
                Err(e) => fail(&e),
            }
        }
        Commands::Run { input, flags } => {
            let config = load_config(&flags);
            match rillc::run_file(&input, &config) {
                Ok(code) => process::exit(code),
                Err(e) => fail(&e),
            }
        }
        Commands::EmitC {
            input,
            output,
            flags,
        } => {
            let config = load_config(&flags);
            match rillc::compile_file_to_c(&input, &config) {
                Ok(c_code) => match output {
                    Some(path) => {
                        if let Err(e) = fs::write(&path, c_code) {
                            fail(&format!("could not write {}: {}", path.display(), e));
                        }
                        println!("C written to {}", path.display());
                    }
                    None => print!("{}", c_code),
                },
                Err(e) => fail(&e),
            }
        }
        Commands::Inspect { input, tokens, ast } => run_inspect(&input, tokens, ast),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "rillc", &mut io::stdout());
        }
    }
}

fn load_config(flags: &BuildFlags) -> CompilerConfig {
    let mut config = match &flags.config {
        Some(path) => match CompilerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                fail(&e);
            }
        },
        None => CompilerConfig::default(),
    };

    if let Some(cc) = &flags.cc {
        config.cc = cc.clone();
    }
    config.strict_undefined |= flags.strict_undefined;
    config.keep_c |= flags.keep_c;
    config.verbose = flags.verbose;
    config
}

fn run_inspect(input: &Path, tokens: bool, ast: bool) {
    let source = match fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => fail(&format!(
            "could not open input file {}: {}",
            input.display(),
            e
        )),
    };

    let config = CompilerConfig::default();
    let (module, _) = match rillc::compile_source(input, source, &config) {
        Ok(result) => result,
        Err(e) => fail(&e),
    };

    if tokens {
        print!("{}", rillc::pretty::format_tokens(&module));
    }
    if ast || !tokens {
        print!("{}", rillc::pretty::format_module(&module));
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}
