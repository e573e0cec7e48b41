//! stackbind CLI
//!
//! Load a script, call one of its functions with typed arguments, and
//! print the results or any global tables it built.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use stackbind::{
    CallSignature, Payload, Script, ScriptConfig, ScriptError, TaggedValue, ValueType,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "stackbind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run stackbind scripts and call their functions with typed values", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a script and optionally call a function in it
    Run {
        /// Script source file
        script: PathBuf,

        /// Script configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Function to call after loading
        #[arg(long)]
        call: Option<String>,

        /// Argument as TYPE:VALUE (int, float, double, bool, string)
        #[arg(long = "arg", value_name = "TYPE:VALUE")]
        args: Vec<String>,

        /// Expected return type, in order
        #[arg(long = "ret", value_name = "TYPE")]
        rets: Vec<String>,

        /// Global table to print after running
        #[arg(long = "dump", value_name = "GLOBAL")]
        dumps: Vec<String>,
    },

    /// Parse and load a script without calling anything
    Check {
        /// Script source file
        script: PathBuf,

        /// Script configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stackbind=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            config,
            call,
            args,
            rets,
            dumps,
        } => {
            run_script(&script, config.as_deref(), call.as_deref(), &args, &rets, &dumps);
        }
        Commands::Check { script, config } => {
            run_check(&script, config.as_deref());
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "stackbind", &mut io::stdout());
}

fn run_check(script: &Path, config: Option<&Path>) {
    let mut loaded = match prepare_script(script, config, None) {
        Ok(s) => s,
        Err(e) => fail(e),
    };
    match loaded.compile() {
        Ok(()) => println!("{}: ok", script.display()),
        Err(e) => fail(e),
    }
}

fn run_script(
    script: &Path,
    config: Option<&Path>,
    call: Option<&str>,
    args: &[String],
    rets: &[String],
    dumps: &[String],
) {
    let mut loaded = match prepare_script(script, config, call) {
        Ok(s) => s,
        Err(e) => fail(e),
    };

    // Signatures are registered before the script defines its words
    if let Some(name) = call {
        let signature = match build_signature(args, rets) {
            Ok(sig) => sig,
            Err(msg) => fail(msg),
        };
        if let Err(e) = loaded.register(name, signature) {
            fail(e);
        }
    }

    if let Err(e) = loaded.compile() {
        fail(e);
    }
    info!(script = %script.display(), "loaded");

    if let Some(name) = call {
        match loaded.invoke(name) {
            Ok(returns) => {
                for (i, value) in returns.iter().enumerate() {
                    println!("[{}] {}", i + 1, format_value(value));
                }
            }
            Err(e) => fail(e),
        }
    }

    for global in dumps {
        match loaded.global_table(global) {
            Ok(mut table) => table.print(),
            Err(e) => fail(e),
        }
    }
}

/// Build a `Script` from the optional config with the builtin host
/// callables registered; nothing is loaded yet
///
/// A builtin named by `call` is left out so the `--call` signature can
/// claim the name. Words the script defines with a builtin's name replace
/// it once the script is loaded.
fn prepare_script(
    script: &Path,
    config: Option<&Path>,
    call: Option<&str>,
) -> Result<Script, ScriptError> {
    let config = match config {
        Some(path) => ScriptConfig::load(path)?,
        None => ScriptConfig::default(),
    }
    .with_script(script);

    let mut prepared = Script::with_config(&config)?;
    if call != Some(LOG) {
        register_log(&mut prepared)?;
    } else {
        debug!("'{}' requested by --call; builtin not registered", LOG);
    }
    Ok(prepared)
}

const LOG: &str = "log";

/// `log` ( msg -- ): print a message from the script
fn register_log(script: &mut Script) -> Result<(), ScriptError> {
    let signature = CallSignature::new().with_arg(String::new());
    script.register_fn(LOG, signature, |call| {
        let message = call.to_string(1)?;
        println!("log from script: {}", message);
        Ok(())
    })
}

fn build_signature(args: &[String], rets: &[String]) -> Result<CallSignature, String> {
    let mut signature = CallSignature::new();
    for arg in args {
        signature.add_tagged_arg(parse_arg(arg)?);
    }
    for name in rets {
        let ty = ValueType::from_name(name)
            .ok_or_else(|| format!("Unknown return type '{}'", name))?;
        signature.add_ret(ty);
    }
    Ok(signature)
}

fn parse_arg(arg: &str) -> Result<TaggedValue, String> {
    let (ty_name, raw) = arg
        .split_once(':')
        .ok_or_else(|| format!("Argument '{}' must be written TYPE:VALUE", arg))?;
    let ty = ValueType::from_name(ty_name)
        .ok_or_else(|| format!("Unknown argument type '{}'", ty_name))?;
    let invalid = |e: String| format!("Invalid {} value '{}': {}", ty, raw, e);

    match ty {
        ValueType::None => Ok(TaggedValue::new()),
        ValueType::Integer => raw
            .parse::<i64>()
            .map(TaggedValue::of)
            .map_err(|e| invalid(e.to_string())),
        ValueType::Float => raw
            .parse::<f32>()
            .map(TaggedValue::of)
            .map_err(|e| invalid(e.to_string())),
        ValueType::Double => raw
            .parse::<f64>()
            .map(TaggedValue::of)
            .map_err(|e| invalid(e.to_string())),
        ValueType::Boolean => raw
            .parse::<bool>()
            .map(TaggedValue::of)
            .map_err(|e| invalid(e.to_string())),
        ValueType::String => Ok(TaggedValue::from(raw)),
        ValueType::Table => Err("Table arguments cannot be given on the command line".to_string()),
    }
}

fn format_value(value: &TaggedValue) -> String {
    match value.payload() {
        None => "none".to_string(),
        Some(Payload::Integer(n)) => n.to_string(),
        Some(Payload::Float(f)) => f.to_string(),
        Some(Payload::Double(d)) => d.to_string(),
        Some(Payload::Boolean(b)) => b.to_string(),
        Some(Payload::String(s)) => s.clone(),
        Some(Payload::Table(t)) => t.clone().render().trim_end().to_string(),
    }
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", err);
    process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn script_file(dir: &tempfile::TempDir, source: &str) -> PathBuf {
        let path = dir.path().join("main.sb");
        fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_builtin_log_registered() {
        let dir = tempfile::tempdir().unwrap();
        let path = script_file(&dir, ": shout ( -- ) \"hi\" log ;");
        let mut script = prepare_script(&path, None, None).unwrap();
        assert!(script.is_registered(LOG));
        script.compile().unwrap();
        assert!(script.call("shout", &CallSignature::new()).is_ok());
    }

    #[test]
    fn test_call_log_skips_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = script_file(&dir, ": log ( -- n ) 7 ;");
        let mut script = prepare_script(&path, None, Some(LOG)).unwrap();
        assert!(!script.is_registered(LOG));

        let signature = build_signature(&[], &["int".to_string()]).unwrap();
        script.register(LOG, signature).unwrap();
        script.compile().unwrap();
        let out = script.invoke(LOG).unwrap();
        assert_eq!(out.get::<i64>(0), Ok(&7));
    }

    #[test]
    fn test_parse_arg() {
        assert_eq!(parse_arg("int:5").unwrap().retrieve::<i64>(), Ok(&5));
        assert!(parse_arg("int:five").is_err());
        assert!(parse_arg("5").is_err());
        assert!(parse_arg("table:x").is_err());
    }
}
