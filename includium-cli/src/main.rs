#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! `pcpp`: a standalone command-line front end for the `includium` C
//! preprocessor library.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use includium::{PreprocessorConfig, PreprocessorDriver};
use std::cell::RefCell;
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

/// A C preprocessor, distributed separately from any particular compiler.
#[derive(Parser, Debug)]
#[command(name = "pcpp", version, about = "Standalone C preprocessor")]
struct Args {
    /// Input files; `-` or absent means standard input.
    files: Vec<String>,

    /// Output path (default: standard output).
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Predefine NAME (optionally =VALUE, default 1).
    #[arg(short = 'D', value_name = "NAME[=VAL]")]
    defines: Vec<String>,

    /// Pre-undefine NAME.
    #[arg(short = 'U', value_name = "NAME")]
    undefines: Vec<String>,

    /// Never-define NAME: later #define/#undef of it passes through unexecuted.
    #[arg(short = 'N', value_name = "NAME")]
    never_define: Vec<String>,

    /// Append a user include search path.
    #[arg(short = 'I', value_name = "PATH")]
    include_paths: Vec<String>,

    /// Emit #define/#undef verbatim even when executed.
    #[arg(long)]
    passthru_defines: bool,

    /// Emit #include verbatim if the target file cannot be found.
    #[arg(long)]
    passthru_unfound_includes: bool,

    /// Treat unresolved identifiers in #if expressions as partial rather than 0.
    #[arg(long)]
    passthru_unknown_exprs: bool,

    /// Keep comments in the output.
    #[arg(long)]
    passthru_comments: bool,

    /// Emit #include verbatim *and* process it, for includes matching this pattern.
    #[arg(long, value_name = "PATTERN")]
    passthru_includes: Option<String>,

    /// Disable automatic #pragma once inference from include guards.
    #[arg(long)]
    disable_auto_pragma_once: bool,

    /// Set the line-marker prefix (default "#line"; pass an empty string to disable).
    #[arg(long, num_args = 0..=1, default_missing_value = "#line")]
    line_directive: Option<String>,

    /// Whitespace-aggression level (0 = preserve, 1 = moderate, 2 = aggressive).
    #[arg(long, value_name = "N", default_value_t = 0)]
    compress: u8,

    /// Assumed input text encoding (only "utf-8" is supported).
    #[arg(long, value_name = "ENC")]
    assume_input_encoding: Option<String>,

    /// Output text encoding (only "utf-8" is supported).
    #[arg(long, value_name = "ENC")]
    output_encoding: Option<String>,

    /// Emit a JSON trace of every directive handled, alongside the output.
    #[arg(long)]
    debug: bool,

    /// Emit a timing summary to stderr after processing.
    #[arg(long)]
    time: bool,
}

fn main() {
    if !atty::is(atty::Stream::Stderr) {
        colored::control::set_override(false);
    }
    let args = Args::parse();
    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{}: {err:#}", "pcpp".red().bold());
            std::process::exit(-1);
        }
    }
}

fn run(args: Args) -> Result<i32> {
    for enc_opt in [&args.assume_input_encoding, &args.output_encoding] {
        if let Some(enc) = enc_opt {
            anyhow::ensure!(enc.eq_ignore_ascii_case("utf-8"), "unsupported encoding '{enc}'; only utf-8 is supported");
        }
    }

    let mut config = PreprocessorConfig::for_linux();
    for def in &args.defines {
        config = config.with_predefine(def.replacen('=', " ", 1));
    }
    config.preundefines = args.undefines.clone();
    config.never_define = args.never_define.clone();
    for path in &args.include_paths {
        config = config.with_include_dir(path.clone());
    }
    config.passthru_defines = args.passthru_defines;
    config.passthru_unfound_includes = args.passthru_unfound_includes;
    config.passthru_unknown_exprs = args.passthru_unknown_exprs;
    config.passthru_comments = args.passthru_comments;
    config.passthru_includes = args.passthru_includes.clone();
    config.disable_auto_pragma_once = args.disable_auto_pragma_once;
    config.line_directive_prefix = args.line_directive.clone().filter(|s| !s.is_empty());
    config.compress = match args.compress {
        0 => includium::CompressLevel::None,
        1 => includium::CompressLevel::Moderate,
        _ => includium::CompressLevel::Aggressive,
    };

    let trace: Rc<RefCell<Vec<serde_json::Value>>> = Rc::new(RefCell::new(Vec::new()));
    if args.debug {
        let trace = Rc::clone(&trace);
        let mut hooks = includium::Hooks::new();
        hooks.on_directive = Some(Rc::new(move |name: &str, directive_args: &[String]| {
            trace.borrow_mut().push(serde_json::json!({
                "directive": name,
                "args": directive_args,
            }));
            None
        }));
        config = config.with_hooks(hooks);
    }

    let mut driver = PreprocessorDriver::with_config(config);

    let started = Instant::now();
    let mut error_count = 0usize;
    let mut rendered = String::new();

    if args.files.is_empty() || args.files.iter().all(|f| f == "-") {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input).context("reading standard input")?;
        driver.set_current_file("<stdin>");
        let output = driver.process(&input);
        for err in &output.errors {
            eprintln!("{}", err.to_string().red());
        }
        error_count += output.errors.len();
        rendered.push_str(&output.text);
    } else {
        for file in &args.files {
            if file == "-" {
                continue;
            }
            let input = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
            driver.set_current_file(file.as_str());
            let output = driver.process(&input);
            for err in &output.errors {
                eprintln!("{}", err.to_string().red());
            }
            error_count += output.errors.len();
            rendered.push_str(&output.text);
        }
    }

    match &args.output {
        Some(path) => std::fs::write(path, &rendered).with_context(|| format!("writing {}", path.display()))?,
        None => print!("{rendered}"),
    }

    if args.debug {
        let debug_path = args.output.as_ref().map_or_else(
            || PathBuf::from("pcpp.debug.json"),
            |p| p.with_extension("debug.json"),
        );
        let json = serde_json::to_string_pretty(&*trace.borrow()).context("serializing debug trace")?;
        std::fs::write(&debug_path, json).with_context(|| format!("writing {}", debug_path.display()))?;
    }

    if args.time {
        eprintln!("{}: {:?} elapsed", "pcpp".dimmed(), started.elapsed());
    }

    Ok(i32::try_from(error_count).unwrap_or(i32::MAX))
}

