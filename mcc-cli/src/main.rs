// CLI driver for the MCC compiler.
use anyhow::Context;
use clap::Parser;
use mcc_core::{CompilePipeline, Config, ERROR_EXIT_CODE};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mcc")]
#[command(about = "Compile a C-like source program to MIPS-32 assembly")]
#[command(version)]
struct Cli {
    /// Source file; standard input when omitted
    input: Option<PathBuf>,

    /// Output file for the assembly; standard output when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File for diagnostics; standard error when omitted
    #[arg(long)]
    error_file: Option<PathBuf>,

    /// Emit the plain `line code` error listing instead of the rendered one
    #[arg(long)]
    plain_errors: bool,

    /// Also emit the optimized IR before the assembly
    #[arg(long)]
    dump_ir: bool,

    /// Disable the IR optimization pipeline
    #[arg(long)]
    no_ir_opt: bool,

    /// Disable the machine-IR optimization pipeline
    #[arg(long)]
    no_mips_opt: bool,

    /// Print compilation statistics as JSON to standard error
    #[arg(long)]
    stats: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let source = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read standard input")?;
            buf
        }
    };

    let config = Config {
        dump_ir: cli.dump_ir,
        enable_ir_opt: !cli.no_ir_opt,
        enable_mips_opt: !cli.no_mips_opt,
        ..Config::default()
    };

    match CompilePipeline::compile(&source, &config) {
        Ok(output) => {
            let mut text = String::new();
            if let Some(ir) = &output.ir {
                text.push_str(ir);
                text.push('\n');
            }
            text.push_str(&output.assembly);
            match &cli.output {
                Some(path) => std::fs::write(path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", text),
            }
            if cli.stats {
                let stats =
                    serde_json::to_string_pretty(&output.stats).context("serializing stats")?;
                eprintln!("{}", stats);
            }
            log::info!(
                "done: {} functions, {} machine instructions",
                output.stats.functions,
                output.stats.machine_instructions
            );
            Ok(())
        }
        Err(diags) => {
            let text = if cli.plain_errors {
                diags.listing.clone()
            } else {
                diags.rendered.clone()
            };
            match &cli.error_file {
                Some(path) => std::fs::write(path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => eprint!("{}", text),
            }
            log::error!("{} error(s) in source program", diags.count);
            std::process::exit(ERROR_EXIT_CODE);
        }
    }
}
