use anyhow::{Context, anyhow};
use clap::Parser;
use log::{LevelFilter, info};
use std::path::PathBuf;
use std::process;

/// Convert an Intel HEX file into a 4-byte-aligned word dump.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Intel HEX input file
    #[arg(short, long)]
    input: PathBuf,

    /// Dump output file (created or truncated)
    #[arg(short, long)]
    output: PathBuf,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    // Guard: input must be an existing file
    if !cli.input.is_file() {
        return Err(anyhow!("File not found: {}", cli.input.display()));
    }

    let summary = ihexdump::convert(&cli.input, &cli.output)
        .map_err(anyhow::Error::from_boxed)
        .with_context(|| {
            format!(
                "Failed to convert {} -> {}",
                cli.input.display(),
                cli.output.display()
            )
        })?;

    info!(
        "{} records, {} data bytes, {} dump lines",
        summary.records, summary.data_bytes, summary.lines
    );
    println!(
        "Converted {} -> {}",
        cli.input.display(),
        cli.output.display()
    );
    Ok(())
}
