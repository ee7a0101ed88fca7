use anyhow::Result;
use clap::Parser;
use rawtext::config::PipelineConfig;
use rawtext::pipeline::{run_file, OutputFormat, ReadMode, RunOptions, SentencePipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rawtext")]
#[command(about = "Streaming sentence detection over annotated raw text")]
#[command(version)]
struct Args {
    /// Text file to split into sentences
    input: PathBuf,

    /// Pipeline configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured block size in bytes
    #[arg(long)]
    block_size: Option<usize>,

    /// Use memory-mapped I/O instead of async buffered
    #[arg(long, conflicts_with = "whole_text")]
    use_mmap: bool,

    /// Annotate the whole file at once instead of streaming it
    #[arg(long)]
    whole_text: bool,

    /// Sentence output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    format: OutputFormat,

    /// Write sentences to this file instead of standard output
    #[arg(long)]
    output: Option<PathBuf>,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long)]
    stats_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging on stderr keeps stdout free for sentence output
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    if !args.input.is_file() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    let pipeline = SentencePipeline::from_config(&config)?;

    let mode = if args.whole_text {
        ReadMode::WholeText
    } else if args.use_mmap {
        ReadMode::Mmap
    } else {
        ReadMode::Stream
    };
    let options = RunOptions {
        mode,
        format: args.format,
        output: args.output.clone(),
        progress: !args.no_progress,
    };
    let stats = run_file(&pipeline, &args.input, &options).await?;

    if let Some(stats_path) = &args.stats_out {
        let json = serde_json::to_string_pretty(&stats)?;
        tokio::fs::write(stats_path, json).await?;
        info!("Run statistics written to {}", stats_path.display());
    }
    Ok(())
}
