//! Capseo tool entry point.
//!
//! ```text
//! capseo info <FILE>                 Print stream header and statistics
//! capseo synth [-o FILE] [-n N]      Write a synthetic colour-sweep stream
//! capseo gen-config                  Write default config to stdout
//! capseo --config <path> ...         Load a custom config TOML
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use capseo_cli::config::CliConfig;
use capseo_cli::{info as stream_info, synth};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "capseo", about = "Capseo screen-capture stream tools")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "capseo.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a stream's header and statistics.
    Info {
        /// Stream file to inspect.
        file: PathBuf,
    },
    /// Encode a synthetic colour sweep.
    Synth {
        /// Output stream path (overrides the config).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of frames (overrides the config).
        #[arg(short = 'n', long)]
        frames: Option<u32>,
    },
    /// Print the default configuration to stdout and exit.
    GenConfig,
}

// ── Main ─────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = CliConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Info { file } => {
            let summary = stream_info::summarize(BufReader::new(File::open(&file)?))?;
            println!("file:            {}", file.display());
            println!("{summary}");
        }
        Command::Synth { output, frames } => {
            if let Some(output) = output {
                config.synth.output = output;
            }
            if let Some(frames) = frames {
                config.synth.frames = frames;
            }

            info!("capseo v{}", env!("CARGO_PKG_VERSION"));
            info!(
                "encoding {} frames of {}x{} (scale {}) to {}",
                config.synth.frames,
                config.codec.width,
                config.codec.height,
                config.codec.scale,
                config.synth.output.display()
            );

            let sink = BufWriter::new(File::create(&config.synth.output)?);
            synth::write_sweep(sink, config.codec, config.stream_options(), &config.synth)?;
        }
        Command::GenConfig => {}
    }

    Ok(())
}
