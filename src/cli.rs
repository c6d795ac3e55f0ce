use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hlsforge")]
#[command(author, version, about = "Adaptive-bitrate HLS packaging and live segment ingestion")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalise a source video to H.264 and split it into chunks
    Prepare {
        /// Source video
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Ingest a directory of chunks into the HLS ladder
    Package {
        /// Chunk directory (defaults to prepare.chunk_dir)
        #[arg(long)]
        chunks: Option<PathBuf>,
    },

    /// Decode a video to raw frames and ingest them as a live stream
    Live {
        /// Video standing in for the capture device
        #[arg(required = true)]
        input: PathBuf,

        /// Serve the output tree while ingesting
        #[arg(long)]
        serve: bool,

        /// Read the input at its native frame rate
        #[arg(long)]
        realtime: bool,
    },

    /// Serve the HLS output tree over HTTP
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Probe a video file for bitrate, frame count and geometry
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the HLS output tree
    Clean,

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
