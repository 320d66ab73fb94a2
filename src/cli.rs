//! Command-line interface for voxwire
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Streaming speech recognition client
#[derive(Parser, Debug)]
#[command(name = "voxwire", version, about = "Streaming speech recognition client")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress partial results and status output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: session events, -vv: protocol diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a WAV file (16 kHz, mono, 16-bit) to the service and print the transcript
    Transcribe {
        /// WAV file to send, or `-` for stdin
        input: PathBuf,

        /// Recognition language (overrides config and VOXWIRE_LANGUAGE)
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Audio packet duration in milliseconds
        #[arg(long, value_name = "MS")]
        chunk_ms: Option<u32>,

        /// Send audio at real-time speed instead of as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Send handshake and audio without gzip compression
        #[arg(long)]
        no_compression: bool,
    },

    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment)
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
