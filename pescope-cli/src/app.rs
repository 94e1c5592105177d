use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pescope - PE/PE32+ image inspection and repair
#[derive(Debug, Parser)]
#[command(name = "pescope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display image overview: machine, subsystem, entry point, sections and version strings.
    Info {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Print the region map with file offsets and virtual addresses.
    Map {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Treat the input as a loaded image dump instead of an on-disk file.
        #[arg(long)]
        image: bool,
    },

    /// List imported libraries and symbols, including delay and bound imports.
    Imports {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List exported symbols.
    Exports {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Include address table slots that are empty or unnamed.
        #[arg(long)]
        all: bool,
    },

    /// List resource leaves as type / name / language.
    Resources {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List base relocation blocks.
    Relocs {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Show the TLS directory and its callbacks.
    Tls {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Show the load configuration fields present in the image.
    Loadconfig {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List debug directory entries and the PDB reference.
    Debug {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Show the CLI header, metadata streams and table row counts.
    Dotnet {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List attribute certificates and Authenticode signer details.
    Certs {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Verify the optional header checksum, optionally rewriting it.
    Checksum {
        /// Path to the PE file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Store the recomputed checksum.
        #[arg(long)]
        fix: bool,

        /// Write the fixed image here instead of over the input.
        #[arg(short, long, requires = "fix")]
        output: Option<PathBuf>,
    },
}
