use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hbctl")]
#[command(about = "Encode query tools, presets and encoder job runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging, including encoder output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one encode now and wait for it to finish
    Encode {
        /// Encoder query (ignored when --preset is given)
        #[arg(value_name = "QUERY", required_unless_present = "preset", allow_hyphen_values = true)]
        query: Option<String>,

        /// Label shown in logs
        #[arg(long)]
        label: Option<String>,

        /// Encode with a stored preset's query
        #[arg(long, value_name = "NAME")]
        preset: Option<String>,
    },

    /// Queue several queries and run them one after another
    Queue {
        #[arg(value_name = "QUERY", required = true, allow_hyphen_values = true)]
        queries: Vec<String>,
    },

    /// Parse a query and print the settings as JSON
    Decode {
        #[arg(value_name = "QUERY", allow_hyphen_values = true)]
        query: String,
    },

    /// Parse a query, apply the settings rules and print the canonical query
    Normalize {
        #[arg(value_name = "QUERY", allow_hyphen_values = true)]
        query: String,
    },

    /// Canonicalize an x264 option string and show the typed settings
    X264 {
        #[arg(value_name = "OPTIONS")]
        options: String,
    },

    /// Manage stored presets
    Presets {
        #[command(subcommand)]
        action: PresetCommands,
    },

    /// Manage the saved default query
    Defaults {
        #[command(subcommand)]
        action: DefaultsCommands,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Subcommand)]
pub enum PresetCommands {
    /// List preset names in file order
    List,

    /// Print a preset's query
    Show { name: String },

    /// Add or replace a preset
    Add {
        name: String,
        #[arg(allow_hyphen_values = true)]
        query: String,
    },

    /// Remove a preset
    Remove { name: String },

    /// Delete every preset
    Reset,

    /// Print the name of the default preset, if any
    Default,
}

#[derive(Subcommand)]
pub enum DefaultsCommands {
    /// Save a query as the starting settings
    Save {
        #[arg(allow_hyphen_values = true)]
        query: String,
    },

    /// Print the settings a new session starts from
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}
