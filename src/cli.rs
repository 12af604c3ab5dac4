//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the TOML file and environment variables.

use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Sends notifications to webhook, chat, email and custom HTTP destinations.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (overrides the configuration file).
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Default publish timeout in milliseconds.
    #[arg(long, value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Build a fresh transport client for every message.
    #[arg(long, global = true)]
    pub no_client_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Dispatch a single message read from a JSON file.
    Send {
        /// Path to the JSON-encoded message.
        #[arg(short, long, value_name = "FILE")]
        message: PathBuf,
    },
    /// List the destination types that can be dispatched.
    Types,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(timeout) = self.timeout_ms {
            let mut dispatch = Dict::new();
            dispatch.insert("default_timeout_ms".into(), Value::from(timeout));
            dict.insert("dispatch".into(), Value::from(dispatch));
        }

        // Only an explicit flag disables the cache; absence leaves the file value alone.
        if self.no_client_cache {
            let mut cache = Dict::new();
            cache.insert("enabled".into(), Value::from(false));
            dict.insert("cache".into(), Value::from(cache));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
