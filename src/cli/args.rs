use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// RFID point-of-sale checkout and settlement service
#[derive(Parser, Debug)]
#[command(name = "rfid-checkout-server")]
#[command(about = "RFID point-of-sale checkout and settlement service", long_about = None)]
pub struct CliArgs {
    /// Storage backend to run against
    #[arg(
        long = "backend",
        value_name = "BACKEND",
        default_value = "mongodb",
        help = "Storage backend: 'memory' for in-process or 'mongodb' for the document database"
    )]
    pub backend: BackendType,

    /// Listening port override
    #[arg(
        long = "port",
        value_name = "PORT",
        help = "Listening port (overrides the PORT environment variable)"
    )]
    pub port: Option<u16>,

    /// Seed file for the memory backend
    #[arg(
        long = "seed",
        value_name = "FILE",
        help = "JSON file of user accounts to preload (memory backend only)"
    )]
    pub seed: Option<PathBuf>,
}

/// Available storage backends
#[derive(Clone, Debug, ValueEnum)]
pub enum BackendType {
    Memory,
    Mongodb,
}
