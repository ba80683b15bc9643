use crate::protocol::DEFAULT_PORT;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Share the regular files of a directory
    Serve {
        /// Directory with files to share
        dir: PathBuf,
        /// Port to listen on
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Fetch a byte range of a served file
    Get {
        /// Server host name or IPv4 address
        host: String,
        /// Server port
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
        /// File to fetch; when omitted, the server is asked for its listing
        /// and the file is picked interactively
        #[arg(long)]
        file: Option<String>,
        /// First byte address (defaults to 0 with --file)
        #[arg(long)]
        from: Option<u32>,
        /// Last byte address, exclusive (required with --file)
        #[arg(long)]
        to: Option<u32>,
        /// Directory the fetched range is written into
        #[arg(long, default_value = "tmp")]
        out: PathBuf,
    },
}
