use anyhow::Result;
use clap::Parser;
use netstore::cli::{Cli, Commands};
use netstore::{client, server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { dir, port } => {
            server::run_server(dir, port).await?;
        }
        Commands::Get {
            host,
            port,
            file,
            from,
            to,
            out,
        } => {
            client::run_client(host, port, file, from, to, out).await?;
        }
    }

    Ok(())
}
