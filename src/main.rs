use clap::Parser;

mod ai;
mod app;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod news;
mod pipeline;
mod services;
mod sitemap;

use app::App;
use cli::Cli;
use config::Config;
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Progress goes to stderr so listings on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    let app = App::new(config).await?;
    app.run(cli.command).await
}
