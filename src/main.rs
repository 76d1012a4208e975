use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookrate::app::AppContext;
use bookrate::cli::commands::{self, PageSource};
use bookrate::cli::{CacheAction, Cli, Commands};
use bookrate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Scan {
            url,
            file,
            browser,
            output,
        } => {
            let source = match (file.as_deref(), browser) {
                (Some(path), _) => PageSource::File(path),
                (None, true) => PageSource::Browser,
                (None, false) => PageSource::Http,
            };
            commands::scan(&ctx, &url, source, output.as_deref()).await?;
        }
        Commands::Lookup { title, subtitle } => {
            commands::lookup(&ctx, &title, subtitle.as_deref()).await?;
        }
        Commands::Serve { listen } => {
            commands::serve(&ctx, listen).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Clean => commands::clean_cache(&ctx)?,
            CacheAction::List => commands::list_cache(&ctx)?,
            CacheAction::Clear => commands::clear_cache(&ctx)?,
        },
        Commands::Books { source } => {
            commands::list_books(&ctx, source.as_deref())?;
        }
    }

    Ok(())
}
