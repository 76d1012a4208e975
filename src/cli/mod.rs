pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bookrate")]
#[command(about = "Goodreads ratings for Taiwanese book retailers", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/bookrate/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Annotate a retailer page with Goodreads ratings
    Scan {
        /// Page URL, used for routing even when the HTML comes from --file
        url: String,

        /// Read the page HTML from a file instead of fetching it
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Render the page in headless Chrome before scanning
        #[arg(short, long, conflicts_with = "file")]
        browser: bool,

        /// Write the annotated HTML here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Look up the Goodreads rating for a title
    Lookup {
        title: String,

        /// Subtitle or original title
        #[arg(short, long)]
        subtitle: Option<String>,
    },
    /// Run the book server
    Serve {
        /// Listen address, overriding the config
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Inspect or prune the rating cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List books stored by the server
    Books {
        /// Retailer table to list (kobo, pchome, bokelai, taaze); Goodreads when omitted
        #[arg(short, long)]
        source: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Run one eviction pass
    Clean,
    /// List cached ratings
    List,
    /// Remove every cached rating
    Clear,
}
