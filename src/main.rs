use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use unicode_width::UnicodeWidthStr;

use hn_reader::config::Config;
use hn_reader::connectivity::{Connectivity, ManualConnectivity, NetworkMonitor};
use hn_reader::presenter::{self, DisplayState};
use hn_reader::remote::HnClient;
use hn_reader::storage::{Article, Database, DatabaseError};
use hn_reader::sync::{ArticlesRepository, SyncEngine};
use hn_reader::util::truncate_to_width;

const TITLE_WIDTH: usize = 60;
const AUTHOR_WIDTH: usize = 16;

/// Get the config directory path (~/.config/hn-reader/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("hn-reader"))
}

#[derive(Parser, Debug)]
#[command(name = "hn-reader", about = "Offline-first Hacker News reader")]
struct Args {
    /// Reset database (delete and recreate)
    #[arg(long, global = true)]
    reset_db: bool,

    /// Behave as if there were no network
    #[arg(long, global = true)]
    offline: bool,

    /// Search term (overrides the config file)
    #[arg(long, global = true, value_name = "TERM")]
    query: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print cached articles, then the refreshed list if online
    List,
    /// Fetch fresh articles and purge deleted ones
    Refresh,
    /// Hide an article until the next refresh
    Delete { id: String },
    /// Open an article in the browser
    Open { id: String },
    /// Follow the list live; type `r` to refresh, `d <ID>` to delete, `q` to quit
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the listing; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;
    let query = args.query.clone().unwrap_or_else(|| config.query.clone());
    let db_path = config.resolve_db_path(&config_dir);

    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        eprintln!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of hn-reader appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let client = HnClient::new(&config.api_base_url, config.request_timeout())
        .context("Invalid api_base_url in config")?;

    let connectivity: Arc<dyn Connectivity> = if args.offline {
        Arc::new(ManualConnectivity::new(false))
    } else {
        Arc::new(
            NetworkMonitor::spawn(
                &config.probe_address,
                config.probe_interval(),
                config.probe_timeout(),
            )
            .await,
        )
    };

    let engine = SyncEngine::new(
        Arc::new(db),
        Arc::new(client),
        Arc::clone(&connectivity),
        &query,
    );

    match args.command.unwrap_or(Command::List) {
        Command::List => list(&engine).await,
        Command::Refresh => {
            let articles = engine.refresh_articles().await?;
            print_articles(&articles);
            eprintln!("Refreshed: {} articles", articles.len());
            Ok(())
        }
        Command::Delete { id } => {
            engine.delete_article(&id).await?;
            eprintln!("Deleted {}", id);
            Ok(())
        }
        Command::Open { id } => open_article(&engine, &id).await,
        Command::Watch => watch(Arc::new(engine), connectivity).await,
    }
}

/// Print every emission of the offline-first read.
async fn list(engine: &SyncEngine) -> Result<()> {
    let mut emissions = engine.get_articles();
    let mut printed = false;
    while let Some(result) = emissions.next().await {
        let articles = result?;
        if printed {
            println!();
        }
        print_articles(&articles);
        printed = true;
    }
    Ok(())
}

async fn open_article(engine: &SyncEngine, id: &str) -> Result<()> {
    let stored = engine
        .get_article(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No article with ID {}", id))?;

    let link = stored.article.display_url();
    if link.is_empty() {
        anyhow::bail!("Article {} has no URL", id);
    }
    let parsed = url::Url::parse(link).with_context(|| format!("Invalid article URL: {}", link))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Refusing to open {} URL", parsed.scheme());
    }

    open::that(parsed.as_str()).context("Failed to open browser")?;
    Ok(())
}

/// Drive a presenter from stdin and print every state change.
async fn watch(
    repository: Arc<dyn ArticlesRepository>,
    connectivity: Arc<dyn Connectivity>,
) -> Result<()> {
    let handle = presenter::spawn(repository, connectivity);
    let mut states = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_state(&states.borrow_and_update());

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                print_state(&states.borrow_and_update());
            }

            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let mut words = line.split_whitespace();
                match (words.next(), words.next()) {
                    (Some("q"), _) => break,
                    (Some("r"), _) => handle.refresh().await,
                    (Some("d"), Some(id)) => handle.delete_article(id).await,
                    (None, _) => {}
                    _ => eprintln!("Commands: r | d <ID> | q"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn print_state(state: &DisplayState) {
    let mut flags = Vec::new();
    if state.is_loading {
        flags.push("loading");
    }
    if state.is_refreshing {
        flags.push("refreshing");
    }
    if !state.allow_refresh() {
        flags.push("refresh disabled");
    }
    println!(
        "--- {} articles{}{}",
        state.articles.len(),
        if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        },
        state
            .error
            .as_deref()
            .map(|e| format!(" ! {}", e))
            .unwrap_or_default()
    );
    print_articles(&state.articles);
}

fn print_articles(articles: &[Article]) {
    for article in articles {
        println!(
            "{:>10}  {}  {}  {}",
            article.object_id,
            pad(article.display_title(), TITLE_WIDTH),
            pad(article.author.as_deref().unwrap_or("-"), AUTHOR_WIDTH),
            article.created_at
        );
    }
}

/// Truncate or right-pad to exactly `width` columns.
fn pad(s: &str, width: usize) -> String {
    let cut = truncate_to_width(s, width);
    let fill = width.saturating_sub(cut.width());
    format!("{}{}", cut, " ".repeat(fill))
}
