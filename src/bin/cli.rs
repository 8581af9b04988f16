//! Taggle CLI
//!
//! Local entry point for syncing, reconciling and searching.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use taggle::{
    error::{AppError, Result},
    models::{Config, SourceKind},
    pipeline::{self, IndexReconciler, SyncEngine},
    present::{Pagination, TagCloudOptions, build_tag_cloud, custom_tag_sort},
    query::add_tag_to_query,
    search::LocalIndex,
    services::{self, FileSource, NewItem},
    storage::{LocalStorage, SyncCache},
    utils::http::create_async_client,
};

/// Taggle - tagged bookmark search
#[derive(Parser, Debug)]
#[command(
    name = "taggle",
    version,
    about = "Sync tagged bookmarks into a search index and query them"
)]
struct Cli {
    /// Path to storage directory containing config.toml, the cache and the index
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring the local cache up to date with the source
    Sync {
        /// Refresh even if the cache looks fresh
        #[arg(long)]
        force: bool,
    },

    /// Download missing archive entries for the cached snapshot
    Archive,

    /// Push the cached snapshot into the search index
    Reconcile,

    /// Run full pipeline: Sync → Reconcile
    Pipeline,

    /// Search the index
    Search {
        /// Free text mixed with tags:<value> filters
        #[arg(default_value = "")]
        query: String,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Results per page (default: [index] page_size)
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Print a query with a tag filter added
    AddTag { query: String, tag: String },

    /// Append a record to the metadata file (file sources only)
    Add {
        /// Space- or comma-separated tags
        #[arg(long)]
        tags: String,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        title: Option<String>,

        /// Image to download into images/<shard>/ next to the metadata file
        #[arg(long)]
        img_url: Option<String>,
    },

    /// Validate configuration file
    Validate,

    /// Show current snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_engine(config: &Config, storage_dir: &Path) -> Result<SyncEngine> {
    let source = services::build_source(&config.source, storage_dir)?;
    let engine = SyncEngine::new(
        source,
        Arc::new(LocalStorage::new(storage_dir)),
        config.sync.clone(),
        &config.source,
    );

    // Ctrl-C aborts an in-flight refresh without persisting it.
    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; cancelling");
            token.cancel();
        }
    });

    Ok(engine)
}

fn build_reconciler(config: &Config, index: Arc<LocalIndex>) -> IndexReconciler {
    IndexReconciler::new(index, &config.index)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::debug!("Loaded configuration from {}", config_path.display());

    let index = Arc::new(LocalIndex::persistent(cli.storage_dir.join("index")));
    let index_name = config.index.name.clone();

    match cli.command {
        Command::Sync { force } => {
            let engine = build_engine(&config, &cli.storage_dir)?;
            let snapshot = if force {
                engine.refresh().await?
            } else {
                engine.sync().await?
            };
            log::info!(
                "Snapshot: {} items, {} starred, last fetched {}",
                snapshot.items.len(),
                snapshot.starred_ids.len(),
                snapshot.last_fetched
            );
        }

        Command::Archive => {
            let engine = build_engine(&config, &cli.storage_dir)?;
            let report = engine.download_archives().await?;
            log::info!(
                "Archives: {} total, {} downloaded, {} already cached, {} failed",
                report.total,
                report.downloaded,
                report.skipped,
                report.failed
            );
        }

        Command::Reconcile => {
            let engine = build_engine(&config, &cli.storage_dir)?;
            let snapshot = engine
                .cached()
                .await?
                .ok_or_else(|| AppError::config("No snapshot found. Run 'sync' first."))?;
            let documents = engine.documents(&snapshot).await?;

            let report = build_reconciler(&config, index)
                .reconcile(&index_name, &documents)
                .await?;
            if let Some(warning) = report.partial_failure() {
                log::warn!("{}", warning);
            }
            log::info!(
                "Reconciled '{}': {} indexed, {} removed",
                index_name,
                report.upserted,
                report.deleted.len()
            );
        }

        Command::Pipeline => {
            let engine = build_engine(&config, &cli.storage_dir)?;
            let reconciler = build_reconciler(&config, index);
            pipeline::run_pipeline(&engine, &reconciler, &index_name).await?;
        }

        Command::Search {
            query,
            page,
            page_size,
        } => {
            let page_size = page_size.unwrap_or(config.index.page_size);
            let results = pipeline::search_documents(
                index.as_ref(),
                &index_name,
                &query,
                page,
                page_size,
                config.index.facet_size,
            )
            .await?;

            let pages: Pagination = results.pagination();
            println!(
                "{}-{} of {} (page {}/{})",
                pages.start_index(),
                pages.end_index(),
                pages.total_size,
                pages.page,
                pages.total_pages()
            );
            for doc in &results.documents {
                let star = if doc.is_starred() { "*" } else { " " };
                println!(
                    "{} {}  {}",
                    star,
                    doc.title().unwrap_or(&doc.id),
                    doc.url().unwrap_or("")
                );
                println!("    {}", custom_tag_sort(doc.tags.iter().cloned()).join(" "));
            }

            if !results.tag_facets.is_empty() {
                let options = TagCloudOptions::from_config(&config.tag_cloud)?;
                let cloud = build_tag_cloud(&results.tag_facets, &options);
                println!();
                for tag in custom_tag_sort(cloud.keys().cloned()) {
                    if let Some(entry) = cloud.get(&tag) {
                        println!(
                            "  {:<24} {:>5}  size {:>5.1}  {}",
                            tag, results.tag_facets[&tag], entry.size, entry.colour
                        );
                    }
                }
            }

            if let Some(next) = pages.next_page() {
                log::info!("More results: --page {}", next);
            }
        }

        Command::AddTag { query, tag } => {
            println!("{}", add_tag_to_query(&query, &tag));
        }

        Command::Add {
            tags,
            url,
            title,
            img_url,
        } => {
            if config.source.kind != SourceKind::File {
                return Err(AppError::config(
                    "'add' needs [source] kind = \"file\" in config.toml",
                ));
            }
            let source = FileSource::new(&cli.storage_dir, &config.source.metadata_file);
            let image = match img_url {
                Some(img_url) => {
                    let client = create_async_client(&config.source)?;
                    let timeout = Duration::from_secs(config.source.timeout_secs);
                    Some(source.download_image(&client, &img_url, timeout).await?)
                }
                None => None,
            };
            let item = source
                .append(NewItem {
                    tags,
                    url,
                    title,
                    image,
                })
                .await?;
            println!("{}", item.id);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("Source: {:?}", config.source.kind);

            match LocalStorage::new(&cli.storage_dir).load_snapshot().await? {
                Some(snapshot) => {
                    log::info!("Last fetched: {}", snapshot.last_fetched);
                    log::info!(
                        "Items: {} ({} starred, {} with archives)",
                        snapshot.items.len(),
                        snapshot.starred_ids.len(),
                        snapshot.archive_links.len()
                    );
                }
                None => log::info!("No snapshot found yet."),
            }
        }
    }

    Ok(())
}
