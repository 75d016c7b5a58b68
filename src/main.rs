use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use genrevote::cache::CacheStore;
use genrevote::config::AppConfig;
use genrevote::library;
use genrevote::pipeline::Pipeline;
use genrevote::stats;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "genrevote", version, about = "Genre metadata fixer")]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the response cache database
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide genres for audio files and write them back to tags
    Fix {
        /// Directories or files to process (defaults to config music_dirs)
        paths: Vec<String>,

        /// Also process tracks that already have a clean genre
        #[arg(long)]
        force: bool,

        /// Show decisions without writing tags
        #[arg(long)]
        dry_run: bool,
    },

    /// Show configured sources and query types
    Sources,

    /// Remove expired entries from the response cache
    Purge,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load(cli.config.as_deref());

    // Resolve cache path: CLI > config > XDG default
    let cache_path = cli.cache_path.unwrap_or_else(|| config.cache_path());

    match cli.command {
        Commands::Fix {
            paths,
            force,
            dry_run,
        } => {
            // Resolve scan paths: CLI args > config music_dirs
            let scan_paths = if !paths.is_empty() {
                paths
            } else {
                config
                    .music_dirs
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect()
            };
            if scan_paths.is_empty() {
                bail!("No paths given and no music_dirs in config");
            }

            log::info!("Response cache: {}", cache_path.display());
            let cache = Arc::new(
                CacheStore::open(&cache_path).context("Failed to open response cache")?,
            );
            let mut pipeline =
                Pipeline::from_config(&config, cache).context("Invalid configuration")?;

            run_fix(&mut pipeline, &scan_paths, force, dry_run)
        }

        Commands::Sources => {
            let sources = config
                .enabled_sources()
                .context("Invalid configuration")?;
            println!("Enabled sources:");
            for source in &sources {
                println!(
                    "  {:<12} weight {:<5} rate limit {} ms",
                    source.kind.name(),
                    source.weight,
                    source.rate_limit.as_millis()
                );
            }
            println!();
            println!("Active query types:");
            for (name, weight) in config.active_query_types() {
                println!("  {name:<12} weight {weight}");
            }
            Ok(())
        }

        Commands::Purge => {
            let cache =
                CacheStore::open(&cache_path).context("Failed to open response cache")?;
            let removed = cache
                .purge_expired(config.cache.ttl_days)
                .context("Failed to purge cache")?;
            let remaining = cache.entry_count().context("Failed to count cache")?;
            println!("Removed {removed} expired entries, {remaining} remaining");
            Ok(())
        }
    }
}

fn run_fix(pipeline: &mut Pipeline, paths: &[String], force: bool, dry_run: bool) -> Result<()> {
    let all_tracks = library::collect_tracks(paths);
    let tracks: Vec<_> = all_tracks
        .into_iter()
        .filter(|t| force || t.needs_fix())
        .collect();

    if tracks.is_empty() {
        println!("No tracks need fixing (use --force to reprocess everything)");
        return Ok(());
    }
    println!("Processing {} tracks...", tracks.len());

    let pb = ProgressBar::new(tracks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tracks ({eta} remaining) {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut changed = 0usize;
    let mut unchanged = 0usize;
    let mut empty = 0usize;
    let mut write_errors = 0usize;

    for track in &tracks {
        pb.set_message(
            track
                .path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default(),
        );

        let decision = pipeline.process_track(&track.meta, track.genre.as_deref());

        if decision.tags.is_empty() {
            empty += 1;
            log::info!("{}: no usable tag data", track.path.display());
        } else if decision.changed {
            let old = track.genre.as_deref().unwrap_or("<none>");
            pb.println(format!(
                "{}: {} => {}",
                track.path.display(),
                old,
                decision.rendered
            ));
            if dry_run {
                changed += 1;
            } else {
                match library::write_genre(&track.path, &decision.rendered) {
                    Ok(()) => changed += 1,
                    Err(e) => {
                        write_errors += 1;
                        log::warn!("Failed to write {}: {}", track.path.display(), e);
                    }
                }
            }
        } else {
            unchanged += 1;
            log::info!("{}: already {}", track.path.display(), decision.rendered);
        }

        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Done: {changed} changed, {unchanged} unchanged, {empty} without data, {write_errors} write errors"
    ));
    if dry_run {
        println!("Dry run: no tags were written");
    }

    println!();
    print!("{}", stats::render(&pipeline.source_stats()));
    Ok(())
}
