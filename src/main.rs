//! `tubeshelf` command-line interface

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tubeshelf::config::Config;
use tubeshelf::logging::init_logging;
use tubeshelf::orchestrator::{DownloadStatus, Orchestrator, RunSummary, StatusReport};
use tubeshelf::{YtDlpDownloader, run_until_signal};

/// Exit status after SIGINT/SIGTERM
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(version, about = "Files new channel uploads into a media-server library", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Environment file loaded before `${VAR}` expansion
    #[arg(long = "env-file", default_value = ".env")]
    env_file: PathBuf,

    /// Show what would be downloaded without downloading
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Maximum number of recent uploads to check
    #[arg(long = "max-videos", default_value_t = 50)]
    max_videos: usize,

    /// Show library and quota status
    #[arg(long)]
    status: bool,

    /// Download one video by watch URL
    #[arg(long = "force-download", value_name = "URL")]
    force_download: Option<String>,

    /// Check configuration and environment, then exit
    #[arg(long)]
    validate: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(&args.config, Some(&args.env_file)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.validate {
        return validate(&config);
    }

    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = match Orchestrator::from_config(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = run_until_signal(async {
        if args.status {
            let report = orchestrator.status_report().await;
            print_status(&report, args.json);
            ExitCode::SUCCESS
        } else if let Some(url) = &args.force_download {
            force_download(&orchestrator, url, args.json).await
        } else {
            if args.dry_run && !args.json {
                println!("DRY RUN MODE - no files will be downloaded");
            }
            let summary = orchestrator.run(args.max_videos, args.dry_run).await;
            print_summary(&summary, args.dry_run, args.json);
            if summary.has_errors() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    })
    .await;

    match outcome {
        Some(code) => code,
        None => {
            tracing::warn!("interrupted, partial downloads will be removed on the next run");
            eprintln!("Interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

fn validate(config: &Config) -> ExitCode {
    println!("Configuration: OK");
    println!("  Channel: {}", config.channel.channel_url);
    println!("  Library: {}", config.storage.base_directory.display());

    let mut ok = true;

    let environment = config.check_environment();
    if environment.is_complete() {
        println!("Environment: OK");
    } else {
        println!("Environment: missing {}", environment.missing.join(", "));
        println!("  (the upload feed will be used instead of the video API)");
    }

    match YtDlpDownloader::from_config(&config.download) {
        Ok(downloader) if downloader.binary_path().exists() => {
            println!("yt-dlp: {}", downloader.binary_path().display());
        }
        Ok(downloader) => {
            println!("yt-dlp: {} does not exist", downloader.binary_path().display());
            ok = false;
        }
        Err(e) => {
            println!("yt-dlp: {e}");
            ok = false;
        }
    }

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

async fn force_download(orchestrator: &Orchestrator, url: &str, json: bool) -> ExitCode {
    match orchestrator.force_download(url).await {
        Ok(report) => {
            if json {
                print_json(&report);
            }
            match report.download_status {
                DownloadStatus::Success | DownloadStatus::Existing => {
                    if !json {
                        println!("Video downloaded successfully: {}", report.title);
                    }
                    ExitCode::SUCCESS
                }
                DownloadStatus::Failed | DownloadStatus::Pending => {
                    if !json {
                        println!(
                            "Video download failed: {}",
                            report.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            eprintln!("Video download failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_status(report: &StatusReport, json: bool) {
    if json {
        print_json(report);
        return;
    }

    println!("{}", "=".repeat(60));
    println!("TUBESHELF STATUS");
    println!("{}", "=".repeat(60));
    println!("Timestamp: {}", report.timestamp.format("%Y-%m-%dT%H:%M:%S"));
    println!("Channel: {}", report.channel_url);
    println!("Filters: {}", report.filter_summary);
    println!("Library: {}", report.library.base_directory.display());
    println!("Downloads: {}", report.library.total_downloads);
    println!("Total size: {} MB", report.library.total_size_mb);
    println!("Organize by season: {}", report.organize_by_season);
    println!("Generate metadata: {}", report.generate_metadata);
    match &report.quota_usage {
        Some(quota) => println!(
            "API quota: {}/{} used ({:.1}%) on {} (UTC)",
            quota.used, quota.limit, quota.percent_used, quota.reset_date
        ),
        None => println!("API quota: not in use (feed only)"),
    }
}

fn print_summary(summary: &RunSummary, dry_run: bool, json: bool) {
    if json {
        print_json(summary);
        return;
    }

    println!();
    println!("Results:");
    println!("   New videos found: {}", summary.new_videos_found);
    if !dry_run {
        println!("   Already downloaded: {}", summary.already_downloaded);
        println!("   Downloads attempted: {}", summary.downloads_attempted);
        println!("   Downloads successful: {}", summary.downloads_successful);
        println!("   Downloads failed: {}", summary.downloads_failed);
    }

    if !summary.videos_processed.is_empty() {
        println!();
        println!("Videos processed:");
        for video in &summary.videos_processed {
            let marker = match video.download_status {
                DownloadStatus::Success => "[ok]",
                DownloadStatus::Existing => "[have]",
                DownloadStatus::Failed => "[failed]",
                DownloadStatus::Pending => "[pending]",
            };
            println!("   {marker} {}", video.title);
        }
    }

    if summary.has_errors() {
        println!();
        println!("Errors:");
        for error in &summary.errors {
            println!("   {error}");
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Error: failed to serialize output: {e}"),
    }
}
