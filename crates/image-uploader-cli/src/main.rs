use anyhow::Context;
use clap::{Parser, Subcommand};
use image_uploader_core::config::{default_config_path, LogLevel};
use image_uploader_core::discovery::expand_paths;
use image_uploader_core::remote::{edit_url, profile_url};
use image_uploader_core::{logging, preview, Config, Error, ExifTool, ImageUploader};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status for configuration problems, reported before any file is touched
const CONFIG_ERROR_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(name = "image-uploader")]
#[command(about = "Upload images to Flickr, filing them into albums by keyword")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload images to Flickr
    Upload {
        /// Image files, or directories containing images
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Upload even if the image has been uploaded before
        #[arg(short, long)]
        force: bool,

        /// Show what would be done without changing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Search directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Verbosity level
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show an image's metadata and the actions the rules would take
    Info {
        /// Image files, or directories containing images
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Search directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "image-uploader.json")]
        path: PathBuf,
    },
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        let code = match e.downcast_ref::<Error>() {
            Some(Error::Configuration(_)) => CONFIG_ERROR_EXIT_CODE,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Upload {
            files,
            force,
            dry_run,
            recursive,
            verbose,
            config,
        } => {
            let mut config = load_config(config.as_deref())?;
            config.force = force;
            config.dry_run = dry_run;

            // Set log level based on verbosity
            config.log_level = match verbose {
                0 => config.log_level,
                1 => LogLevel::Debug,
                _ => LogLevel::Trace,
            };
            init_logging(&config)?;

            let stop_requested = Arc::new(AtomicBool::new(false));
            let handler_flag = Arc::clone(&stop_requested);
            ctrlc::set_handler(move || {
                eprintln!("\nStopping after the current image...");
                handler_flag.store(true, Ordering::SeqCst);
            })
            .context("Failed to install the interrupt handler")?;

            let username = config.flickr.username.clone();
            let uploader = ImageUploader::from_config(config)?.with_shutdown_flag(stop_requested);

            let files = expand_paths(&files, recursive);
            if files.is_empty() {
                warn!("No images to upload");
            }
            info!("Processing {} files", files.len());

            let summary = uploader.run(&files);

            println!("All Done");
            if summary.not_processed > 0 {
                println!("Stopped early, {} files not processed", summary.not_processed);
            }
            if summary.failed > 0 {
                println!("{} files could not be uploaded", summary.failed);
            }
            println!("Your photos: {}", profile_url(&username));
            if !summary.photo_ids.is_empty() {
                println!("Edit uploaded photos: {}", edit_url(&summary.photo_ids));
            }

            Ok(())
        }

        Commands::Info {
            files,
            recursive,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(&config)?;
            config.validate()?;
            let exiftool = ExifTool::from_config(&config)?;

            for file in expand_paths(&files, recursive) {
                println!("{}", file.display());
                match preview(&config, &exiftool, &file) {
                    Ok((image, actions)) => {
                        println!("  Title: {}", image.title);
                        println!("  Description: {}", image.description);
                        println!("  Keywords: {}", image.keywords.join(", "));
                        if let Some(date) = image.date {
                            println!("  Taken: {}", date.format("%Y-%m-%d %H:%M:%S"));
                        }
                        for line in actions.describe() {
                            println!("  Would apply {}", line);
                        }
                    }
                    Err(e) => println!("  Error: {}", e),
                }
                println!();
            }

            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}

/// Load the config file, then let the environment (and a `.env` file)
/// override it. A missing default config file is not an error.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => {
            let default_path = default_config_path()?;
            if default_path.exists() {
                Config::from_file(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Log to rotated files when a log directory is configured, else to stderr
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let level: LevelFilter = config.log_level.to_level_filter();

    match &config.log_dir {
        Some(log_dir) => logging::init_logger(log_dir, level)?,
        None => env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(level.as_str()),
        )
        .init(),
    }

    Ok(())
}
