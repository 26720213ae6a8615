use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use revpatch::{EngineConfig, LocalStorage, PatchEngine, PatchRequest, VersionEntry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::Level;

#[derive(Parser)]
#[command(name = "revpatch", about = "Fuzzy SEARCH/REPLACE file editor with versioned backups")]
struct Cli {
    /// Storage root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Isolate storage to a session subdirectory of the root
    #[arg(long, global = true)]
    session: Option<String>,
    /// TOML engine config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the match confidence threshold (0.0 - 1.0)
    #[arg(long, global = true)]
    threshold: Option<f64>,
    /// Log engine steps at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a SEARCH/REPLACE diff to a stored file
    Apply {
        /// Storage path of the file to edit
        path: String,
        /// File holding the diff, or `-` for stdin
        #[arg(long, short)]
        diff: PathBuf,
        /// Label recorded on the backup
        #[arg(long, short)]
        tag: Option<String>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the stored versions of a file
    Versions {
        path: String,
        #[arg(long)]
        json: bool,
    },
    /// Restore a file to a stored version
    Restore {
        path: String,
        #[arg(long = "version", short = 'n')]
        version: u32,
    },
    /// Snapshot the current content of a file
    Backup {
        path: String,
        #[arg(long, short)]
        tag: Option<String>,
    },
    /// Print the content of a stored version
    Show {
        path: String,
        #[arg(long = "version", short = 'n')]
        version: u32,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.match_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

async fn read_diff(source: &Path) -> anyhow::Result<String> {
    if source.as_os_str() == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read diff from stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read diff file: {}", source.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let storage = match &cli.session {
        Some(session) => LocalStorage::with_session(&cli.root, session)?,
        None => LocalStorage::new(&cli.root),
    };
    let engine = PatchEngine::new(Arc::new(storage), config);

    match cli.command {
        Commands::Apply {
            path,
            diff,
            tag,
            json,
        } => {
            let diff_text = read_diff(&diff).await?;
            let mut request = PatchRequest::new(&path, diff_text);
            if let Some(tag) = tag {
                request = request.with_tag(tag);
            }

            let start = Instant::now();
            let outcome = engine.apply_diff(&request).await;
            let elapsed = start.elapsed();

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if outcome.success {
                println!("Diff applied to {}", path);
                if let Some(backup) = &outcome.backup {
                    println!("  Backup: v{} ({})", backup.version, backup.backup_key);
                }
                println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
            }
            if !outcome.success {
                bail!(
                    "{}",
                    outcome.error.unwrap_or_else(|| "patch not applied".to_string())
                );
            }
        }
        Commands::Versions { path, json } => {
            let entries = engine.list_versions(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No versions of {}", path);
            } else {
                for entry in &entries {
                    match entry {
                        VersionEntry::Current { path } => println!("current  {}", path),
                        VersionEntry::Backup(record) => println!(
                            "v{:<6} {}  {}",
                            record.version,
                            record.date(),
                            record.tag.as_deref().unwrap_or("-")
                        ),
                    }
                }
            }
        }
        Commands::Restore { path, version } => {
            let outcome = engine.restore(&path, version).await?;
            println!("Restored {} to version {}", path, outcome.restored_version);
            if let Some(backup) = &outcome.safety_backup {
                println!("  Previous content saved as v{}", backup.version);
            }
            println!("  BLAKE3: {}", outcome.content_blake3);
        }
        Commands::Backup { path, tag } => {
            match engine.versions().create_backup(&path, tag.as_deref()).await? {
                Some(record) => println!("Created v{} ({})", record.version, record.backup_key),
                None => bail!("File not found at {}", path),
            }
        }
        Commands::Show { path, version } => {
            let content = engine.versions().read_version(&path, version).await?;
            print!("{}", String::from_utf8_lossy(&content));
        }
    }

    Ok(())
}
