use std::path::PathBuf;

use clap::{Parser, Subcommand};

use range_relay::config::RelayConfig;
use range_relay::http::LogicalPath;
use range_relay::relay::RelayService;
use range_relay::upload::staging::format_file_size;
use range_relay::upload::{DatasetStore, HubClient, RepoCreation, RepoId, RepoKind, RepoSpec};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the range relay's dataset", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults plus environment when omitted.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one local file to the default repository
    Upload {
        local: PathBuf,
        /// Path inside the repository (defaults to the file name)
        #[arg(long)]
        dest: Option<String>,
    },
    /// List files in the default repository
    Files,
    /// Delete one file from the default repository
    Delete { path: String },
    /// Resolve a logical path to its delivery URL
    Resolve { logical_path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = RelayConfig::load(cli.config.as_deref())?;
    let repo = RepoId::new(
        config.upload.repo_type.parse::<RepoKind>()?,
        config.upload.repo_name.clone(),
    );

    match cli.command {
        Commands::Upload { local, dest } => {
            let hub = HubClient::from_config(&config)?;
            let dest = match dest {
                Some(dest) => dest.trim_start_matches('/').to_string(),
                None => local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or("local path has no file name")?,
            };

            let spec = RepoSpec {
                repo: repo.clone(),
                license: Some(config.upload.license.clone()),
                private: false,
            };
            if hub.create_repo_if_absent(&spec).await? == RepoCreation::Created {
                println!("Created repository {}", repo);
            }

            let content = tokio::fs::read(&local).await?;
            println!("Uploading {} ({})", local.display(), format_file_size(content.len() as u64));
            hub.upload_blob(&repo, &dest, content.into()).await?;
            println!("{}", hub.resolve_url(&repo, &dest));
        }
        Commands::Files => {
            let hub = HubClient::from_config(&config)?;
            let files = hub.list_files(&repo).await?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        Commands::Delete { path } => {
            let hub = HubClient::from_config(&config)?;
            hub.delete_file(&repo, &path).await?;
            println!("Deleted {}", path);
        }
        Commands::Resolve { logical_path } => {
            let relay = RelayService::from_config(&config)?;
            let path = LogicalPath::from_uri_path(&logical_path)?;
            println!("{}", relay.resolve(&path).await?);
        }
    }

    Ok(())
}
