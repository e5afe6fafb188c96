// registered-clients: manage registered API clients on a registry server.
use anyhow::{Context, Result};
use clap::Parser;
use registry_service::cli::{self, Command};
use registry_service::config::default_id_key_path;
use registry_service::models::CallerIdentity;
use registry_service::services::{IdentityKey, RegistryClient};
use std::io;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "registered-clients")]
#[command(about = "Manage registered API clients")]
struct Cli {
    /// Registry server base URL
    #[arg(long, env = "REGISTRY_URL", default_value = "http://localhost:8080")]
    endpoint: String,

    /// Admin API key for registry administration
    #[arg(long, env = "REGISTRY_ADMIN_KEY", hide_env_values = true)]
    admin_key: Option<String>,

    /// Path to the file containing the ID key (only the public key is transmitted)
    #[arg(short = 'i', long, env = "REGISTRY_ID_KEY_FILE", global = true)]
    id_key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    dotenvy::dotenv().ok();
    let args = Cli::parse();
    let id_key_file = args.id_key_file.clone().unwrap_or_else(default_id_key_path);

    let mut registry = RegistryClient::new(&args.endpoint)
        .with_context(|| format!("invalid registry endpoint {}", args.endpoint))?;
    if let Some(admin_key) = &args.admin_key {
        registry = registry.with_admin_key(admin_key.clone());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    let mut out = io::stdout();
    match &args.command {
        Command::Create(create) => {
            cli::create(&registry, create, &id_key_file, &mut out).await?;
        }
        Command::List(list) => {
            if !cli::list(&registry, list, &cancel, &mut out).await? {
                anyhow::bail!("listing interrupted");
            }
        }
        Command::Get(ids) => cli::get(&registry, ids, &mut out).await?,
        Command::Current => {
            let key = IdentityKey::load(&id_key_file)?;
            tracing::info!(path = %id_key_file.display(), "Using ID key from file");
            let caller = CallerIdentity {
                client_id: key.id().to_string(),
            };
            let registry = registry.with_identity(key);
            cli::current(&registry, &caller, &mut out).await?;
        }
        Command::Update(update) => {
            cli::update(&registry, update, &mut out).await?;
        }
        Command::Delete(ids) => cli::delete(&registry, ids, &mut out).await?,
    }
    Ok(())
}
