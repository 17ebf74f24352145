use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use kennel::{initialize, RootConfig, RootError, StorageBackendKind};
use kennel_core::PrincipalId;

/// Kennel: authenticated notifications with real-time fan-out
#[derive(Parser, Debug)]
#[command(name = "kennel", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration with a fresh token secret
    Init {
        /// Storage backend: memory or sqlite
        #[arg(long, default_value = "memory")]
        backend: String,

        /// Database file for the sqlite backend
        #[arg(long)]
        db_path: Option<PathBuf>,
    },

    /// Start the HTTP server
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print a bearer token for a principal
    IssueToken {
        /// Principal id the token names
        #[arg(long)]
        principal: String,

        /// Token lifetime in seconds (defaults to auth.token_ttl_secs)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Register a principal in the sqlite principal directory
    AddPrincipal {
        /// Principal id to register
        id: String,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("kennel=debug,kennel_auth=debug,kennel_notify=debug,kennel_store=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kennel=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RootError> {
    match cli.command {
        Commands::Init { backend, db_path } => cmd_init(cli.config.as_ref(), &backend, db_path),
        Commands::Serve { bind, port } => cmd_serve(cli.config.as_ref(), bind, port).await,
        Commands::IssueToken {
            principal,
            ttl_secs,
        } => cmd_issue_token(cli.config.as_ref(), &principal, ttl_secs).await,
        Commands::AddPrincipal { id } => cmd_add_principal(cli.config.as_ref(), &id),
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    backend: &str,
    db_path: Option<PathBuf>,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;

    config.storage.backend = match backend {
        "memory" => StorageBackendKind::Memory,
        "sqlite" => StorageBackendKind::Sqlite,
        other => {
            return Err(RootError::Config(format!(
                "unknown backend '{}' (expected memory or sqlite)",
                other
            )))
        }
    };
    if let Some(path) = db_path {
        config.storage.path = path;
    }
    if config.auth.token_secret.is_none() {
        config.auth.token_secret = Some(kennel_auth::TokenKey::generate().to_hex());
    }
    config.validate()?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(&save_path, perms);
    }

    println!("Kennel initialized.");
    println!("  Config:  {}", save_path.display());
    println!("  Backend: {:?}", config.storage.backend);
    if config.storage.backend == StorageBackendKind::Sqlite {
        println!("  DB path: {}", config.storage.path.display());
    }

    Ok(())
}

async fn cmd_serve(
    config_path: Option<&PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let kennel = Arc::new(initialize(config)?);
    let addr = format!("{}:{}", kennel.config.server.bind, kennel.config.server.port);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        RootError::Internal(format!("failed to bind {}: {}", addr, e))
    })?;
    info!(addr = %addr, "kennel listening");
    println!("Kennel serving on http://{}", addr);

    let router = kennel::http::build_router(kennel);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(RootError::Io)?;

    info!("kennel shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn cmd_issue_token(
    config_path: Option<&PathBuf>,
    principal: &str,
    ttl_secs: Option<u64>,
) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    if config.auth.token_secret.is_none() {
        return Err(RootError::Config(
            "auth.token_secret must be set to issue tokens (run `kennel init`)".into(),
        ));
    }

    let kennel = initialize(config)?;
    let principal = PrincipalId::new(principal.trim());
    if principal.is_empty() {
        return Err(RootError::Config("principal must not be empty".into()));
    }
    if !kennel.directory().contains(&principal).await? {
        warn!(principal = %principal, "principal is not registered; the token will be refused");
    }

    let token = match ttl_secs {
        Some(ttl) => kennel.issue_token_for(&principal, ttl)?,
        None => kennel.issue_token(&principal)?,
    };
    println!("{}", token.as_str());
    Ok(())
}

fn cmd_add_principal(config_path: Option<&PathBuf>, id: &str) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    if config.storage.backend != StorageBackendKind::Sqlite {
        return Err(RootError::Config(
            "add-principal needs the sqlite backend; list memory principals in storage.principals"
                .into(),
        ));
    }

    let kennel = initialize(config)?;
    let id = PrincipalId::new(id.trim());
    if id.is_empty() {
        return Err(RootError::Config("principal must not be empty".into()));
    }
    if kennel.directory().add(&id)? {
        println!("Registered principal {}", id);
    } else {
        println!("Principal {} already registered", id);
    }
    Ok(())
}
