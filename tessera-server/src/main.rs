//! Tessera license server and operator CLI.
//!
//! Usage:
//!   tessera keygen --key-version 1
//!   tessera serve --db licenses.db --signing-key-file signing.key
//!   tessera issue --owner <uuid> --tier pro --days 30
//!
//! Every command that touches licenses opens the same SQLite database, so
//! operators can issue and revoke while the server is running.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::{fs, path::PathBuf, sync::Arc};
use tessera_authority::{IssueRequest, LicenseAuthority};
use tessera_license::{KeyPair, KeyRing, KeyVersion, SigningKey, Tier, VerifyingKey, validate_offline};
use tessera_server::build_router;
use tessera_store::SqliteStore;
use tessera_types::{LicenseId, OwnerId};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(about = "Tessera license server and operator tools")]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP license server
    Serve {
        #[command(flatten)]
        authority: AuthorityArgs,

        /// Address to listen on
        #[arg(long, env = "TESSERA_LISTEN", default_value = "0.0.0.0:8443")]
        listen: String,
    },
    /// Generate a signing key pair
    Keygen {
        /// Version tag written into tokens signed with this key
        #[arg(long, default_value = "1")]
        key_version: u32,

        /// Write the private key here instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Issue a license
    Issue {
        #[command(flatten)]
        authority: AuthorityArgs,

        /// Owner account ID
        #[arg(long)]
        owner: String,

        /// community, trial, pro or enterprise
        #[arg(long)]
        tier: String,

        /// Validity in days
        #[arg(long)]
        days: u32,

        /// Activate this hardware ID immediately
        #[arg(long)]
        hardware_id: Option<String>,
    },
    /// Revoke a license
    Revoke {
        #[command(flatten)]
        authority: AuthorityArgs,

        license_id: String,
    },
    /// List an owner's licenses
    Licenses {
        #[command(flatten)]
        authority: AuthorityArgs,

        owner: String,
    },
    /// List a license's activations
    Activations {
        #[command(flatten)]
        authority: AuthorityArgs,

        license_id: String,
    },
    /// Verify a token offline against a public key
    Verify {
        token: String,

        /// Base64 public key
        #[arg(long, env = "TESSERA_PUBLIC_KEY")]
        public_key: String,

        #[arg(long, env = "TESSERA_KEY_VERSION", default_value = "1")]
        key_version: u32,
    },
}

#[derive(Args, Debug)]
struct AuthorityArgs {
    /// SQLite database path
    #[arg(long, env = "TESSERA_DB", default_value = "tessera-licenses.db")]
    db: PathBuf,

    /// Base64 private signing key
    #[arg(long, env = "TESSERA_SIGNING_KEY", hide_env_values = true)]
    signing_key: Option<String>,

    /// File holding the base64 private signing key
    #[arg(long, env = "TESSERA_SIGNING_KEY_FILE", conflicts_with = "signing_key")]
    signing_key_file: Option<PathBuf>,

    /// Version of the signing key
    #[arg(long, env = "TESSERA_KEY_VERSION", default_value = "1")]
    key_version: u32,

    /// Retired public keys still accepted, as `version:base64`
    #[arg(long = "retired-key", value_name = "VERSION:KEY")]
    retired_keys: Vec<String>,
}

impl AuthorityArgs {
    fn signing_key(&self) -> Result<SigningKey> {
        let encoded = match (&self.signing_key, &self.signing_key_file) {
            (Some(key), _) => key.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("failed to read signing key {}", path.display()))?,
            (None, None) => bail!("a signing key is required (--signing-key or --signing-key-file)"),
        };
        SigningKey::from_base64(KeyVersion::new(self.key_version), &encoded)
            .context("failed to decode signing key")
    }

    fn retired_keys(&self) -> Result<KeyRing> {
        let mut ring = KeyRing::new();
        for entry in &self.retired_keys {
            let (version, key) = entry
                .split_once(':')
                .with_context(|| format!("retired key must be VERSION:KEY, got {entry}"))?;
            let version: u32 = version
                .parse()
                .with_context(|| format!("invalid retired key version {version}"))?;
            let key = VerifyingKey::from_base64(KeyVersion::new(version), key)
                .with_context(|| format!("failed to decode retired key v{version}"))?;
            ring.insert(key);
        }
        Ok(ring)
    }

    fn open(&self) -> Result<Arc<LicenseAuthority<SqliteStore>>> {
        let store = SqliteStore::open(&self.db)
            .with_context(|| format!("failed to open database {}", self.db.display()))?;
        Ok(Arc::new(LicenseAuthority::new(
            Arc::new(store),
            self.signing_key()?,
            self.retired_keys()?,
        )))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Command::Serve { authority, listen } => {
            let authority_handle = authority.open()?;
            info!(
                db = %authority.db.display(),
                kid = %authority_handle.issuer().signing_key().version(),
                accepted_keys = authority_handle.validator().keys().len(),
                "license authority ready"
            );
            let app = build_router(authority_handle);
            let listener = tokio::net::TcpListener::bind(&listen)
                .await
                .with_context(|| format!("failed to bind {listen}"))?;
            info!("license server listening on {}", listener.local_addr()?);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
        }
        Command::Keygen { key_version, out } => {
            let pair = KeyPair::generate(KeyVersion::new(key_version));
            let serialized = pair.serialize();
            match out {
                Some(path) => {
                    fs::write(&path, serialized.private_key.as_bytes())
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("wrote private key v{key_version} to {}", path.display());
                }
                None => println!("private_key: {}", serialized.private_key.as_str()),
            }
            println!("public_key:  {}", serialized.public_key);
            println!("key_version: {key_version}");
        }
        Command::Issue {
            authority,
            owner,
            tier,
            days,
            hardware_id,
        } => {
            let owner = OwnerId::parse(&owner).context("invalid owner ID")?;
            let tier: Tier = tier.parse()?;
            let mut request = IssueRequest::new(owner, tier, days);
            if let Some(hardware_id) = hardware_id {
                request = request.with_hardware(hardware_id);
            }
            let issuance = authority.open()?.issue_license(request)?;
            print_json(&issuance.license)?;
            for id in &issuance.superseded {
                println!("superseded: {id}");
            }
            println!("token: {}", issuance.token);
        }
        Command::Revoke {
            authority,
            license_id,
        } => {
            let license_id = LicenseId::parse(&license_id).context("invalid license ID")?;
            print_json(&authority.open()?.revoke_license(license_id)?)?;
        }
        Command::Licenses { authority, owner } => {
            let owner = OwnerId::parse(&owner).context("invalid owner ID")?;
            let authority = authority.open()?;
            print_json(&authority.user_licenses(owner)?)?;
            print_json(&authority.entitlements(owner)?)?;
        }
        Command::Activations {
            authority,
            license_id,
        } => {
            let license_id = LicenseId::parse(&license_id).context("invalid license ID")?;
            print_json(&authority.open()?.license_activations(license_id)?)?;
        }
        Command::Verify {
            token,
            public_key,
            key_version,
        } => {
            let key = VerifyingKey::from_base64(KeyVersion::new(key_version), &public_key)?;
            match validate_offline(&token, &KeyRing::from(key)) {
                Ok(payload) => print_json(&payload)?,
                Err(err) => bail!("{err}: {}", err.remedy()),
            }
        }
    }

    Ok(())
}
