use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use parallax::compile;
use parallax::loader::load_dir;
use parallax::settings::Settings;
use parallax::store::StaticStore;
use parallax::{Resolver, ResolverConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "parallax",
    version,
    about = "Capability-based authorization over KDL policy documents"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "parallax.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a document directory, validate the model and compile every policy
    Validate {
        /// Directory of `.kdl` documents
        dir: PathBuf,
    },
    /// Decide one authorization question for a secret
    Check {
        /// Directory of `.kdl` documents
        dir: PathBuf,
        #[arg(long)]
        secret: String,
        resource: String,
        instance: String,
        capability: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Command::Validate { dir } => validate(&dir),
        Command::Check {
            dir,
            secret,
            resource,
            instance,
            capability,
        } => check(&settings, &dir, &secret, &resource, &instance, &capability).await,
    }
}

fn validate(dir: &std::path::Path) -> Result<()> {
    let loaded = load_dir(dir)?;
    let model = Arc::clone(&loaded.model);
    let tokens = loaded.tokens.len();

    for resource in model.resources() {
        tracing::debug!(
            resource = resource.name(),
            capabilities = resource.capabilities().len(),
            aliases = resource.aliases().len(),
            "Validated resource"
        );
    }

    let store = StaticStore::from(loaded);
    let mut policies: Vec<_> = store.policies().collect();
    policies.sort_by(|a, b| a.name.cmp(&b.name));
    for policy in &policies {
        let compiled = compile(policy, &model).map_err(|source| parallax::ResolveError::Compile {
            policy: policy.name.clone(),
            source,
        })?;
        tracing::info!(
            policy = %policy.name,
            revision = %policy.effective_revision(),
            grants = compiled.grant_count(),
            "Compiled policy"
        );
    }

    println!(
        "ok: {} resources, {} policies, {} tokens (model {})",
        model.len(),
        policies.len(),
        tokens,
        model.fingerprint()
    );
    Ok(())
}

async fn check(
    settings: &Settings,
    dir: &std::path::Path,
    secret: &str,
    resource: &str,
    instance: &str,
    capability: &str,
) -> Result<()> {
    let loaded = load_dir(dir)?;
    let model = Arc::clone(&loaded.model);
    let store = Arc::new(StaticStore::from(loaded));

    let resolver = Resolver::new(
        ResolverConfig::new()
            .with_model(model)
            .with_secret_resolver(store.clone())
            .with_policy_resolver(store)
            .with_settings(&settings.cache),
    )?;

    let acl = resolver
        .resolve_secret(&CancellationToken::new(), secret)
        .await?;

    match acl.check(resource, instance, capability) {
        Ok(()) => {
            println!("allowed");
            Ok(())
        }
        Err(denied) => {
            println!("denied");
            Err(denied.into())
        }
    }
}
