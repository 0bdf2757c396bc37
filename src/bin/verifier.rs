use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use msingi_registry::{
    config::CONFIG_ENV_VAR, Config, DeviceRegistry, JsonLinesStore, NullifierSet,
    SubmissionFile, SystemClock, VerificationGateway,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Verify an anonymous contribution submission", long_about = None)]
struct Args {
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    submission_file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    info!("Loading submission from: {}", args.submission_file.display());
    let metadata = fs::metadata(&args.submission_file).with_context(|| {
        format!(
            "Failed to read submission file metadata: {}",
            args.submission_file.display()
        )
    })?;
    debug!("Submission file size: {} bytes", metadata.len());

    let max_size = config.limits.max_submission_file_size;
    if metadata.len() > max_size {
        return Err(anyhow::anyhow!(
            "Submission file too large: {} bytes (max {} bytes)",
            metadata.len(),
            max_size
        ));
    }

    let content =
        fs::read_to_string(&args.submission_file).context("Failed to read submission file")?;
    let file: SubmissionFile =
        serde_json::from_str(&content).context("Failed to parse submission JSON")?;
    let submission = file
        .to_submission()
        .context("Submission validation failed")?;

    let registry = DeviceRegistry::open(
        Arc::new(JsonLinesStore::new(&config.registry.store_file)),
        Arc::new(SystemClock),
        config.registry.clone(),
    )
    .context("Failed to load registry")?;

    let nullifiers = if config.nullifiers.enable_persistence {
        NullifierSet::open(&config.nullifiers.spent_file).with_context(|| {
            format!(
                "Failed to open nullifier journal: {}",
                config.nullifiers.spent_file.display()
            )
        })?
    } else {
        NullifierSet::new()
    };

    let gateway = VerificationGateway::new(Arc::new(registry), Arc::new(nullifiers));
    let verdict = gateway
        .submit(&submission)
        .context("Failed to record nullifier")?;

    let receipt = match verdict.into_result(&submission) {
        Ok(receipt) => receipt,
        Err(e) => {
            error!("Submission rejected: {}", e.kind());
            println!("Submission REJECTED: {e}");
            return Err(e).context("Submission rejected");
        }
    };

    println!("Submission ACCEPTED");
    println!("  Nullifier: {}", hex::encode(receipt.nullifier));
    println!("  Commitment: {}", hex::encode(receipt.commitment));
    println!("  Root: {}", hex::encode(receipt.root));
    if let Some(score) = receipt.quality_score {
        println!("  Quality score: {score}");
    }
    Ok(())
}
