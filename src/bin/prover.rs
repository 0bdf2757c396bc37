use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use msingi_registry::{
    compute_commitment,
    config::CONFIG_ENV_VAR,
    derive_nullifier,
    utils::{parse_hash_hex, parse_hex_bytes},
    Config, DeviceId, DeviceRegistry, JsonLinesStore, SubmissionFile, SystemClock,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build an anonymous contribution submission", long_about = None)]
struct Args {
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    device: String,

    /// Device secret as 64 hex characters
    #[arg(short, long, env = "MSINGI_DEVICE_SECRET", hide_env_values = true)]
    secret: String,

    /// Nullifier epoch (round number)
    #[arg(short, long)]
    epoch: u32,

    /// Content pointer of the contribution, e.g. an IPFS CID
    #[arg(long)]
    cid: String,

    /// Identity key material as hex
    #[arg(long)]
    key: String,

    #[arg(short, long)]
    round: u64,

    #[arg(short, long)]
    quality: Option<u8>,

    #[arg(short, long, default_value = "submission.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    let secret = parse_hash_hex(&args.secret).context("Device secret must be 32 bytes of hex")?;
    let key_material = parse_hex_bytes(&args.key).context("Invalid key material hex")?;

    info!(
        "Loading registry from: {}",
        config.registry.store_file.display()
    );
    let registry = DeviceRegistry::open(
        Arc::new(JsonLinesStore::new(&config.registry.store_file)),
        Arc::new(SystemClock),
        config.registry.clone(),
    )
    .context("Failed to load registry")?;

    let device_id = DeviceId::from(args.device.trim());
    if !registry.is_approved(&device_id) {
        warn!("Device {device_id} is not currently approved");
    }

    println!("Generating Merkle proof...");
    let proof = registry
        .get_proof(&device_id)
        .with_context(|| format!("Failed to build proof for {device_id}"))?;
    debug!("{proof}");

    println!("Computing nullifier for epoch {}...", args.epoch);
    let nullifier = derive_nullifier(&secret, args.epoch);

    let commitment = compute_commitment(args.cid.as_bytes(), &key_material, args.round);

    let output = SubmissionFile::from_parts(&proof, &nullifier, &commitment, args.quality);
    output.validate().context("Generated submission is malformed")?;

    let json_output =
        serde_json::to_string_pretty(&output).context("Failed to serialize submission to JSON")?;
    fs::write(&args.output, json_output)
        .with_context(|| format!("Failed to write submission file: {}", args.output.display()))?;

    println!("Submission written to: {}", args.output.display());
    println!("Merkle Root: {}", output.merkle_root);
    println!("Nullifier: {}", output.nullifier);
    println!("Commitment: {}", output.commitment);
    println!("Anonymity set: {} devices", registry.len());

    Ok(())
}
