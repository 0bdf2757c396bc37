use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use msingi_registry::{
    config::CONFIG_ENV_VAR,
    utils::parse_hex_bytes,
    Config, DeviceId, DeviceRegistry, JsonLinesStore, MembershipProofFile, SystemClock,
};
use rand::RngCore;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage the approved device registry", long_about = None)]
struct Args {
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new device
    Register {
        #[arg(short, long)]
        device: String,

        /// Interpret the device id as hex instead of text
        #[arg(long = "hex")]
        is_hex: bool,

        /// Opaque metadata as hex
        #[arg(short, long)]
        metadata: Option<String>,
    },
    /// List every registered device
    List,
    /// Print the published root
    Root,
    /// Write a membership proof for a device as JSON
    Proof {
        #[arg(short, long)]
        device: String,

        #[arg(long = "hex")]
        is_hex: bool,

        #[arg(short, long, default_value = "proof.json")]
        output: PathBuf,
    },
    /// Generate a random 32-byte device secret
    Keygen,
}

fn parse_device_id(device: &str, is_hex: bool) -> Result<DeviceId> {
    if is_hex {
        let bytes = parse_hex_bytes(device)
            .with_context(|| format!("Invalid hex device id '{device}'"))?;
        Ok(DeviceId::new(bytes))
    } else {
        Ok(DeviceId::from(device.trim()))
    }
}

fn open_registry(config: &Config) -> Result<DeviceRegistry> {
    let store = JsonLinesStore::new(&config.registry.store_file);
    DeviceRegistry::open(
        Arc::new(store),
        Arc::new(SystemClock),
        config.registry.clone(),
    )
    .with_context(|| {
        format!(
            "Failed to load registry from {}",
            config.registry.store_file.display()
        )
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_optional(args.config.as_deref())?;

    match args.command {
        Command::Register {
            device,
            is_hex,
            metadata,
        } => {
            let registry = open_registry(&config)?;
            let device_id = parse_device_id(&device, is_hex)?;
            let metadata = metadata
                .map(|m| parse_hex_bytes(&m).context("Invalid metadata hex"))
                .transpose()?;

            let identity = registry
                .register(device_id, metadata)
                .context("Registration failed")?;

            println!("Registered device: {}", identity.device_id);
            println!("  Registration day: {}", identity.registration_epoch);
            println!("  Expiry day: {}", identity.expiry_epoch);
            println!("  Devices: {}", registry.len());
            println!("  Root: {}", hex::encode(registry.root()));
        }
        Command::List => {
            let registry = open_registry(&config)?;
            for identity in registry.list_all() {
                let status = if registry.is_approved(&identity.device_id) {
                    "approved"
                } else {
                    "expired"
                };
                println!(
                    "{}\t{}\t{}\t{}",
                    identity.device_id, identity.registration_epoch, identity.expiry_epoch, status
                );
            }
        }
        Command::Root => {
            let registry = open_registry(&config)?;
            let snapshot = registry.snapshot();
            println!("{}", hex::encode(snapshot.root));
            info!("{} devices in registry", snapshot.device_count);
        }
        Command::Proof {
            device,
            is_hex,
            output,
        } => {
            let registry = open_registry(&config)?;
            let device_id = parse_device_id(&device, is_hex)?;
            let proof = registry
                .get_proof(&device_id)
                .with_context(|| format!("Failed to build proof for {device_id}"))?;

            let export = MembershipProofFile::from_proof(&proof);
            let rendered = serde_json::to_string_pretty(&export)
                .context("Failed to serialize proof to JSON")?;
            fs::write(&output, rendered)
                .with_context(|| format!("Failed to write proof file: {}", output.display()))?;

            println!("{proof}");
            println!("Proof written to: {}", output.display());
        }
        Command::Keygen => {
            let mut secret = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            println!("{}", hex::encode(secret));
        }
    }

    Ok(())
}
