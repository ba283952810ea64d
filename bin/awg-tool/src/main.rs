use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use awg_core::MessageType;
use awg_obfs::{ObfuscationConfig, ObfuscationState};
use awg_prng::{KeystreamRng, RandomSource};
use clap::{Parser, Subcommand};
use log::{debug, info};

/// Inspect and exercise an obfuscation config without bringing up a tunnel.
#[derive(Parser)]
#[command(name = "awg-tool", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Parse and validate a config, then print it normalised.
    Check { file: PathBuf },
    /// Draw type-field values for a message category (1-4).
    Magic {
        file: PathBuf,
        category: u32,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Report which category an observed type-field value belongs to.
    Classify { file: PathBuf, value: u32 },
    /// Show the junk each message category would carry.
    Junk { file: PathBuf },
    /// RFC 1071 checksum of hex-encoded bytes.
    Checksum { hex: String },
}

fn load(path: &Path, rng: Arc<dyn RandomSource>) -> anyhow::Result<ObfuscationConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg = ObfuscationConfig::from_config_str(&text, rng).with_context(|| format!("loading {}", path.display()))?;
    debug!("{} parsed (enabled={})", path.display(), cfg.enabled);
    Ok(cfg)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Check { file } => {
            let rng: Arc<dyn RandomSource> = Arc::new(KeystreamRng::from_entropy()?);
            let cfg = load(&file, rng)?;
            print!("{}", cfg.to_config_string());
            info!("{}: ok (obfuscation {})", file.display(), if cfg.enabled { "on" } else { "off" });
        }
        Cmd::Magic { file, category, count } => {
            let rng: Arc<dyn RandomSource> = Arc::new(KeystreamRng::from_entropy()?);
            let state = ObfuscationState::new(load(&file, rng.clone())?, rng)?;
            for _ in 0..count {
                println!("{}", state.get_message_magic(category)?);
            }
        }
        Cmd::Classify { file, value } => {
            let rng: Arc<dyn RandomSource> = Arc::new(KeystreamRng::from_entropy()?);
            let state = ObfuscationState::new(load(&file, rng.clone())?, rng)?;
            let ty = state.message_type_of(value)?;
            println!("{} ({})", ty, ty.wire_value());
        }
        Cmd::Junk { file } => {
            let rng: Arc<dyn RandomSource> = Arc::new(KeystreamRng::from_entropy()?);
            let state = ObfuscationState::new(load(&file, rng.clone())?, rng)?;
            for ty in MessageType::ALL {
                let junk = match ty {
                    MessageType::Initiation => state.create_init_junk()?,
                    MessageType::Response => state.create_response_junk()?,
                    MessageType::CookieReply => state.create_cookie_reply_junk()?,
                    MessageType::Transport => state.create_transport_junk(0)?,
                };
                println!("{:<13} {:>4} bytes  {}", ty, junk.len(), hex::encode(&junk));
            }
            let decoys = state.create_junk_packets()?;
            let sizes: Vec<String> = decoys.iter().map(|p| p.len().to_string()).collect();
            println!("decoys        {} [{}]", decoys.len(), sizes.join(", "));
        }
        Cmd::Checksum { hex: input } => {
            let cleaned: String = input.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
            let bytes = hex::decode(&cleaned).context("input is not valid hex")?;
            let sum = awg_csum::checksum(&bytes, 0);
            println!("sum        0x{:04x}", sum);
            println!("complement 0x{:04x}", !sum);
        }
    }
    Ok(())
}
