//! CLI + environment configuration for the bridge runner.
use anyhow::{Context, Result};
use clap::Parser;

use ground_protocol::codec::KeyRing;
use ground_protocol::config::StationListConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub station_list_path: String,
    pub sqlite_dir: String,
    pub broker_a_host: String,
    pub broker_a_port: u16,
    pub keys: KeyRing,
}

#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// JSON file with `{"stations": [...]}` (§4.5, `StationConfig`).
    #[arg(long, default_value = "config/stations.json")]
    pub station_list_path: String,

    /// Directory holding one SQLite file per station (`<station_id>.db`).
    #[arg(long, default_value = "data/bridge")]
    pub sqlite_dir: String,

    #[arg(long, env = "BROKER_A_HOST", default_value = "127.0.0.1")]
    pub broker_a_host: String,
    #[arg(long, env = "BROKER_A_PORT", default_value_t = 1883)]
    pub broker_a_port: u16,

    /// 64 hex chars (32 bytes), selected when `EXT_HDR_DATA == 0`.
    #[arg(long, env = "FRAME_KEY_0")]
    pub frame_key_0: String,
    /// 64 hex chars (32 bytes), selected when `EXT_HDR_DATA == 1`.
    #[arg(long, env = "FRAME_KEY_1")]
    pub frame_key_1: String,
}

impl Cli {
    pub fn parse_and_build_config() -> Result<Config> {
        let c = <Cli as Parser>::parse();
        let k0 = parse_key(&c.frame_key_0).context("parsing FRAME_KEY_0")?;
        let k1 = parse_key(&c.frame_key_1).context("parsing FRAME_KEY_1")?;
        Ok(Config {
            station_list_path: c.station_list_path,
            sqlite_dir: c.sqlite_dir,
            broker_a_host: c.broker_a_host,
            broker_a_port: c.broker_a_port,
            keys: KeyRing::new(k0, k1),
        })
    }
}

fn parse_key(hex_str: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str).context("key is not valid hex")?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow::anyhow!("key must be 32 bytes, got {}", v.len()))
}

pub fn load_station_list(path: &str) -> Result<StationListConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading station list config {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing station list config {path}"))
}
