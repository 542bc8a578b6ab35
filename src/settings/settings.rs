use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub jwt: Jwt,
    pub log: Log,
    pub rate_limit: RateLimit,
    pub mysql: Option<MySqlSettings>,
    pub redis: Option<RedisSettings>,
    pub demo_principal: Option<DemoPrincipal>,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub backend: String, // "real" or "memory"
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub cert_path: String,
    pub key_path: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
    #[serde(default = "default_refresh_min_interval_secs")]
    pub refresh_min_interval_secs: i64,
    #[serde(default)]
    pub rotate_refresh_id: bool,
}

fn default_access_ttl_minutes() -> i64 {
    15
}

fn default_refresh_ttl_days() -> i64 {
    7
}

fn default_refresh_min_interval_secs() -> i64 {
    5
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
    pub enabled: bool,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_requests() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct MySqlSettings {
    pub dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    pub dsn: String,
    pub revocation_prefix: String,
}

/// Principal seeded into the in-memory directory, so the "memory" backend
/// is usable without a database. Ignored by the "real" backend.
#[derive(Debug, Deserialize)]
pub struct DemoPrincipal {
    pub subject: String,
    pub password: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
