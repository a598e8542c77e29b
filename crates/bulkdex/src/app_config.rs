//! 🔧 App Configuration: TOML and env vars in, one typed struct out.
//!
//! ```toml
//! [transport.Elasticsearch]
//! url = "http://localhost:9200"
//! api_key = "..."
//!
//! [indexer]
//! num_workers = 4
//!
//! [indexer.flush]
//! max_bytes = 5000000
//! interval_ms = 30000
//!
//! [exporter]
//! index = "logs-generic-default"
//! ```
//!
//! Env vars use the `BULKDEX_` prefix with `__` between nesting levels, so
//! `BULKDEX_INDEXER__FLUSH__INTERVAL_MS=1000` lands on `indexer.flush.interval_ms`. 🦆

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::indexer::IndexerConfig;
use crate::transport::TransportConfig;

/// 📦 Everything the app needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where bulk requests go.
    pub transport: TransportConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub exporter: ExporterConfig,
}

/// 📤 Knobs for the export front end.
#[derive(Debug, Deserialize, Clone)]
pub struct ExporterConfig {
    /// 🏷️ Index used when a record does not name one itself.
    #[serde(default = "default_index")]
    pub index: String,
    /// 🧺 Records handed to the exporter per `push` call.
    #[serde(default = "default_records_per_export")]
    pub records_per_export: usize,
    /// ⏱️ How long shutdown waits for the drain. 0 waits forever.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_index() -> String {
    "logs-generic-default".to_string()
}

fn default_records_per_export() -> usize {
    500
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            records_per_export: default_records_per_export(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ExporterConfig {
    pub fn shutdown_timeout(&self) -> Option<Duration> {
        (self.shutdown_timeout_secs > 0).then(|| Duration::from_secs(self.shutdown_timeout_secs))
    }
}

/// 🚀 Load the config from env vars (`BULKDEX_*`) and, when given, a TOML file.
///
/// - `None`: env vars only. No implicit `bulkdex.toml`.
/// - `Some(path)`: env vars + TOML file, merged. The file wins on conflicts.
///
/// The indexer section is validated here too, so a bad `num_workers` fails at startup
/// instead of at the first document.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("BULKDEX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (BULKDEX_*)",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BULKDEX_*). \
                 No file was provided, so this one is all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config
        .indexer
        .validate()
        .context("💀 The [indexer] section parsed, but it asks for something impossible")?;
    Ok(app_config)
}
