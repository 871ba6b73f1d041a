use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::engine::{ArbiterConfig, PricingConfig, WeeklyTemplate};

/// Server settings, read from `CHAUFFEUR_*` environment variables.
/// Unset or unparseable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub route_ttl_secs: i64,
    pub route_retries: u32,
    pub routes_file: Option<PathBuf>,
    pub pricing_file: Option<PathBuf>,
    pub template_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 7450,
            data_dir: PathBuf::from("./data"),
            max_connections: 256,
            metrics_port: None,
            compact_threshold: 1000,
            route_ttl_secs: 86_400,
            route_retries: 2,
            routes_file: None,
            pricing_file: None,
            template_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `lookup` receives full variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }
        let d = Self::default();
        let path = |key: &str| lookup(key).filter(|s| !s.trim().is_empty()).map(PathBuf::from);
        Self {
            bind: lookup("CHAUFFEUR_BIND").unwrap_or(d.bind),
            port: parsed(&lookup, "CHAUFFEUR_PORT").unwrap_or(d.port),
            data_dir: path("CHAUFFEUR_DATA_DIR").unwrap_or(d.data_dir),
            max_connections: parsed(&lookup, "CHAUFFEUR_MAX_CONNECTIONS").unwrap_or(d.max_connections),
            metrics_port: parsed(&lookup, "CHAUFFEUR_METRICS_PORT"),
            compact_threshold: parsed(&lookup, "CHAUFFEUR_COMPACT_THRESHOLD").unwrap_or(d.compact_threshold),
            route_ttl_secs: parsed(&lookup, "CHAUFFEUR_ROUTE_TTL_SECS").unwrap_or(d.route_ttl_secs),
            route_retries: parsed(&lookup, "CHAUFFEUR_ROUTE_RETRIES").unwrap_or(d.route_retries),
            routes_file: path("CHAUFFEUR_ROUTES_FILE"),
            pricing_file: path("CHAUFFEUR_PRICING_FILE"),
            template_file: path("CHAUFFEUR_TEMPLATE_FILE"),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }

    /// Engine settings, with pricing and template files applied and validated.
    pub fn arbiter_config(&self) -> io::Result<ArbiterConfig> {
        let pricing: PricingConfig = match &self.pricing_file {
            Some(p) => load_json(p)?,
            None => PricingConfig::default(),
        };
        pricing.validate().map_err(invalid)?;

        let template: WeeklyTemplate = match &self.template_file {
            Some(p) => load_json(p)?,
            None => WeeklyTemplate::default(),
        };
        template.validate().map_err(invalid)?;

        Ok(ArbiterConfig {
            pricing,
            template,
            route_ttl: chrono::Duration::seconds(self.route_ttl_secs.max(0)),
            route_retries: self.route_retries,
            route_backoff: Duration::from_millis(100),
        })
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> io::Result<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| invalid(format!("{}: {e}", path.display())))
}
