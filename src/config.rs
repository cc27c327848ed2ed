use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::compose::LedgerScope;

/// How compose commands are spelled when no custom compose executable is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComposeCommandStyle {
    /// `<podman>-compose`
    #[default]
    Default,
    /// `<podman>-compose`, named explicitly.
    PodmanCompose,
    /// `<podman> compose`
    PodmanSpaceCompose,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub podman_path: String,
    pub compose_path: String,
    pub compose_command_style: ComposeCommandStyle,
    pub refresh_debounce_ms: u64,
    pub ledger_scope: LedgerScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_store: Option<PathBuf>,
    pub watch_interval_secs: u64,
    /// Podman machine targeted by `machine start|stop` when none is named.
    pub machine_name: String,
}

pub const DEFAULT_COMPOSE_PATH: &str = "podman-compose";
pub const DEFAULT_MACHINE_NAME: &str = "podman-machine-default";

impl Default for Config {
    fn default() -> Self {
        Self {
            podman_path: "podman".into(),
            compose_path: DEFAULT_COMPOSE_PATH.into(),
            compose_command_style: ComposeCommandStyle::Default,
            refresh_debounce_ms: 300,
            ledger_scope: LedgerScope::Refresh,
            compose_store: None,
            watch_interval_secs: 5,
            machine_name: DEFAULT_MACHINE_NAME.into(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("podtree.toml"))
            .merge(Json::file("podtree.json"))
            .merge(Env::prefixed("PODTREE_"))
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs.max(1))
    }
}
