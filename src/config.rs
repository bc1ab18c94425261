use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::provider::{RemoteProvider, RequestShape, ResponseProvider, SimulatedProvider};

pub const BACKEND_URL_ENV: &str = "BACKEND_URL";
pub const DATABASE_URL_ENV: &str = "CHAT_DATABASE_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProviderKind {
    #[default]
    Simulated,
    Remote,
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<ProviderKind>,
    pub backend_url: Option<String>,
    pub shape: Option<RequestShape>,
    pub database_url: Option<String>,
    pub settings_file: Option<PathBuf>,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub provider: ProviderKind,
    pub backend_url: Option<Url>,
    pub shape: RequestShape,
    pub database_url: Option<String>,
    pub settings_file: Option<PathBuf>,
    pub simulated_delay: Duration,
}

impl AppConfig {
    /// Command line first, then the environment, then defaults.
    pub fn resolve(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(overrides: ConfigOverrides, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend_url = overrides
            .backend_url
            .or_else(|| env(BACKEND_URL_ENV))
            .map(|raw| Url::parse(&raw))
            .transpose()?;
        let provider = overrides.provider.unwrap_or_default();
        if provider == ProviderKind::Remote && backend_url.is_none() {
            anyhow::bail!("remote provider needs --backend-url or {}", BACKEND_URL_ENV);
        }
        Ok(Self {
            provider,
            backend_url,
            shape: overrides.shape.unwrap_or_default(),
            database_url: resolve_database_url(overrides.database_url, &env),
            settings_file: overrides.settings_file,
            simulated_delay: overrides
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(SimulatedProvider::DEFAULT_DELAY),
        })
    }

    pub fn build_provider(&self) -> anyhow::Result<Arc<dyn ResponseProvider>> {
        match self.provider {
            ProviderKind::Simulated => Ok(Arc::new(SimulatedProvider::new(self.simulated_delay))),
            ProviderKind::Remote => {
                let url = self
                    .backend_url
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("no backend url configured"))?;
                Ok(Arc::new(RemoteProvider::new(url.as_str(), self.shape)))
            }
        }
    }
}

/// Database location shared by every subcommand: flag, then `CHAT_DATABASE_URL`.
pub fn resolve_database_url(flag: Option<String>, env: impl Fn(&str) -> Option<String>) -> Option<String> {
    flag.or_else(|| env(DATABASE_URL_ENV))
}
