use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration by layering a TOML file and
    /// `ZDTE_`-prefixed environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed.
    pub fn load(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ZDTE_").split("__"))
            .extract()?;

        debug!(
            path,
            account_size = %config.account.account_size,
            auto_execute = config.trading.auto_execute,
            "Configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::load("config/does-not-exist.toml").unwrap();
        assert_eq!(config.account.max_positions, 2);
        assert_eq!(config.gateway.mode, "paper");
    }
}
