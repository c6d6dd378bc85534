use core_config::FromEnv;
use database::mongodb::ConnectionConfig;

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Application configuration, composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb: ConnectionConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let mongodb = ConnectionConfig::from_env()?;

        Ok(Self {
            mongodb,
            environment,
        })
    }

    /// Database named on the command line, else the configured one
    pub fn database<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or_else(|| self.mongodb.database())
    }
}
