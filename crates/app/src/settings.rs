//! Handles settings for the application. Configuration is read from `settings.toml` (or the
//! file given on the command line) and can be overridden with `BUDGET__SECTION__KEY`
//! environment variables.
//!
//! ```toml
//! [app]
//! level = "info"
//! timezone = "Europe/Rome"
//!
//! [database]
//! sqlite = "budget.db"
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
    pub timezone: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .set_default("app.timezone", "UTC")?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("BUDGET").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
