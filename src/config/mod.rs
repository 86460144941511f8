mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{EngineSettings, LogSettings, PublishMode, ServerSettings, Settings};

/// Prefix of environment variables read by `load_config`, e.g.
/// `LASTSUB__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "LASTSUB";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the server, engine and log configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();
    let server = partial.server;
    let engine = partial.engine;
    let log = partial.log;

    let publish_mode = match engine.as_ref().and_then(|e| e.publish_mode.as_deref()) {
        Some(raw) => raw.parse().map_err(ConfigError::Message)?,
        None => default.engine.publish_mode,
    };

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            db_path: server
                .as_ref()
                .and_then(|s| s.db_path.clone())
                .unwrap_or(default.server.db_path),
        },
        engine: EngineSettings {
            backend_url: engine
                .as_ref()
                .and_then(|e| e.backend_url.clone())
                .unwrap_or(default.engine.backend_url),
            publish_mode,
        },
        log: LogSettings {
            level: log
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
        },
    })
}

#[cfg(test)]
mod tests;
