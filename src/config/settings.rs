use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the backend server, the engine and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub engine: EngineSettings,
    pub log: LogSettings,
}

/// Configuration settings for the backend server.
///
/// Defines the address it binds to and where latest values are stored.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub db_path: String,
}

/// Configuration settings for engines created by the CLI.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EngineSettings {
    pub backend_url: String,
    pub publish_mode: PublishMode,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// How `publish` treats the announce that follows the stored write.
///
/// The write of the latest value is always awaited.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Wait for the backend to acknowledge the announce as well.
    #[default]
    Acknowledged,
    /// Spawn the announce and only log its failure.
    FireAndForget,
}

impl FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "acknowledged" | "ack" => Ok(Self::Acknowledged),
            "fire_and_forget" => Ok(Self::FireAndForget),
            other => Err(format!("unknown publish mode '{other}'")),
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acknowledged => f.write_str("acknowledged"),
            Self::FireAndForget => f.write_str("fire_and_forget"),
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub engine: Option<PartialEngineSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<String>,
}

/// `publish_mode` stays a string here so a bad value is reported by name.
#[derive(Debug, Deserialize)]
pub struct PartialEngineSettings {
    pub backend_url: Option<String>,
    pub publish_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                db_path: "lastsub_db".to_string(),
            },
            engine: EngineSettings {
                backend_url: "ws://127.0.0.1:8080".to_string(),
                publish_mode: PublishMode::Acknowledged,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
