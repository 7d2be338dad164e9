use crate::error::ConfigError;
use crate::sink::SinkKey;
use crate::transport::KeepAlive;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What an endpoint sends and therefore which sinks it may write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointRole {
    /// Main controller: meta bundle plus front and rear thermal arrays
    Main,
    /// Single thermal camera writing one thermal sink
    Camera { sink: SinkKey },
}

impl EndpointRole {
    pub fn sink_keys(&self) -> Vec<SinkKey> {
        match self {
            EndpointRole::Main => vec![
                SinkKey::Imu,
                SinkKey::Pir,
                SinkKey::Distance,
                SinkKey::Main1,
                SinkKey::Main2,
            ],
            EndpointRole::Camera { sink } => vec![*sink],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    pub role: EndpointRole,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EndpointConfig {
    pub fn new(name: &str, url: &str, role: EndpointRole) -> Self {
        EndpointConfig {
            name: name.to_string(),
            url: url.to_string(),
            role,
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub out_dir: PathBuf,
    /// Flush sinks and log throughput every N processed messages
    pub print_every: u64,
    pub reconnect_delay_ms: u64,
    pub keepalive_interval_secs: u64,
    pub keepalive_timeout_secs: u64,
    /// How often the status snapshot is written
    pub status_interval_secs: u64,
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            print_every: 10,
            reconnect_delay_ms: 1000,
            keepalive_interval_secs: 20,
            keepalive_timeout_secs: 20,
            status_interval_secs: 2,
            endpoints: vec![
                EndpointConfig::new("main", "ws://192.168.121.161:81", EndpointRole::Main),
                EndpointConfig::new(
                    "cam3",
                    "ws://192.168.121.44:85",
                    EndpointRole::Camera {
                        sink: SinkKey::Cam3,
                    },
                ),
                EndpointConfig::new(
                    "cam4",
                    "ws://192.168.121.139:86",
                    EndpointRole::Camera {
                        sink: SinkKey::Cam4,
                    },
                ),
            ],
        }
    }
}

impl LoggerConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keepalive(&self) -> KeepAlive {
        KeepAlive {
            interval: Duration::from_secs(self.keepalive_interval_secs),
            timeout: Duration::from_secs(self.keepalive_timeout_secs),
        }
    }

    pub fn enabled_endpoints(&self) -> impl Iterator<Item = &EndpointConfig> {
        self.endpoints.iter().filter(|e| e.enabled)
    }

    /// Enable exactly the named endpoints and disable the rest.
    pub fn restrict_to(&mut self, names: &[String]) -> Result<(), ConfigError> {
        if names.is_empty() {
            return Ok(());
        }
        for name in names {
            if !self.endpoints.iter().any(|e| &e.name == name) {
                return Err(ConfigError::UnknownEndpoint(name.clone()));
            }
        }
        for endpoint in &mut self.endpoints {
            endpoint.enabled = names.contains(&endpoint.name);
        }
        Ok(())
    }

    /// Apply a `name=ws://host:port` override.
    pub fn override_url(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (name, url) = spec.split_once('=').ok_or_else(|| ConfigError::Invalid {
            field: "url",
            reason: format!("expected name=url, got {}", spec),
        })?;
        let endpoint = self
            .endpoints
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()))?;
        endpoint.url = url.to_string();
        Ok(())
    }

    /// Reject anything that would let two workers write the same sink.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.print_every == 0 {
            return Err(ConfigError::Invalid {
                field: "print_every",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.keepalive_interval_secs == 0 || self.keepalive_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "keepalive",
                reason: "interval and timeout must be at least 1 s".to_string(),
            });
        }
        if self.status_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "status_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        let mut names = HashSet::new();
        for endpoint in &self.endpoints {
            if !names.insert(endpoint.name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(endpoint.name.clone()));
            }
        }

        let mut owners: HashMap<SinkKey, &str> = HashMap::new();
        let mut any_enabled = false;
        for endpoint in self.enabled_endpoints() {
            any_enabled = true;
            if !(endpoint.url.starts_with("ws://") || endpoint.url.starts_with("wss://")) {
                return Err(ConfigError::Invalid {
                    field: "url",
                    reason: format!("{}: {} is not a ws:// or wss:// url", endpoint.name, endpoint.url),
                });
            }
            if let EndpointRole::Camera { sink } = &endpoint.role {
                if !sink.is_thermal() {
                    return Err(ConfigError::NotThermal {
                        endpoint: endpoint.name.clone(),
                        sink: sink.to_string(),
                    });
                }
            }
            for key in endpoint.role.sink_keys() {
                if let Some(first) = owners.insert(key, &endpoint.name) {
                    return Err(ConfigError::SinkClaimedTwice {
                        sink: key.to_string(),
                        first: first.to_string(),
                        second: endpoint.name.clone(),
                    });
                }
            }
        }

        if !any_enabled {
            return Err(ConfigError::Invalid {
                field: "endpoints",
                reason: "no endpoint is enabled".to_string(),
            });
        }
        Ok(())
    }
}
