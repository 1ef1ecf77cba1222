use crate::error::{AppError, Result};
use crate::escalation::{StreamSpec, MAX_STREAMS};
use config::Source;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration file read when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "topic-watchdog.toml";

/// Maximum number of topics that may be configured
pub const MAX_TOPICS: usize = MAX_STREAMS;

/// Maximum number of configuration entries (leaf keys) accepted
pub const MAX_CONFIG_ENTRIES: usize = 128;

/// Environment variable prefix, e.g. `TOPIC_WATCHDOG__EMAIL__TO`
pub const ENV_PREFIX: &str = "TOPIC_WATCHDOG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    /// Event bus connection
    #[serde(default)]
    pub bus: BusConfig,

    /// Email notification channel
    #[serde(default)]
    pub email: EmailConfig,

    /// Remediation settings
    #[serde(default)]
    pub remediation: RemediationConfig,

    /// Loop cadence and dispatch bounds
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Logging output
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Monitored topics keyed by index ("0", "1", ...)
    #[serde(default)]
    pub topic: HashMap<String, TopicEntry>,
}

/// Command-line overrides, applied on top of file and environment
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigOverrides {
    /// Event bus server URL
    #[arg(long)]
    pub bus_server: Option<String>,

    /// Client connection name
    #[arg(long)]
    pub bus_client: Option<String>,

    /// SMTP endpoint, smtp://host:port or smtps://host:port
    #[arg(long)]
    pub email_smtp: Option<String>,

    #[arg(long)]
    pub email_username: Option<String>,

    #[arg(long)]
    pub email_password: Option<String>,

    /// Require TLS on the SMTP connection (true/false)
    #[arg(long, value_name = "BOOL")]
    pub email_use_ssl: Option<bool>,

    /// Sender display name
    #[arg(long)]
    pub email_name: Option<String>,

    /// Sender address
    #[arg(long)]
    pub email_from: Option<String>,

    /// Recipient address; empty disables notifications
    #[arg(long)]
    pub email_to: Option<String>,

    /// Subject prefix
    #[arg(long)]
    pub email_subject: Option<String>,

    /// Verbose logging (true/false)
    #[arg(long, value_name = "BOOL")]
    pub debug: Option<bool>,
}

impl Config {
    /// Load configuration from file, environment and command-line overrides.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        Self::build(builder, overrides)
    }

    /// Load configuration from TOML text
    pub fn from_toml(contents: &str, overrides: &ConfigOverrides) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml));

        Self::build(builder, overrides)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let raw = builder
            .set_override_option("bus.server", overrides.bus_server.clone())?
            .set_override_option("bus.client", overrides.bus_client.clone())?
            .set_override_option("email.smtp", overrides.email_smtp.clone())?
            .set_override_option("email.username", overrides.email_username.clone())?
            .set_override_option("email.password", overrides.email_password.clone())?
            .set_override_option("email.use_ssl", overrides.email_use_ssl)?
            .set_override_option("email.name", overrides.email_name.clone())?
            .set_override_option("email.from", overrides.email_from.clone())?
            .set_override_option("email.to", overrides.email_to.clone())?
            .set_override_option("email.subject", overrides.email_subject.clone())?
            .set_override_option("debug", overrides.debug)?
            .build()?;

        let entries = count_entries(&raw.collect()?);
        if entries > MAX_CONFIG_ENTRIES {
            return Err(AppError::Configuration(format!(
                "{} configuration entries, maximum is {}",
                entries, MAX_CONFIG_ENTRIES
            )));
        }

        let config: Config = raw.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.watchdog.process_interval_secs == 0 {
            return Err(AppError::Configuration(
                "watchdog.process_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.watchdog.stats_interval_secs == 0 {
            return Err(AppError::Configuration(
                "watchdog.stats_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.watchdog.dispatch_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "watchdog.dispatch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.bus.server.is_empty() {
            return Err(AppError::Configuration("bus.server must be set".to_string()));
        }
        Ok(())
    }

    /// Enumerate topics from index 0 up to the first index without a name
    pub fn stream_specs(&self) -> Vec<StreamSpec> {
        let mut specs = Vec::new();

        for index in 0..self.topic.len() {
            let Some(entry) = self.topic.get(&index.to_string()) else {
                break;
            };
            let Some(name) = entry.name.as_deref().filter(|n| !n.is_empty()) else {
                break;
            };

            let mut spec = StreamSpec::new(
                name,
                Duration::from_secs(entry.warning),
                Duration::from_secs(entry.restart),
            );
            if let Some(service) = &entry.service {
                spec = spec.with_remediation_target(service.clone());
            }
            specs.push(spec);
        }

        let ignored = self.topic.len() - specs.len();
        if ignored > 0 {
            tracing::warn!(
                ignored,
                "Topic entries after the first missing index are ignored"
            );
        }

        specs
    }
}

fn count_entries(map: &HashMap<String, config::Value>) -> usize {
    map.values().map(count_value).sum()
}

fn count_value(value: &config::Value) -> usize {
    match &value.kind {
        config::ValueKind::Table(table) => table.values().map(count_value).sum(),
        config::ValueKind::Array(items) => items.iter().map(count_value).sum(),
        _ => 1,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Server URL
    #[serde(default = "default_bus_server")]
    pub server: String,

    /// Connection name reported to the server
    #[serde(default = "default_bus_client")]
    pub client: String,

    /// Connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl BusConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            server: default_bus_server(),
            client: default_bus_client(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP endpoint
    #[serde(default = "default_smtp")]
    pub smtp: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Require TLS (STARTTLS on smtp://)
    #[serde(default)]
    pub use_ssl: bool,

    /// Sender display name
    #[serde(default = "default_email_name")]
    pub name: String,

    /// Sender address
    #[serde(default = "default_email_from")]
    pub from: String,

    /// Recipient address; empty disables notifications
    #[serde(default)]
    pub to: String,

    /// Subject prefix
    #[serde(default = "default_email_subject")]
    pub subject: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp: default_smtp(),
            username: String::new(),
            password: String::new(),
            use_ssl: false,
            name: default_email_name(),
            from: default_email_from(),
            to: String::new(),
            subject: default_email_subject(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationConfig {
    /// systemctl binary
    #[serde(default = "default_systemctl")]
    pub systemctl: String,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            systemctl: default_systemctl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Evaluation cadence (seconds)
    #[serde(default = "default_process_interval")]
    pub process_interval_secs: u64,

    /// Statistics log cadence (seconds)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Bound on each notify/remediate call (seconds)
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,

    /// Capacity of the delivered-event queue
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl WatchdogConfig {
    pub fn process_interval(&self) -> Duration {
        Duration::from_secs(self.process_interval_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            process_interval_secs: default_process_interval(),
            stats_interval_secs: default_stats_interval(),
            dispatch_timeout_secs: default_dispatch_timeout(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

/// One `topic.<index>` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEntry {
    /// Topic name; a missing name ends enumeration
    pub name: Option<String>,

    /// systemd unit restarted at level 2
    pub service: Option<String>,

    /// Level-1 threshold (seconds)
    #[serde(default = "default_warning")]
    pub warning: u64,

    /// Level-2 threshold (seconds)
    #[serde(default = "default_restart")]
    pub restart: u64,
}

// Default value functions
fn default_bus_server() -> String {
    "nats://localhost:4222".to_string()
}

fn default_bus_client() -> String {
    "topic-watchdog".to_string()
}

fn default_connect_timeout() -> u64 {
    60
}

fn default_smtp() -> String {
    "smtp://localhost:25".to_string()
}

fn default_email_name() -> String {
    "Topic Watchdog".to_string()
}

fn default_email_from() -> String {
    "no-reply@localhost".to_string()
}

fn default_email_subject() -> String {
    "Topic Watchdog Alert".to_string()
}

fn default_systemctl() -> String {
    "systemctl".to_string()
}

fn default_process_interval() -> u64 {
    5
}

fn default_stats_interval() -> u64 {
    30
}

fn default_dispatch_timeout() -> u64 {
    30
}

fn default_event_queue_capacity() -> usize {
    1024
}

fn default_warning() -> u64 {
    60
}

fn default_restart() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
debug = true

[bus]
server = "nats://bus.internal:4222"

[email]
to = "ops@example.com"

[topic.0]
name = "sensors/boiler"
service = "boiler-bridge.service"
warning = 30
restart = 120

[topic.1]
name = "sensors/garage"
"#;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_process_interval(), 5);
        assert_eq!(default_stats_interval(), 30);
        assert_eq!(default_warning(), 60);
        assert_eq!(default_restart(), 300);
        assert!(EmailConfig::default().to.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let config = Config::from_toml(SAMPLE, &ConfigOverrides::default()).unwrap();

        assert!(config.debug);
        assert_eq!(config.bus.server, "nats://bus.internal:4222");
        assert_eq!(config.bus.client, "topic-watchdog");
        assert_eq!(config.email.to, "ops@example.com");
        assert_eq!(config.email.smtp, "smtp://localhost:25");

        let specs = config.stream_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].id, "sensors/boiler");
        assert_eq!(specs[0].remediation_target.as_deref(), Some("boiler-bridge.service"));
        assert_eq!(specs[0].warn_after, Duration::from_secs(30));
        assert_eq!(specs[1].remediation_target, None);
        assert_eq!(specs[1].restart_after, Duration::from_secs(300));
    }

    #[test]
    fn test_enumeration_stops_at_gap() {
        let toml = r#"
[topic.0]
name = "a"

[topic.2]
name = "c"
"#;
        let config = Config::from_toml(toml, &ConfigOverrides::default()).unwrap();
        let specs = config.stream_specs();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].id, "a");
    }

    #[test]
    fn test_enumeration_stops_at_missing_name() {
        let toml = r#"
[topic.0]
warning = 10

[topic.1]
name = "b"
"#;
        let config = Config::from_toml(toml, &ConfigOverrides::default()).unwrap();
        assert!(config.stream_specs().is_empty());
    }

    #[test]
    fn test_overrides_win() {
        let overrides = ConfigOverrides {
            email_to: Some(String::new()),
            bus_client: Some("edge-7".to_string()),
            email_use_ssl: Some(true),
            ..Default::default()
        };
        let config = Config::from_toml(SAMPLE, &overrides).unwrap();

        assert!(config.email.to.is_empty());
        assert_eq!(config.bus.client, "edge-7");
        assert!(config.email.use_ssl);
        assert!(config.debug);
    }

    #[test]
    fn test_override_clears_file_flag() {
        let overrides = ConfigOverrides {
            debug: Some(false),
            ..Default::default()
        };
        let config = Config::from_toml(SAMPLE, &overrides).unwrap();

        assert!(!config.debug);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let toml = r#"
[watchdog]
process_interval_secs = 0
"#;
        let result = Config::from_toml(toml, &ConfigOverrides::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_too_many_entries_rejected() {
        let mut toml = String::new();
        // 33 topics with 4 keys each is 132 entries
        for i in 0..33 {
            toml.push_str(&format!(
                "[topic.{i}]\nname = \"t/{i}\"\nservice = \"t{i}.service\"\nwarning = 10\nrestart = 20\n"
            ));
        }
        let result = Config::from_toml(&toml, &ConfigOverrides::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_too_many_topics_rejected_at_registration() {
        let mut toml = String::new();
        for i in 0..=MAX_TOPICS {
            toml.push_str(&format!("[topic.{i}]\nname = \"t/{i}\"\n"));
        }
        let config = Config::from_toml(&toml, &ConfigOverrides::default()).unwrap();
        let specs = config.stream_specs();
        assert_eq!(specs.len(), MAX_TOPICS + 1);

        let result = crate::escalation::EscalationTable::register(specs, chrono::Utc::now());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(Some(file.path()), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.stream_specs().len(), 2);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = Config::load(
            Some(Path::new("/nonexistent/topic-watchdog.toml")),
            &ConfigOverrides::default(),
        );
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
