mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    HardwareSettings, LoggingSettings, MqttSettings, ScheduleSettings, Settings, TopicSettings,
    UnitSettings, WifiSettings, control_topic_for,
};

/// Default location of the configuration file, without extension.
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads the configuration from `path` (optional) and `AERO_*` environment variables,
/// merges it with default values and validates the result.
///
/// Environment keys use `__` between section and field, e.g. `AERO_MQTT__SERVER`.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref().to_string_lossy().into_owned();
    let builder = Config::builder()
        .add_source(File::with_name(&path).required(false))
        .add_source(
            Environment::with_prefix("AERO")
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge_with_defaults();
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.mqtt.queue_size == 0 {
        return Err(ConfigError::Message(
            "mqtt.queue_size must be at least 1".to_string(),
        ));
    }
    if settings.mqtt.qos > 2 {
        return Err(ConfigError::Message(format!(
            "mqtt.qos must be 0, 1 or 2, got {}",
            settings.mqtt.qos
        )));
    }
    Ok(())
}
