use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the unit.
///
/// Groups the identity of the unit, its hardware wiring, timing of the scheduled
/// loops, and the network and broker parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub unit: UnitSettings,
    pub hardware: HardwareSettings,
    pub schedule: ScheduleSettings,
    pub wifi: WifiSettings,
    pub mqtt: MqttSettings,
    pub topics: TopicSettings,
    pub logging: LoggingSettings,
}

/// Identity of the unit. Every status, error and last-will document carries it.
#[derive(Debug, Deserialize, Clone)]
pub struct UnitSettings {
    pub project: String,
    pub name: String,
}

impl UnitSettings {
    /// The unit id, `<project>-<name>`. Also used as the MQTT client id.
    pub fn unit_id(&self) -> String {
        format!("{}-{}", self.project, self.name)
    }
}

/// Hardware wiring of the relays and the water temperature probe.
#[derive(Debug, Deserialize, Clone)]
pub struct HardwareSettings {
    pub gpio_path: PathBuf,
    pub w1_devices_path: PathBuf,
    pub water_temp_sensor_name: String,
    pub sensor_settle_ms: u64,
    pub growlight_pin: u32,
    pub growlight_active_high: bool,
    pub growlight_state_path: Option<PathBuf>,
    pub irrigation_pin: u32,
    pub irrigation_active_high: bool,
}

/// Timing of the unit's scheduled loops.
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleSettings {
    pub irrigation_on_sec: u64,
    pub irrigation_off_sec: u64,
    pub post_status_interval_sec: u64,
    pub reclaim_interval_sec: u64,
    /// Pause between polls in the link reconnect and broker connect retry loops.
    /// `0` yields to the scheduler without sleeping.
    pub yield_granularity_ms: u64,
}

impl ScheduleSettings {
    pub fn yield_granularity(&self) -> Duration {
        Duration::from_millis(self.yield_granularity_ms)
    }
}

/// Network link parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct WifiSettings {
    pub ssid: String,
    pub password: String,
    pub connection_check_interval_sec: u64,
    /// Address the host link adapter routes towards to decide whether the link is up.
    pub probe_addr: String,
}

impl WifiSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.connection_check_interval_sec)
    }
}

/// Broker connection parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct MqttSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub use_tls: bool,
    pub keepalive_sec: u64,
    pub qos: u8,
    pub queue_size: usize,
    pub connection_check_interval_sec: u64,
    pub message_check_interval_ms: u64,
}

impl MqttSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.connection_check_interval_sec)
    }

    pub fn message_check_interval(&self) -> Duration {
        Duration::from_millis(self.message_check_interval_ms)
    }
}

/// Topics the unit subscribes to and publishes on.
#[derive(Debug, Deserialize, Clone)]
pub struct TopicSettings {
    pub status_request: String,
    pub status: String,
    pub inactive: String,
    pub error: String,
    pub control: String,
}

impl TopicSettings {
    /// Topics subscribed to once a session is established.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![self.status_request.clone(), self.control.clone()]
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub unit: Option<PartialUnitSettings>,
    pub hardware: Option<PartialHardwareSettings>,
    pub schedule: Option<PartialScheduleSettings>,
    pub wifi: Option<PartialWifiSettings>,
    pub mqtt: Option<PartialMqttSettings>,
    pub topics: Option<PartialTopicSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialUnitSettings {
    pub project: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialHardwareSettings {
    pub gpio_path: Option<PathBuf>,
    pub w1_devices_path: Option<PathBuf>,
    pub water_temp_sensor_name: Option<String>,
    pub sensor_settle_ms: Option<u64>,
    pub growlight_pin: Option<u32>,
    pub growlight_active_high: Option<bool>,
    pub growlight_state_path: Option<PathBuf>,
    pub irrigation_pin: Option<u32>,
    pub irrigation_active_high: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialScheduleSettings {
    pub irrigation_on_sec: Option<u64>,
    pub irrigation_off_sec: Option<u64>,
    pub post_status_interval_sec: Option<u64>,
    pub reclaim_interval_sec: Option<u64>,
    pub yield_granularity_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialWifiSettings {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub connection_check_interval_sec: Option<u64>,
    pub probe_addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialMqttSettings {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub use_tls: Option<bool>,
    pub keepalive_sec: Option<u64>,
    pub qos: Option<u8>,
    pub queue_size: Option<usize>,
    pub connection_check_interval_sec: Option<u64>,
    pub message_check_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialTopicSettings {
    pub status_request: Option<String>,
    pub status: Option<String>,
    pub inactive: Option<String>,
    pub error: Option<String>,
    pub control: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    ///
    /// The control topic is derived from the merged unit id unless it was given explicitly.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();

        let unit = self.unit.unwrap_or_default();
        let unit = UnitSettings {
            project: unit.project.unwrap_or(default.unit.project),
            name: unit.name.unwrap_or(default.unit.name),
        };

        let hw = self.hardware.unwrap_or_default();
        let hardware = HardwareSettings {
            gpio_path: hw.gpio_path.unwrap_or(default.hardware.gpio_path),
            w1_devices_path: hw.w1_devices_path.unwrap_or(default.hardware.w1_devices_path),
            water_temp_sensor_name: hw
                .water_temp_sensor_name
                .unwrap_or(default.hardware.water_temp_sensor_name),
            sensor_settle_ms: hw.sensor_settle_ms.unwrap_or(default.hardware.sensor_settle_ms),
            growlight_pin: hw.growlight_pin.unwrap_or(default.hardware.growlight_pin),
            growlight_active_high: hw
                .growlight_active_high
                .unwrap_or(default.hardware.growlight_active_high),
            growlight_state_path: hw
                .growlight_state_path
                .or(default.hardware.growlight_state_path),
            irrigation_pin: hw.irrigation_pin.unwrap_or(default.hardware.irrigation_pin),
            irrigation_active_high: hw
                .irrigation_active_high
                .unwrap_or(default.hardware.irrigation_active_high),
        };

        let sched = self.schedule.unwrap_or_default();
        let schedule = ScheduleSettings {
            irrigation_on_sec: sched
                .irrigation_on_sec
                .unwrap_or(default.schedule.irrigation_on_sec),
            irrigation_off_sec: sched
                .irrigation_off_sec
                .unwrap_or(default.schedule.irrigation_off_sec),
            post_status_interval_sec: sched
                .post_status_interval_sec
                .unwrap_or(default.schedule.post_status_interval_sec),
            reclaim_interval_sec: sched
                .reclaim_interval_sec
                .unwrap_or(default.schedule.reclaim_interval_sec),
            yield_granularity_ms: sched
                .yield_granularity_ms
                .unwrap_or(default.schedule.yield_granularity_ms),
        };

        let w = self.wifi.unwrap_or_default();
        let wifi = WifiSettings {
            ssid: w.ssid.unwrap_or(default.wifi.ssid),
            password: w.password.unwrap_or(default.wifi.password),
            connection_check_interval_sec: w
                .connection_check_interval_sec
                .unwrap_or(default.wifi.connection_check_interval_sec),
            probe_addr: w.probe_addr.unwrap_or(default.wifi.probe_addr),
        };

        let m = self.mqtt.unwrap_or_default();
        let mqtt = MqttSettings {
            server: m.server.unwrap_or(default.mqtt.server),
            port: m.port.unwrap_or(default.mqtt.port),
            user: m.user.unwrap_or(default.mqtt.user),
            password: m.password.unwrap_or(default.mqtt.password),
            use_tls: m.use_tls.unwrap_or(default.mqtt.use_tls),
            keepalive_sec: m.keepalive_sec.unwrap_or(default.mqtt.keepalive_sec),
            qos: m.qos.unwrap_or(default.mqtt.qos),
            queue_size: m.queue_size.unwrap_or(default.mqtt.queue_size),
            connection_check_interval_sec: m
                .connection_check_interval_sec
                .unwrap_or(default.mqtt.connection_check_interval_sec),
            message_check_interval_ms: m
                .message_check_interval_ms
                .unwrap_or(default.mqtt.message_check_interval_ms),
        };

        let t = self.topics.unwrap_or_default();
        let topics = TopicSettings {
            status_request: t.status_request.unwrap_or(default.topics.status_request),
            status: t.status.unwrap_or(default.topics.status),
            inactive: t.inactive.unwrap_or(default.topics.inactive),
            error: t.error.unwrap_or(default.topics.error),
            control: t
                .control
                .unwrap_or_else(|| control_topic_for(&unit.unit_id())),
        };

        let logging = LoggingSettings {
            level: self
                .logging
                .and_then(|l| l.level)
                .unwrap_or(default.logging.level),
        };

        Settings {
            unit,
            hardware,
            schedule,
            wifi,
            mqtt,
            topics,
            logging,
        }
    }
}

/// Per-unit control topic, `/units/<unit_id>/control`.
pub fn control_topic_for(unit_id: &str) -> String {
    format!("/units/{unit_id}/control")
}

/// Provides default values for `Settings`.
///
/// These match the aeroponics unit as deployed; credentials are placeholders.
impl Default for Settings {
    fn default() -> Self {
        let unit = UnitSettings {
            project: "tlvlp.iot.BazsalikON".to_string(),
            name: "aero".to_string(),
        };
        let control = control_topic_for(&unit.unit_id());

        Self {
            unit,
            hardware: HardwareSettings {
                gpio_path: PathBuf::from("/sys/class/gpio"),
                w1_devices_path: PathBuf::from("/sys/bus/w1/devices"),
                water_temp_sensor_name: "waterTemperatureCelsius".to_string(),
                sensor_settle_ms: 750,
                growlight_pin: 32,
                growlight_active_high: true,
                growlight_state_path: Some(PathBuf::from("growlight_status")),
                irrigation_pin: 33,
                irrigation_active_high: true,
            },
            schedule: ScheduleSettings {
                irrigation_on_sec: 120,
                irrigation_off_sec: 120,
                post_status_interval_sec: 600,
                reclaim_interval_sec: 1700,
                yield_granularity_ms: 10,
            },
            wifi: WifiSettings {
                ssid: "PLACEHOLDER".to_string(),
                password: "PLACEHOLDER".to_string(),
                connection_check_interval_sec: 1,
                probe_addr: "1.1.1.1:53".to_string(),
            },
            mqtt: MqttSettings {
                server: "localhost".to_string(),
                port: 8883,
                user: "PLACEHOLDER".to_string(),
                password: "PLACEHOLDER".to_string(),
                use_tls: true,
                keepalive_sec: 200,
                qos: 1,
                queue_size: 10,
                connection_check_interval_sec: 1,
                message_check_interval_ms: 100,
            },
            topics: TopicSettings {
                status_request: "/global/status_request".to_string(),
                status: "/global/status".to_string(),
                inactive: "/global/inactive".to_string(),
                error: "/global/error".to_string(),
                control,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
