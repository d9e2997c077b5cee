use serde::{Deserialize, Serialize};

pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org";
pub const DEFAULT_UTC_OFFSET_SECS: i64 = 8 * 3600;
pub const DEFAULT_ZONE_LABEL: &str = "SGT";
/// The device board wires the sensor bus to fixed pins.
pub const I2C_SDA_GPIO: u8 = 21;
pub const I2C_SCL_GPIO: u8 = 22;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub wifi_poll_interval_ms: u32,
    pub http_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            wifi_poll_interval_ms: 500,
            http_port: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub ntp_server: String,
    pub utc_offset_secs: i64,
    pub zone_label: String,
    pub ntp_update_interval_ms: u32,
    pub ntp_retry_delay_ms: u32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            ntp_server: DEFAULT_NTP_SERVER.to_string(),
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
            zone_label: DEFAULT_ZONE_LABEL.to_string(),
            ntp_update_interval_ms: 60_000,
            ntp_retry_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct I2cConfig {
    pub baudrate_hz: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            baudrate_hz: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u32,
    pub loop_idle_ms: u32,
    pub halt_delay_ms: u32,
    pub page_timeout_ms: u32,
    pub network: NetworkConfig,
    pub time: TimeConfig,
    pub i2c: I2cConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            loop_idle_ms: 10,
            halt_delay_ms: 500,
            page_timeout_ms: 2_000,
            network: NetworkConfig::default(),
            time: TimeConfig::default(),
            i2c: I2cConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn sanitize(&mut self) {
        self.poll_interval_ms = self.poll_interval_ms.clamp(500, 3_600_000);
        self.loop_idle_ms = self.loop_idle_ms.min(self.poll_interval_ms / 10);
        if self.halt_delay_ms == 0 {
            self.halt_delay_ms = 500;
        }
        self.page_timeout_ms = self.page_timeout_ms.clamp(100, 30_000);

        self.network.wifi_poll_interval_ms = self.network.wifi_poll_interval_ms.clamp(50, 10_000);
        if self.network.http_port == 0 {
            self.network.http_port = 80;
        }

        if self.time.ntp_server.trim().is_empty() {
            self.time.ntp_server = DEFAULT_NTP_SERVER.to_string();
        }
        self.time.utc_offset_secs = self.time.utc_offset_secs.clamp(-12 * 3600, 14 * 3600);
        self.time.ntp_update_interval_ms = self.time.ntp_update_interval_ms.max(1_000);

        self.i2c.baudrate_hz = self.i2c.baudrate_hz.clamp(10_000, 400_000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_constants() {
        let config = MonitorConfig::default();

        assert_eq!(config.poll_interval_ms, 5_000);
        assert_eq!(config.network.http_port, 80);
        assert_eq!(config.time.ntp_server, "pool.ntp.org");
        assert_eq!(config.time.utc_offset_secs, 28_800);
        assert_eq!(config.time.ntp_update_interval_ms, 60_000);
        assert_eq!(config.i2c.baudrate_hz, 100_000);
    }

    #[test]
    fn sanitize_repairs_out_of_range_values() {
        let mut config = MonitorConfig::default();
        config.poll_interval_ms = 0;
        config.network.http_port = 0;
        config.time.ntp_server = "  ".to_string();
        config.time.utc_offset_secs = 99 * 3600;
        config.i2c.baudrate_hz = 1_000_000;

        config.sanitize();

        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.loop_idle_ms, 10);
        assert_eq!(config.network.http_port, 80);
        assert_eq!(config.time.ntp_server, DEFAULT_NTP_SERVER);
        assert_eq!(config.time.utc_offset_secs, 14 * 3600);
        assert_eq!(config.i2c.baudrate_hz, 400_000);
    }

    #[test]
    fn partial_json_falls_back_to_section_defaults() {
        let json = r#"{"poll_interval_ms":2000,"network":{"wifi_ssid":"home"}}"#;
        let config: MonitorConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.time.zone_label, "SGT");
        assert_eq!(config.network.wifi_ssid, "home");
        assert_eq!(config.network.wifi_poll_interval_ms, 500);
        assert_eq!(config.halt_delay_ms, 500);
    }

    #[test]
    fn i2c_section_only_carries_bus_speed() {
        let value = serde_json::to_value(MonitorConfig::default()).unwrap();

        assert_eq!(value["i2c"], serde_json::json!({ "baudrate_hz": 100_000 }));
    }
}
