use super::*;

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            reading: 0.0,
            voltage: 230.0,
            enabled: true,
            current_cap: crate::controls::DEFAULT_CURRENT_CAP,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            web_level: None,
            file: "/tmp/chargectl.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: "/data/chargectl_state.json".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller_id: "charging_control".to_string(),
            update_interval_seconds: 10,
            sources: SourcesConfig::default(),
            actuators: ActuatorsConfig::default(),
            defaults: DefaultsConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}
