//! Tests for configuration management module

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.alsa_device, "default");
        assert!(!settings.null_output);
        assert_eq!(settings.socket_path.file_name().unwrap(), "koalad.sock");
    }

    #[test]
    fn test_settings_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.alsa_device = "hw:1,0".to_string();
        settings.socket_path = dir.path().join("ctl.sock");
        settings.null_output = true;

        settings.save(&config_path)?;
        assert!(config_path.exists());

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded, settings);

        Ok(())
    }

    #[test]
    fn test_missing_fields_use_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "null_output": true }"#)?;

        let loaded = Settings::load(&config_path)?;
        assert!(loaded.null_output);
        assert_eq!(loaded.alsa_device, "default");
        Ok(())
    }

    #[test]
    fn test_load_missing_file_gives_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let loaded = Settings::load(&dir.path().join("absent.json"))?;
        assert_eq!(loaded, Settings::default());
        Ok(())
    }

    #[test]
    fn test_invalid_json_is_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json")?;
        assert!(matches!(Settings::load(&config_path), Err(ConfigError::ParseError(_))));
        Ok(())
    }

    #[test]
    fn test_settings_validation() {
        let valid = Settings::default();
        assert!(valid.validate().is_ok());

        let no_device = Settings {
            alsa_device: "  ".to_string(),
            ..Settings::default()
        };
        assert!(matches!(no_device.validate(), Err(ConfigError::ValidationError(_))));

        let null_output = Settings {
            alsa_device: String::new(),
            null_output: true,
            ..Settings::default()
        };
        assert!(null_output.validate().is_ok());

        let bad_socket = Settings {
            socket_path: PathBuf::from("/"),
            ..Settings::default()
        };
        assert!(bad_socket.validate().is_err());
    }

    #[test]
    fn test_default_path() {
        let path = Settings::default_path();
        assert!(path.to_str().unwrap().contains(".config/koalad/config.json"));
    }
}
