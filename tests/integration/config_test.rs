//! Integration tests for configuration management
//!
//! These tests verify that the configuration system works correctly
//! across module boundaries.

use koalad::config::Settings;
use koalad::ui::Args;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Test complete configuration workflow
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.alsa_device = "test-audio-device".to_string();
        settings.socket_path = dir.path().join("control.sock");

        settings.validate()?;
        settings.save(&config_path)?;

        let loaded_settings = Settings::load(&config_path)?;
        assert_eq!(loaded_settings, settings);

        let mut updated_settings = loaded_settings;
        updated_settings.null_output = true;
        updated_settings.save(&config_path)?;

        let reloaded_settings = Settings::load(&config_path)?;
        assert!(reloaded_settings.null_output);
        assert_eq!(reloaded_settings.alsa_device, "test-audio-device");

        Ok(())
    }

    /// Command-line flags win over the file
    #[test]
    fn test_cli_overrides_file_settings() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "alsa_device": "hw:1", "socket_path": "/tmp/file.sock" }"#)?;

        let mut settings = Settings::load(&config_path)?;
        let args = Args::try_parse_from(["koalad", "--socket", "/tmp/cli.sock", "serve"])?;
        args.apply_to(&mut settings);

        assert_eq!(settings.alsa_device, "hw:1");
        assert_eq!(settings.socket_path, PathBuf::from("/tmp/cli.sock"));
        assert!(!settings.null_output);
        settings.validate()?;
        Ok(())
    }

    /// Test invalid configuration handling
    #[test]
    fn test_invalid_config_validation() {
        let invalid_settings = Settings {
            alsa_device: "  ".to_string(),
            socket_path: PathBuf::from("/tmp/koalad.sock"),
            null_output: false,
        };

        let result = invalid_settings.validate();
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("ALSA device cannot be empty"));
        }

        // A blank device is fine when no device is opened.
        let null_settings = Settings {
            null_output: true,
            ..invalid_settings
        };
        assert!(null_settings.validate().is_ok());

        let no_socket_name = Settings {
            socket_path: PathBuf::from("/"),
            ..Settings::default()
        };
        assert!(no_socket_name.validate().is_err());
    }
}
