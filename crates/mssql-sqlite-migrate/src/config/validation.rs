//! Configuration validation.

use crate::config::ConvertConfig;
use crate::error::{ConvertError, Result};

/// Validate the configuration before a worker is spawned. A validation
/// failure is reported to the caller directly; the progress handler is never
/// invoked for it.
pub fn validate(config: &ConvertConfig) -> Result<()> {
    if config.source.host.trim().is_empty() {
        return Err(ConvertError::Config("source.host must not be empty".into()));
    }
    if config.source.port == 0 {
        return Err(ConvertError::Config("source.port must not be zero".into()));
    }
    if config.source.database.trim().is_empty() {
        return Err(ConvertError::Config(
            "source.database must not be empty".into(),
        ));
    }
    if config.destination.path.as_os_str().is_empty() {
        return Err(ConvertError::Config(
            "destination.path must not be empty".into(),
        ));
    }
    if let Some(password) = &config.destination.password {
        if password.is_empty() {
            return Err(ConvertError::Config(
                "destination.password must not be empty when present".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConvertOptions, DestinationConfig, SourceConfig};

    fn valid_config() -> ConvertConfig {
        ConvertConfig {
            source: SourceConfig {
                host: "localhost".into(),
                port: 1433,
                database: "Northwind".into(),
                user: "sa".into(),
                password: "secret".into(),
                encrypt: true,
                trust_server_cert: false,
            },
            destination: DestinationConfig {
                path: "out.db".into(),
                password: None,
            },
            options: ConvertOptions::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut config = valid_config();
        config.source.host = "  ".into();
        assert!(matches!(
            validate(&config),
            Err(ConvertError::Config(_))
        ));
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = valid_config();
        config.source.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_destination_rejected() {
        let mut config = valid_config();
        config.destination.path = "".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_present_password_rejected() {
        let mut config = valid_config();
        config.destination.password = Some(String::new());
        assert!(validate(&config).is_err());
    }
}
