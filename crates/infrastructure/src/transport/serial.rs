use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::DomainError;
use domain::driver::Transport;
use domain::protocol::TERMINATOR;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use super::framing::{read_frame, write_request};

/// RS-232 (ESC/VP21) configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: String, // "None", "Even", "Odd"
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_parity() -> String {
    "None".to_string()
}
fn default_stop_bits() -> u8 {
    1
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
        }
    }

    /// Check the line settings without touching the device
    pub fn validate(&self) -> Result<(), DomainError> {
        self.to_parity()?;
        self.to_stop_bits()?;
        self.to_data_bits()?;
        Ok(())
    }

    fn to_parity(&self) -> Result<tokio_serial::Parity, DomainError> {
        match self.parity.as_str() {
            "None" => Ok(tokio_serial::Parity::None),
            "Even" => Ok(tokio_serial::Parity::Even),
            "Odd" => Ok(tokio_serial::Parity::Odd),
            _ => Err(DomainError::InvalidConfiguration(format!(
                "Invalid parity: {}",
                self.parity
            ))),
        }
    }

    fn to_stop_bits(&self) -> Result<tokio_serial::StopBits, DomainError> {
        match self.stop_bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            _ => Err(DomainError::InvalidConfiguration(format!(
                "Invalid stop bits: {}",
                self.stop_bits
            ))),
        }
    }

    fn to_data_bits(&self) -> Result<tokio_serial::DataBits, DomainError> {
        match self.data_bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            _ => Err(DomainError::InvalidConfiguration(format!(
                "Invalid data bits: {}",
                self.data_bits
            ))),
        }
    }

    fn port_name(&self) -> String {
        // Normalize port name for Windows (e.g., COM7 -> \\.\COM7)
        if cfg!(target_os = "windows") && !self.port.to_uppercase().starts_with(r"\\.\") {
            format!(r"\\.\{}", self.port)
        } else {
            self.port.clone()
        }
    }
}

/// Projector reached over its RS-232 control port
pub struct SerialTransport {
    config: SerialConfig,
    exchange_timeout: Duration,
    port: Option<SerialStream>,
    last_activity: Option<DateTime<Utc>>,
}

impl SerialTransport {
    pub fn new(config: SerialConfig, exchange_timeout: Duration) -> Self {
        Self {
            config,
            exchange_timeout,
            port: None,
            last_activity: None,
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<(), DomainError> {
        let port_name = self.config.port_name();

        debug!(
            port = %port_name,
            baud_rate = self.config.baud_rate,
            "Opening serial port"
        );

        let mut port = tokio_serial::new(&port_name, self.config.baud_rate)
            .data_bits(self.config.to_data_bits()?)
            .parity(self.config.to_parity()?)
            .stop_bits(self.config.to_stop_bits()?)
            .timeout(self.exchange_timeout)
            .open_native_async()
            .map_err(|e| {
                // Downgraded to WARN to avoid spamming error logs during retries
                warn!(port = %port_name, error = %e, "Failed to open serial port");
                DomainError::connect(
                    &port_name,
                    format!(
                        "{}. Tip: Ensure the port is not used by another application and that you have sufficient permissions.",
                        e
                    ),
                )
            })?;

        // A bare CR makes the projector print its prompt; proves something is listening
        write_request(&mut port, &[TERMINATOR])
            .await
            .map_err(|e| DomainError::connect(&port_name, e))?;
        read_frame(&mut port, self.exchange_timeout)
            .await
            .map_err(|e| DomainError::connect(&port_name, format!("No prompt from projector: {}", e)))?;

        self.port = Some(port);
        self.last_activity = Some(Utc::now());

        info!(port = %port_name, "Serial port opened successfully");
        Ok(())
    }

    async fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, DomainError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| DomainError::IoClosed("Port not connected".to_string()))?;

        let result = match write_request(port, request).await {
            Ok(()) => read_frame(port, self.exchange_timeout).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(frame) => {
                self.last_activity = Some(Utc::now());
                Ok(frame)
            }
            Err(e) => {
                if e.is_io() {
                    self.port = None;
                }
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<(), DomainError> {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.shutdown().await {
                warn!(error = %e, "Error shutting down serial port");
            }
            info!(port = %self.config.port, "Serial port disconnected");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    fn endpoint(&self) -> String {
        self.config.port.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, "None");
        assert_eq!(config.stop_bits, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serial_config_parity_conversion() {
        let config = SerialConfig {
            parity: "Even".to_string(),
            ..SerialConfig::new("COM1")
        };
        assert!(matches!(
            config.to_parity().unwrap(),
            tokio_serial::Parity::Even
        ));

        let config_odd = SerialConfig {
            parity: "Odd".to_string(),
            ..config.clone()
        };
        assert!(matches!(
            config_odd.to_parity().unwrap(),
            tokio_serial::Parity::Odd
        ));
    }

    #[test]
    fn test_invalid_line_settings() {
        let bad_parity = SerialConfig {
            parity: "Mark".to_string(),
            ..SerialConfig::new("COM1")
        };
        assert!(bad_parity.validate().is_err());

        let bad_bits = SerialConfig {
            data_bits: 9,
            ..SerialConfig::new("COM1")
        };
        assert!(bad_bits.validate().is_err());
    }

    #[test]
    fn test_serial_initial_state() {
        let transport = SerialTransport::new(SerialConfig::new("COM1"), Duration::from_secs(1));
        assert!(!transport.is_open());
        assert_eq!(transport.endpoint(), "COM1");
    }

    #[tokio::test]
    async fn test_close_without_open() {
        let mut transport = SerialTransport::new(SerialConfig::new("COM1"), Duration::from_secs(1));
        assert!(transport.close().await.is_ok());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_open_missing_port_is_connect_error() {
        let mut transport = SerialTransport::new(
            SerialConfig::new("/dev/does-not-exist-projector"),
            Duration::from_millis(100),
        );
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, DomainError::ConnectError { .. }));
    }
}
