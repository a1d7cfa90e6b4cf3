pub mod framing;
mod serial;
mod simulator;
mod tcp;

pub use serial::{SerialConfig, SerialTransport};
pub use simulator::{SimulatorConfig, SimulatorTransport};
pub use tcp::{ESCVP_NET_HELLO, TcpConfig, TcpTransport};

use std::time::Duration;

use domain::DomainError;
use domain::driver::{Transport, TransportKind};
use serde::{Deserialize, Serialize};

/// Link settings for one projector, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Tcp(TcpConfig),
    Serial(SerialConfig),
    Simulator(SimulatorConfig),
}

impl TransportConfig {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Tcp(_) => TransportKind::Tcp,
            Self::Serial(_) => TransportKind::Serial,
            Self::Simulator(_) => TransportKind::Simulator,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Tcp(tcp) if tcp.host.trim().is_empty() => Err(
                DomainError::InvalidConfiguration("TCP transport needs a host".to_string()),
            ),
            Self::Serial(serial) if serial.port.trim().is_empty() => Err(
                DomainError::InvalidConfiguration("Serial transport needs a port".to_string()),
            ),
            Self::Serial(serial) => serial.validate(),
            _ => Ok(()),
        }
    }
}

/// Factory for creating projector transports
pub struct TransportFactory;

impl TransportFactory {
    /// Build an unopened transport; `exchange_timeout` bounds each request/reply
    pub fn create(config: &TransportConfig, exchange_timeout: Duration) -> Box<dyn Transport> {
        match config {
            TransportConfig::Tcp(tcp) => Box::new(TcpTransport::new(tcp.clone(), exchange_timeout)),
            TransportConfig::Serial(serial) => {
                Box::new(SerialTransport::new(serial.clone(), exchange_timeout))
            }
            TransportConfig::Simulator(sim) => Box::new(SimulatorTransport::new(sim.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn test_create_tcp_transport() {
        let config: TransportConfig =
            serde_json::from_value(json!({"type": "tcp", "host": "192.168.1.50"})).unwrap();
        assert_eq!(config.kind(), TransportKind::Tcp);

        let transport = TransportFactory::create(&config, TIMEOUT);
        assert_eq!(transport.endpoint(), "192.168.1.50:3629");
        assert!(!transport.is_open());
    }

    #[test]
    fn test_create_serial_transport() {
        let config: TransportConfig = serde_json::from_value(json!({
            "type": "serial",
            "port": "/dev/ttyUSB0",
            "baud_rate": 19200
        }))
        .unwrap();

        match &config {
            TransportConfig::Serial(serial) => assert_eq!(serial.baud_rate, 19200),
            other => panic!("unexpected config {:?}", other),
        }
        let transport = TransportFactory::create(&config, TIMEOUT);
        assert_eq!(transport.endpoint(), "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_create_simulator_transport() {
        let config: TransportConfig = serde_json::from_value(json!({"type": "simulator"})).unwrap();
        let mut transport = TransportFactory::create(&config, TIMEOUT);
        transport.open().await.unwrap();
        assert_eq!(transport.send(b"PWR?\r").await.unwrap(), b"PWR=04\r:");
    }

    #[test]
    fn test_unknown_transport_type() {
        let result: Result<TransportConfig, _> =
            serde_json::from_value(json!({"type": "bluetooth", "address": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_endpoints() {
        assert!(TransportConfig::Tcp(TcpConfig::new("  ")).validate().is_err());
        assert!(
            TransportConfig::Serial(SerialConfig::new(""))
                .validate()
                .is_err()
        );
        assert!(
            TransportConfig::Simulator(SimulatorConfig::default())
                .validate()
                .is_ok()
        );
    }
}
