//! UdpTransport - fire-and-forget forwarding over UDP
//!
//! Each datagram is a credential line followed by the envelope:
//!
//! ```text
//! Basic base64(<writeKey>:)\n
//! {"batch":[...],...}
//! ```

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use contracts::{ContractError, ForwardTransport};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Configuration for UdpTransport
#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Max packet size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl UdpTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Frame `body` behind a basic-auth credential line for `write_key`
fn encode_datagram(write_key: &str, body: &[u8]) -> Bytes {
    let credential = base64::engine::general_purpose::STANDARD.encode(format!("{write_key}:"));
    let mut datagram = BytesMut::with_capacity(credential.len() + body.len() + 7);
    datagram.put_slice(b"Basic ");
    datagram.put_slice(credential.as_bytes());
    datagram.put_u8(b'\n');
    datagram.put_slice(body);
    datagram.freeze()
}

/// Transport that sends each envelope as one datagram
pub struct UdpTransport {
    name: String,
    config: UdpTransportConfig,
    socket: UdpSocket,
}

impl UdpTransport {
    /// Create a new UdpTransport connected to `config.addr`
    #[instrument(name = "udp_transport_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: UdpTransportConfig) -> std::io::Result<Self> {
        let name = name.into();
        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(
            sink = %name,
            target = %config.addr,
            "UdpTransport connected"
        );

        Ok(Self {
            name,
            config,
            socket,
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "udp_transport_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = UdpTransportConfig::from_params(params).map_err(|e| {
            ContractError::config_validation(format!("sinks.{name}.params.addr"), e)
        })?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::connect(&name, e.to_string()))
    }

    pub fn config(&self) -> &UdpTransportConfig {
        &self.config
    }
}

impl ForwardTransport for UdpTransport {
    #[instrument(
        name = "udp_transport_forward",
        skip(self, write_key, body),
        fields(sink = %self.name, bytes = body.len())
    )]
    async fn forward(&self, write_key: &str, body: Bytes) -> Result<(), ContractError> {
        let datagram = encode_datagram(write_key, &body);
        if datagram.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = datagram.len(),
                max = self.config.max_packet_size,
                "Packet too large"
            );
            return Err(ContractError::delivery(
                &self.name,
                format!(
                    "datagram of {} bytes exceeds max packet size {}",
                    datagram.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        match self.socket.send(&datagram).await {
            Ok(sent) => {
                debug!(sink = %self.name, bytes = sent, "Sent");
                Ok(())
            }
            Err(e) => {
                error!(sink = %self.name, error = %e, "UDP send failed");
                Err(ContractError::delivery(&self.name, e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());

        let config = UdpTransportConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.max_packet_size, 65000);

        assert!(UdpTransportConfig::from_params(&HashMap::new()).is_err());
        params.insert("addr".to_string(), "not-an-addr".to_string());
        assert!(UdpTransportConfig::from_params(&params).is_err());
    }

    #[tokio::test]
    async fn test_udp_forward_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = UdpTransportConfig {
            addr: receiver.local_addr().unwrap(),
            max_packet_size: 65000,
        };
        let transport = UdpTransport::new("test_udp", config).await.unwrap();

        transport
            .forward("wk", Bytes::from_static(b"{\"batch\":[]}"))
            .await
            .unwrap();

        let mut buf = [0u8; 128];
        let len = receiver.recv(&mut buf).await.unwrap();
        let datagram = std::str::from_utf8(&buf[..len]).unwrap();
        let (credential, body) = datagram.split_once('\n').unwrap();
        assert_eq!(credential, "Basic d2s6");
        assert_eq!(body, "{\"batch\":[]}");
    }

    #[tokio::test]
    async fn test_udp_forward_oversized_is_delivery_error() {
        let config = UdpTransportConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            max_packet_size: 4,
        };
        let transport = UdpTransport::new("test_udp", config).await.unwrap();
        let err = transport
            .forward("wk", Bytes::from_static(b"0123456789"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Delivery { .. }));
    }
}
