//! NetworkSink - UDP fire-and-forget streaming

use bytes::Bytes;
use contracts::{ContractError, DataSink, Extrinsics, Intrinsics, PublishedRecord, Timestamp};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max datagram size (UDP allows 65507 over IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Datagram payload
///
/// Externally tagged so both JSON and bincode can round-trip it. A frame whose
/// pixels do not fit in one datagram travels without them.
#[derive(Debug, Serialize)]
enum WireRecord<'a> {
    Frame {
        sequence: u64,
        width: u16,
        height: u16,
        bpp: u8,
        timestamp: Timestamp,
        pixels: Option<&'a Bytes>,
    },
    Intrinsics(&'a Intrinsics),
    Extrinsics(&'a Extrinsics),
}

impl<'a> WireRecord<'a> {
    fn new(record: &'a PublishedRecord, with_pixels: bool) -> Self {
        match record {
            PublishedRecord::Frame(f) => WireRecord::Frame {
                sequence: f.sequence,
                width: f.width,
                height: f.height,
                bpp: f.bpp,
                timestamp: f.timestamp,
                pixels: with_pixels.then_some(&f.pixels),
            },
            PublishedRecord::Intrinsics(k) => WireRecord::Intrinsics(k),
            PublishedRecord::Extrinsics(e) => WireRecord::Extrinsics(e),
        }
    }
}

/// Sink that sends records over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    /// Create a new NetworkSink
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(
            sink = %name,
            target = %config.addr,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn serialize(&self, wire: &WireRecord<'_>) -> Result<Vec<u8>, ContractError> {
        match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(wire)
                .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {}", e))),
            NetworkFormat::Bincode => bincode::serialize(wire).map_err(|e| {
                ContractError::sink_write(&self.name, format!("bincode error: {}", e))
            }),
        }
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, record: &PublishedRecord) -> Result<Vec<u8>, ContractError> {
        let data = self.serialize(&WireRecord::new(record, true))?;
        if data.len() <= self.config.max_packet_size {
            return Ok(data);
        }

        warn!(
            sink = %self.name,
            size = data.len(),
            max = self.config.max_packet_size,
            "Datagram too large, sending header only"
        );
        let data = self.serialize(&WireRecord::new(record, false))?;
        if data.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!("header of {} bytes exceeds max_packet_size", data.len()),
            ));
        }
        Ok(data)
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], port: &str) {
        match socket.send(data).await {
            Ok(sent) => debug!(sink = %self.name, port, bytes = sent, "Sent"),
            // best-effort: a lost datagram is not a sink failure
            Err(e) => error!(sink = %self.name, error = %e, "UDP send failed"),
        }
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, record),
        fields(sink = %self.name, port = record.port())
    )]
    async fn write(&mut self, record: &PublishedRecord) -> Result<(), ContractError> {
        let socket = self.socket()?;
        let data = self.prepare_payload(record)?;
        self.transmit(socket, &data, record.port()).await;
        Ok(())
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
