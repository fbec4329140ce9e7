//! `Transport` header handling
//!
//! Only the parts the relay negotiates are modeled: the client port pair on
//! the way in, and destination / port pairs / SSRC / mode on the way out.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::ProtocolError;

/// An RTP/RTCP port pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortPair {
    /// RTP port
    pub rtp: u16,
    /// RTCP port
    pub rtcp: u16,
}

impl PortPair {
    pub fn new(rtp: u16, rtcp: u16) -> Self {
        Self { rtp, rtcp }
    }

    /// A bare port implies the contiguous two-port range
    ///
    /// `None` for the last port, which has no RTCP neighbour.
    pub fn contiguous(rtp: u16) -> Option<Self> {
        rtp.checked_add(1).map(|rtcp| Self { rtp, rtcp })
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.rtp, self.rtcp)
    }
}

impl FromStr for PortPair {
    type Err = ProtocolError;

    /// Parse `start[-end]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::MalformedHeader(format!("port range {s:?}"));

        match s.split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse().map_err(|_| invalid())?;
                let end = end.trim().parse().map_err(|_| invalid())?;
                Ok(Self::new(start, end))
            }
            None => s
                .trim()
                .parse()
                .ok()
                .and_then(Self::contiguous)
                .ok_or_else(invalid),
        }
    }
}

/// Extract `client_port=start[-end]` from a `Transport` header value
///
/// Returns `Ok(None)` when the parameter is absent or has no leading port
/// number, and an error when a bare port leaves no room for RTCP.
pub fn parse_client_port(transport: &str) -> Result<Option<PortPair>, ProtocolError> {
    const PARAM: &str = "client_port=";

    let lower = transport.to_ascii_lowercase();
    let Some(start) = lower.find(PARAM).map(|i| i + PARAM.len()) else {
        return Ok(None);
    };
    let value = &transport[start..];

    let first: String = value.chars().take_while(char::is_ascii_digit).collect();
    let Ok(rtp) = first.parse::<u16>() else {
        return Ok(None);
    };

    let rest = &value[first.len()..];
    let second = rest.strip_prefix('-').map(|tail| {
        tail.chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>()
    });

    match second.and_then(|digits| digits.parse().ok()) {
        Some(rtcp) => Ok(Some(PortPair::new(rtp, rtcp))),
        None => PortPair::contiguous(rtp)
            .map(Some)
            .ok_or_else(|| ProtocolError::MalformedHeader(format!("client_port={rtp}"))),
    }
}

/// Direction advertised in the `mode` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Server sends media to the client
    Play,
    /// Server receives media from the client
    Receive,
}

impl TransportMode {
    fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Play => "play",
            TransportMode::Receive => "receive",
        }
    }
}

/// Negotiated transport echoed in SETUP responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    /// Address media flows to
    pub destination: IpAddr,
    /// Client side ports
    pub client_ports: PortPair,
    /// Server side ports
    pub server_ports: PortPair,
    /// Synchronization source for outgoing media
    pub ssrc: Option<u32>,
    /// Direction
    pub mode: TransportMode,
}

impl fmt::Display for TransportReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cast = if self.destination.is_multicast() {
            "multicast"
        } else {
            "unicast"
        };

        write!(
            f,
            "RTP/AVP/UDP;{};destination={};client_port={};server_port={}",
            cast, self.destination, self.client_ports, self.server_ports
        )?;
        if let Some(ssrc) = self.ssrc {
            write!(f, ";ssrc={:08x}", ssrc)?;
        }
        write!(f, ";mode={}", self.mode.as_str())
    }
}
