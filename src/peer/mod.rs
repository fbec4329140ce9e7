//! Peer connection orchestration
//!
//! Discovery and link provisioning are platform services reached through
//! [`PeerDiscovery`] and [`LinkProvisioning`]. [`PeerOrchestrator`] drives
//! them, throttles handshakes to one in flight per role, and feeds link
//! outcomes into the server's connection table.

pub mod config;
pub mod discovery;
pub mod link;
pub mod orchestrator;
pub mod throttle;

pub use config::OrchestratorConfig;
pub use discovery::{DiscoveryError, DiscoveryEvent, DiscoveryRole, PeerDiscovery, PeerToken, TransportHandle};
pub use link::{LinkCallback, LinkError, LinkProvisioning};
pub use orchestrator::PeerOrchestrator;
pub use throttle::ConnectThrottle;
