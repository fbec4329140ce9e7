//! Session description handling
//!
//! Announced descriptions are parsed loosely: every `m=audio` / `m=video`
//! line together with the two lines that follow it forms one track. The
//! server never interprets codec parameters, it only hands them on to
//! relay clients.

use std::fmt::Write as _;
use std::net::IpAddr;

/// Media type of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    /// Conventional track index (0 = audio, 1 = video)
    pub fn index(&self) -> u8 {
        match self {
            TrackKind::Audio => 0,
            TrackKind::Video => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(TrackKind::Audio),
            1 => Some(TrackKind::Video),
            _ => None,
        }
    }
}

/// One media section of a description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    /// Media type
    pub kind: TrackKind,
    /// Raw section text, CRLF terminated
    pub text: String,
}

/// Result of parsing an announced description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnouncedDescription {
    /// Session name (`s=`), if meaningful
    pub name: Option<String>,
    /// Whether the publisher uses a shared secret
    pub shared_secret: bool,
    /// Shared secret mode flag
    pub shared_secret_mode: bool,
    /// Media sections in announce order
    pub media: Vec<MediaDescription>,
}

impl AnnouncedDescription {
    /// Parse an ANNOUNCE body
    pub fn parse(body: &str) -> Self {
        let mut parsed = Self::default();
        let mut lines = body.lines();

        while let Some(line) = lines.next() {
            if line.is_empty() {
                break;
            }

            let lower = line.to_ascii_lowercase();
            let kind = if lower.starts_with("m=audio ") {
                Some(TrackKind::Audio)
            } else if lower.starts_with("m=video ") {
                Some(TrackKind::Video)
            } else {
                None
            };

            if let Some(kind) = kind {
                let mut text = format!("{line}\r\n");
                for follow in lines.by_ref().take(2) {
                    text.push_str(follow);
                    text.push_str("\r\n");
                }
                parsed.media.push(MediaDescription { kind, text });
                continue;
            }

            if let Some(name) = line.strip_prefix("s=") {
                let name = name.trim();
                if !name.is_empty() && name != "-" {
                    parsed.name = Some(name.to_string());
                }
            } else if let Some(secret) = lower.strip_prefix("a=x-shared-secret") {
                parsed.shared_secret = true;
                parsed.shared_secret_mode = secret.trim_start_matches(':').trim() == "mode";
            }
        }

        parsed
    }
}

/// Builder for descriptions returned by DESCRIBE
#[derive(Debug, Clone)]
pub struct SessionDescription {
    session_id: u64,
    name: String,
    origin: IpAddr,
    destination: IpAddr,
    tracks: Vec<(u8, String)>,
}

impl SessionDescription {
    pub fn new(session_id: u64, origin: IpAddr, destination: IpAddr) -> Self {
        Self {
            session_id,
            name: "Unnamed".to_string(),
            origin,
            destination,
            tracks: Vec::new(),
        }
    }

    /// Set the session name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a media section controlled as `trackID=<index>`
    pub fn track(mut self, index: u8, text: impl Into<String>) -> Self {
        self.tracks.push((index, text.into()));
        self
    }

    /// Render the description
    pub fn build(&self) -> String {
        let mut sdp = String::new();
        let _ = write!(sdp, "v=0\r\n");
        let _ = write!(
            sdp,
            "o=- {id} {id} IN {} {}\r\n",
            addr_type(&self.origin),
            self.origin,
            id = self.session_id
        );
        let _ = write!(sdp, "s={}\r\n", self.name);
        let _ = write!(sdp, "i=N/A\r\n");
        let _ = write!(
            sdp,
            "c=IN {} {}\r\n",
            addr_type(&self.destination),
            self.destination
        );
        let _ = write!(sdp, "t=0 0\r\n");
        let _ = write!(sdp, "a=recvonly\r\n");

        for (index, text) in &self.tracks {
            sdp.push_str(text);
            if !text.ends_with('\n') {
                sdp.push_str("\r\n");
            }
            let _ = write!(sdp, "a=control:trackID={}\r\n", index);
        }

        sdp
    }
}

fn addr_type(addr: &IpAddr) -> &'static str {
    match addr {
        IpAddr::V4(_) => "IP4",
        IpAddr::V6(_) => "IP6",
    }
}
