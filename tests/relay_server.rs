//! Loopback tests against a running relay server

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use rtsp_relay::media::{CaptureTrack, MediaBackend, TrackStart};
use rtsp_relay::peer::{DiscoveryRole, PeerToken};
use rtsp_relay::protocol::TrackKind;
use rtsp_relay::registry::RegistryEvent;
use rtsp_relay::server::ConnectionStatus;
use rtsp_relay::{RelayServer, ServerConfig, ServerHandle, StreamId};

const ANNOUNCE_BODY: &str = "v=0\r\n\
    o=- 0 0 IN IP4 127.0.0.1\r\n\
    s=Garden\r\n\
    m=audio 5004 RTP/AVP 96\r\n\
    a=rtpmap:96 mpeg4-generic/8000\r\n\
    m=video 5006 RTP/AVP 96\r\n\
    a=rtpmap:96 H264/90000\r\n";

#[derive(Default)]
struct RecordingMedia {
    started: Mutex<Vec<(u64, u8)>>,
    stopped: Mutex<Vec<(u64, u8)>>,
}

impl MediaBackend for RecordingMedia {
    fn configure_capture(&self) -> io::Result<Vec<CaptureTrack>> {
        Ok(vec![CaptureTrack {
            kind: TrackKind::Video,
            description: "m=video 0 RTP/AVP 96\r\na=rtpmap:96 H264/90000\r\n".into(),
        }])
    }

    fn start_track(&self, start: &TrackStart<'_>) -> io::Result<()> {
        self.started.lock().push((start.session_id, start.track.index));
        Ok(())
    }

    fn stop_track(&self, session_id: u64, index: u8) {
        self.stopped.lock().push((session_id, index));
    }
}

struct Response {
    status: u16,
    head: String,
    body: String,
}

impl Response {
    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

struct Client {
    stream: TcpStream,
    buf: Vec<u8>,
    cseq: u32,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            buf: Vec::new(),
            cseq: 0,
        }
    }

    async fn send(&mut self, method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> Response {
        self.cseq += 1;
        let mut request = format!("{method} rtsp://127.0.0.1/{path} RTSP/1.0\r\nCSeq: {}\r\n", self.cseq);
        for (name, value) in headers {
            request.push_str(&format!("{name}: {value}\r\n"));
        }
        if !body.is_empty() {
            request.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        request.push_str("\r\n");
        request.push_str(body);

        self.stream.write_all(request.as_bytes()).await.unwrap();
        let response = self.read_response().await;
        assert_eq!(response.header("CSeq"), Some(self.cseq.to_string().as_str()));
        response
    }

    async fn read_response(&mut self) -> Response {
        loop {
            if let Some(end) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8(self.buf[..end].to_vec()).unwrap();
                let length: usize = head
                    .lines()
                    .find_map(|l| l.strip_prefix("Content-Length: "))
                    .map(|v| v.parse().unwrap())
                    .unwrap_or(0);

                let total = end + 4 + length;
                if self.buf.len() >= total {
                    let body = String::from_utf8(self.buf[end + 4..total].to_vec()).unwrap();
                    self.buf.drain(..total);
                    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
                    return Response { status, head, body };
                }
            }

            let mut chunk = [0u8; 4096];
            let n = time::timeout(Duration::from_secs(5), self.stream.read(&mut chunk))
                .await
                .expect("response timed out")
                .unwrap();
            assert!(n > 0, "server closed the channel");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

async fn start_server(config: ServerConfig) -> (ServerHandle, SocketAddr, Arc<RecordingMedia>) {
    let media = Arc::new(RecordingMedia::default());
    let server = RelayServer::spawn(config, Arc::clone(&media));
    server.start().unwrap();
    let addr = server
        .add_listener(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    (server, addr, media)
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_options_over_loopback() {
    let (server, addr, _) = start_server(ServerConfig::default().server_name("Loopback")).await;
    let mut client = Client::connect(addr).await;

    let response = client.send("OPTIONS", "", &[], "").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Server"), Some("Loopback"));
    assert!(response.header("Public").unwrap().contains("ANNOUNCE"));

    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let (server, addr, _) = start_server(ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\n\r\nOPTIONS * RTSP/1.0\r\nCSeq: 2\r\n\r\n")
        .await
        .unwrap();

    let mut client = Client {
        stream,
        buf: Vec::new(),
        cseq: 0,
    };
    let first = client.read_response().await;
    let second = client.read_response().await;
    assert_eq!(first.header("CSeq"), Some("1"));
    assert_eq!(second.header("CSeq"), Some("2"));

    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_stalled_reader_does_not_block_other_channels() {
    let (server, addr, _) = start_server(ServerConfig::default()).await;

    // Enough pipelined requests that the responses overflow the socket buffers
    let mut stalled = TcpStream::connect(addr).await.unwrap();
    const FLOOD: u64 = 150_000;
    let flood = "OPTIONS * RTSP/1.0\r\nCSeq: 1\r\n\r\n".repeat(FLOOD as usize);
    let flooding = tokio::spawn(async move {
        stalled.write_all(flood.as_bytes()).await.unwrap();
        stalled
    });

    let deadline = time::Instant::now() + Duration::from_secs(60);
    loop {
        let stats = time::timeout(Duration::from_secs(5), server.stats())
            .await
            .expect("server loop stalled")
            .unwrap();
        if stats.requests_handled >= FLOOD {
            break;
        }
        assert!(time::Instant::now() < deadline, "flood not processed");
        time::sleep(Duration::from_millis(20)).await;
    }

    let mut client = Client::connect(addr).await;
    let options = client.send("OPTIONS", "", &[], "").await;
    assert_eq!(options.status, 200);

    let stats = time::timeout(Duration::from_secs(5), server.stats())
        .await
        .expect("server loop stalled")
        .unwrap();
    assert_eq!(stats.active_channels, 2);

    let stalled = flooding.await.unwrap();
    drop(stalled);
    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_publish_then_disconnect_cleans_registry() {
    let (server, addr, _) = start_server(ServerConfig::default()).await;
    let mut events = server.registry().subscribe();
    let id = StreamId::new_v4();
    let path = id.to_string();

    let mut publisher = Client::connect(addr).await;
    let announce = publisher.send("ANNOUNCE", &path, &[], ANNOUNCE_BODY).await;
    assert_eq!(announce.status, 200);
    assert!(announce.header("Session").is_some());

    let setup = publisher
        .send(
            "SETUP",
            &format!("{path}/trackID=1"),
            &[("Transport", "RTP/AVP;unicast;client_port=6000")],
            "",
        )
        .await;
    assert_eq!(setup.status, 200);
    assert!(setup.header("Transport").unwrap().contains("client_port=6000-6001"));

    let record = publisher.send("RECORD", &path, &[], "").await;
    assert_eq!(record.status, 200);

    let listed = server.registry().list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].name, "Garden");
    assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Added { .. }));

    // A second channel sees the stream and can describe it
    let mut viewer = Client::connect(addr).await;
    let describe = viewer.send("DESCRIBE", &path, &[], "").await;
    assert_eq!(describe.status, 200);
    assert!(describe.body.contains("m=audio"));
    assert!(describe.body.contains("m=video"));

    drop(publisher);
    eventually(|| {
        let server = server.clone();
        async move { server.registry().is_empty().await }
    })
    .await;
    assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Removed { .. }));

    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_unauthorized_over_loopback() {
    let (server, addr, _) = start_server(ServerConfig::default().credentials("user", "pass")).await;
    let mut client = Client::connect(addr).await;

    let options = client.send("OPTIONS", "", &[], "").await;
    assert_eq!(options.status, 200);

    let describe = client.send("DESCRIBE", "live", &[], "").await;
    assert_eq!(describe.status, 401);
    assert!(describe.header("WWW-Authenticate").unwrap().starts_with("Basic"));

    let authorized = client
        .send("DESCRIBE", "live", &[("Authorization", "Basic dXNlcjpwYXNz")], "")
        .await;
    assert_eq!(authorized.status, 200);

    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_malformed_request_keeps_channel_open() {
    let (server, addr, _) = start_server(ServerConfig::default()).await;
    let mut client = Client::connect(addr).await;

    client.stream.write_all(b"garbage\r\n\r\n").await.unwrap();
    let bad = client.read_response().await;
    assert_eq!(bad.status, 400);

    let options = client.send("OPTIONS", "", &[], "").await;
    assert_eq!(options.status, 200);

    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_playback_setup_starts_media() {
    let (server, addr, media) = start_server(ServerConfig::default()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.send("DESCRIBE", "live", &[], "").await.status, 200);
    let setup = client
        .send(
            "SETUP",
            "live/trackID=1",
            &[("Transport", "RTP/AVP;unicast;client_port=7000-7001")],
            "",
        )
        .await;
    assert_eq!(setup.status, 200);
    assert_eq!(media.started.lock().len(), 1);

    let teardown = client.send("TEARDOWN", "live", &[], "").await;
    assert_eq!(teardown.status, 200);
    assert_eq!(media.stopped.lock().len(), 1);

    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_stop_closes_channels_and_disables() {
    let (server, addr, _) = start_server(ServerConfig::default()).await;
    let mut client = Client::connect(addr).await;
    assert_eq!(client.send("OPTIONS", "", &[], "").await.status, 200);

    server.stop().await.unwrap();
    assert!(!server.is_enabled());

    let mut buf = [0u8; 16];
    let n = time::timeout(Duration::from_secs(5), client.stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);

    let err = server.add_listener(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_peer_connection_lifecycle() {
    let config = ServerConfig::default().link_bind_ip(Ipv4Addr::LOCALHOST.into());
    let (server, _, _) = start_server(config).await;
    let peer = PeerToken::new("peer-7");

    let status = server
        .add_connection(peer.clone(), DiscoveryRole::Subscriber)
        .await
        .unwrap();
    let ConnectionStatus::Created(peer_addr) = status else {
        panic!("expected a new connection");
    };
    assert_eq!(
        server.add_connection(peer.clone(), DiscoveryRole::Subscriber).await.unwrap(),
        ConnectionStatus::AlreadyConnected
    );

    let mut client = Client::connect(peer_addr).await;
    assert_eq!(client.send("OPTIONS", "", &[], "").await.status, 200);

    let stats = server.stats().await.unwrap();
    assert_eq!(stats.active_peer_connections, 1);
    assert_eq!(stats.active_channels, 1);
    assert_eq!(stats.requests_handled, 1);

    server.remove_connection(peer.clone()).unwrap();
    assert!(!server.has_connection(peer).await.unwrap());
    let stats = server.stats().await.unwrap();
    assert_eq!(stats.active_channels, 0);
    assert_eq!(stats.active_listeners, 1);

    server.shutdown().unwrap();
}
