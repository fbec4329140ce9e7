//! Response building

use bytes::{BufMut, Bytes, BytesMut};

use super::constants::{StatusCode, RTSP_VERSION};
use super::request::RtspRequest;

/// A control response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspResponse {
    /// Status code
    pub status: StatusCode,

    /// CSeq echoed from the request
    pub cseq: Option<String>,

    /// Extra headers in insertion order
    pub headers: Vec<(String, String)>,

    /// Body (session description)
    pub body: String,
}

impl RtspResponse {
    /// Create a response with the given status
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            cseq: None,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Create a 200 response answering `request`
    pub fn ok(request: &RtspRequest) -> Self {
        Self::new(StatusCode::Ok).for_request(request)
    }

    /// Create an error response answering `request`
    pub fn error(request: &RtspRequest, status: StatusCode) -> Self {
        Self::new(status).for_request(request)
    }

    /// Echo the request's CSeq
    pub fn for_request(mut self, request: &RtspRequest) -> Self {
        self.cseq = request.cseq().map(str::to_string);
        self
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value by case-insensitive name
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize the response
    pub fn encode(&self, server_name: &str) -> Bytes {
        let mut buf = BytesMut::with_capacity(256 + self.body.len());

        put_line(&mut buf, &format!("{} {}", RTSP_VERSION, self.status));
        put_line(&mut buf, &format!("Server: {}", server_name));
        if let Some(ref cseq) = self.cseq {
            put_line(&mut buf, &format!("CSeq: {}", cseq));
        }
        put_line(&mut buf, &format!("Content-Length: {}", self.body.len()));
        for (name, value) in &self.headers {
            put_line(&mut buf, &format!("{}: {}", name, value));
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(self.body.as_bytes());

        buf.freeze()
    }
}

fn put_line(buf: &mut BytesMut, line: &str) {
    buf.put_slice(line.as_bytes());
    buf.put_slice(b"\r\n");
}
