//! Request parsing and framing
//!
//! A request is complete once its header block has been terminated by an
//! empty line and `Content-Length` bytes of body (zero when the header is
//! absent) have arrived. Bytes after that stay buffered for the next request.

use std::collections::HashMap;

use bytes::{Buf, BytesMut};

use super::constants::Method;
use super::uri;
use crate::error::ProtocolError;

/// A parsed control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspRequest {
    /// Method token as sent by the client
    pub method: String,

    /// Request URI
    pub uri: String,

    /// Stream path extracted from the URI
    pub path: String,

    /// Headers, keyed by lowercase name
    pub headers: HashMap<String, String>,

    /// Message body (session description for ANNOUNCE)
    pub body: String,
}

impl RtspRequest {
    /// Parse a request from its header block and body
    pub fn parse(head: &str, body: &str) -> Result<Self, ProtocolError> {
        let mut lines = head.lines();

        let request_line = lines
            .by_ref()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| ProtocolError::MalformedRequestLine(String::new()))?;
        let (method, uri) = parse_request_line(request_line)?;

        let mut headers = HashMap::new();
        for line in lines {
            if line.trim().is_empty() {
                break;
            }
            let (name, value) = parse_header_line(line)?;
            headers.insert(name, value);
        }

        Ok(Self {
            path: uri::parse_path(&uri),
            method,
            uri,
            headers,
            body: body.to_string(),
        })
    }

    /// Resolve the method token
    pub fn method(&self) -> Result<Method, ProtocolError> {
        self.method
            .parse()
            .map_err(|_| ProtocolError::UnknownMethod(self.method.clone()))
    }

    /// Get a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `CSeq` header, echoed in responses
    pub fn cseq(&self) -> Option<&str> {
        self.header("cseq")
    }

    /// Declared body length
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

fn parse_request_line(line: &str) -> Result<(String, String), ProtocolError> {
    let malformed = || ProtocolError::MalformedRequestLine(line.to_string());

    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or_else(malformed)?;
    let uri = parts.next().ok_or_else(malformed)?;
    let version = parts.next().ok_or_else(malformed)?;

    let is_word = method
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !is_word || !version.to_ascii_uppercase().starts_with("RTSP") {
        return Err(malformed());
    }

    Ok((method.to_string(), uri.to_string()))
}

fn parse_header_line(line: &str) -> Result<(String, String), ProtocolError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;

    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(ProtocolError::MalformedHeader(line.to_string()));
    }

    Ok((name.to_ascii_lowercase(), value.trim().to_string()))
}

/// Per-channel request reassembly buffer
#[derive(Debug)]
pub struct RequestDecoder {
    buf: BytesMut,
    max_request_size: usize,
}

impl RequestDecoder {
    /// Create a decoder that rejects requests larger than `max_request_size`
    pub fn new(max_request_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_request_size,
        }
    }

    /// Append bytes read from the channel
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered, not yet decoded bytes
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to take one complete request out of the buffer
    ///
    /// Returns `Ok(None)` when more bytes are needed. On error the offending
    /// bytes have been consumed so decoding can resume with the next request.
    pub fn decode(&mut self) -> Result<Option<RtspRequest>, ProtocolError> {
        // Stray line breaks between pipelined requests
        let leading = self
            .buf
            .iter()
            .take_while(|b| **b == b'\r' || **b == b'\n')
            .count();
        self.buf.advance(leading);

        let Some((head_len, terminator_len)) = find_header_end(&self.buf) else {
            return self.check_size(self.buf.len()).map(|_| None);
        };

        let head = String::from_utf8_lossy(&self.buf[..head_len]).into_owned();
        let content_length = match header_content_length(&head) {
            Ok(len) => len,
            Err(e) => {
                self.buf.advance(head_len + terminator_len);
                return Err(e);
            }
        };

        if content_length > self.max_request_size {
            let size = self.buf.len();
            self.buf.clear();
            return Err(ProtocolError::RequestTooLarge(size.max(content_length)));
        }

        let total = head_len + terminator_len + content_length;
        if self.buf.len() < total {
            return self.check_size(total).map(|_| None);
        }

        let frame = self.buf.split_to(total);
        let body = String::from_utf8_lossy(&frame[head_len + terminator_len..]);

        RtspRequest::parse(&head, &body).map(Some)
    }

    fn check_size(&mut self, needed: usize) -> Result<(), ProtocolError> {
        if needed > self.max_request_size {
            let size = self.buf.len();
            self.buf.clear();
            return Err(ProtocolError::RequestTooLarge(size.max(needed)));
        }
        Ok(())
    }
}

/// Locate the empty line ending the header block
fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = buf.windows(2).position(|w| w == b"\n\n");

    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => Some((l, 2)),
        (Some(c), _) => Some((c, 4)),
        (None, Some(l)) => Some((l, 2)),
        (None, None) => None,
    }
}

fn header_content_length(head: &str) -> Result<usize, ProtocolError> {
    for line in head.lines().skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value
                    .trim()
                    .parse()
                    .map_err(|_| ProtocolError::MalformedHeader(line.to_string()));
            }
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS: &str = "OPTIONS rtsp://127.0.0.1:1234/ RTSP/1.0\r\nCSeq: 1\r\n\r\n";

    #[test]
    fn test_parse_simple_request() {
        let mut decoder = RequestDecoder::new(64 * 1024);
        decoder.extend(OPTIONS.as_bytes());

        let request = decoder.decode().unwrap().unwrap();
        assert_eq!(request.method().unwrap(), Method::Options);
        assert_eq!(request.uri, "rtsp://127.0.0.1:1234/");
        assert_eq!(request.path, "");
        assert_eq!(request.cseq(), Some("1"));
        assert!(request.body.is_empty());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_request_waits() {
        let mut decoder = RequestDecoder::new(64 * 1024);
        decoder.extend(b"DESCRIBE rtsp://h/live RTSP/1.0\r\nCSeq: 2\r\n");
        assert!(decoder.decode().unwrap().is_none());

        decoder.extend(b"\r\n");
        let request = decoder.decode().unwrap().unwrap();
        assert_eq!(request.path, "live");
    }

    #[test]
    fn test_body_uses_content_length() {
        let body = "v=0\r\nm=audio 5004 RTP/AVP 96\r\n";
        let head = format!(
            "ANNOUNCE rtsp://h/abc RTSP/1.0\r\nCSeq: 3\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );

        let mut decoder = RequestDecoder::new(64 * 1024);
        decoder.extend(head.as_bytes());
        decoder.extend(&body.as_bytes()[..5]);
        assert!(decoder.decode().unwrap().is_none());

        decoder.extend(&body.as_bytes()[5..]);
        let request = decoder.decode().unwrap().unwrap();
        assert_eq!(request.body, body);
        assert_eq!(request.content_length(), body.len());
    }

    #[test]
    fn test_pipelined_requests() {
        let mut decoder = RequestDecoder::new(64 * 1024);
        let two = format!("{OPTIONS}{}", OPTIONS.replace("CSeq: 1", "CSeq: 2"));
        decoder.extend(two.as_bytes());

        assert_eq!(decoder.decode().unwrap().unwrap().cseq(), Some("1"));
        assert_eq!(decoder.decode().unwrap().unwrap().cseq(), Some("2"));
        assert!(decoder.decode().unwrap().is_none());
    }

    #[test]
    fn test_bare_lf_terminator() {
        let mut decoder = RequestDecoder::new(64 * 1024);
        decoder.extend(b"PLAY rtsp://h/live RTSP/1.0\nCSeq: 9\n\n");

        let request = decoder.decode().unwrap().unwrap();
        assert_eq!(request.method().unwrap(), Method::Play);
        assert_eq!(request.cseq(), Some("9"));
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let request = RtspRequest::parse(
            "SETUP rtsp://h/live/trackID=0 RTSP/1.0\r\nTRANSPORT: RTP/AVP;client_port=5000\r\n",
            "",
        )
        .unwrap();
        assert_eq!(request.header("Transport"), Some("RTP/AVP;client_port=5000"));
    }

    #[test]
    fn test_malformed_request_line() {
        let mut decoder = RequestDecoder::new(64 * 1024);
        decoder.extend(b"HELLO\r\n\r\n");
        assert!(matches!(
            decoder.decode(),
            Err(ProtocolError::MalformedRequestLine(_))
        ));
        // Malformed bytes are consumed
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_unknown_method_parses_but_does_not_resolve() {
        let request = RtspRequest::parse("GET_PARAMETER rtsp://h/ RTSP/1.0\r\n", "").unwrap();
        assert_eq!(
            request.method(),
            Err(ProtocolError::UnknownMethod("GET_PARAMETER".into()))
        );
    }

    #[test]
    fn test_huge_content_length_rejected() {
        let mut decoder = RequestDecoder::new(64 * 1024);
        decoder.extend(b"OPTIONS rtsp://h/ RTSP/1.0\r\nCSeq: 1\r\nContent-Length: 18446744073709551615\r\n\r\n");

        assert_eq!(
            decoder.decode(),
            Err(ProtocolError::RequestTooLarge(usize::MAX))
        );
        assert_eq!(decoder.buffered(), 0);

        // The channel keeps working
        decoder.extend(OPTIONS.as_bytes());
        assert_eq!(decoder.decode().unwrap().unwrap().cseq(), Some("1"));
    }

    #[test]
    fn test_oversized_request_rejected() {
        let mut decoder = RequestDecoder::new(32);
        decoder.extend(&[b'A'; 64]);
        assert!(matches!(
            decoder.decode(),
            Err(ProtocolError::RequestTooLarge(_))
        ));
        assert_eq!(decoder.buffered(), 0);
    }
}
