//! Minimal HTTP/1.1 client side of the NTRIP protocol.
//!
//! Casters answer with either an NTRIP 1.0 `ICY 200 OK` status line or a
//! regular `HTTP/1.1` one, sometimes without headers or even the blank line
//! before the binary stream starts. A general purpose HTTP client rejects
//! such replies, so requests and response heads are handled here.

use std::{io, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, trace, warn};
use url::Url;

use super::ConnectionConfig;
use crate::{
    constants::RTCM_SYNC_CHAR,
    error::{NtripError, Result},
};

const READ_BUFFER_SIZE: usize = 4096;
const MAX_HEAD_LEN: usize = 16 * 1024;
const MAX_CHUNK_LINE_LEN: usize = 1024;
const GGA_POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Host, port and request path of one HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpTarget {
    /// `host:port`, IPv6 hosts in brackets
    authority: String,
    path: String,
    authorization: Option<String>,
}

impl HttpTarget {
    /// `http://host:port/mountpoint` on the caster itself.
    pub(crate) fn direct(config: &ConnectionConfig) -> Result<Self> {
        let mut url = Url::parse(&format!(
            "http://{}:{}/",
            config.caster_host(),
            config.caster_port
        ))?;
        push_segments(&mut url, &[config.mountpoint()])?;
        Self::from_url(&url, basic_auth(config))
    }

    /// `proxy_url/mountpoint?host=&port=&user=&password=`; the relay handles
    /// authentication with the caster.
    pub(crate) fn proxy(config: &ConnectionConfig, proxy_url: &str) -> Result<Self> {
        Self::from_url(&proxy_url_for(config, proxy_url, &[config.mountpoint()])?, None)
    }

    /// Where the relay accepts position reports: `proxy_url/mountpoint/gga`.
    pub(crate) fn proxy_gga(config: &ConnectionConfig, proxy_url: &str) -> Result<Self> {
        Self::from_url(
            &proxy_url_for(config, proxy_url, &[config.mountpoint(), "gga"])?,
            None,
        )
    }

    fn from_url(url: &Url, authorization: Option<String>) -> Result<Self> {
        if url.scheme() != "http" {
            return Err(NtripError::Config(format!(
                "unsupported scheme `{}`, only plain http is available",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| NtripError::Config(format!("`{url}` has no host")))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        Ok(Self {
            authority: format!("{host}:{port}"),
            path,
            authorization,
        })
    }

    pub(crate) fn get_request(&self, user_agent: &str) -> String {
        let mut request = format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Accept: application/octet-stream\r\n\
             Ntrip-Version: Ntrip/2.0\r\n\
             User-Agent: NTRIP {user_agent}\r\n",
            self.path, self.authority
        );
        self.finish_head(&mut request);
        request
    }

    pub(crate) fn post_request(&self, user_agent: &str, body: &str) -> String {
        let mut request = format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: {}\r\n\
             Ntrip-Version: Ntrip/2.0\r\n\
             User-Agent: NTRIP {user_agent}\r\n",
            self.path,
            self.authority,
            body.len()
        );
        self.finish_head(&mut request);
        request.push_str(body);
        request
    }

    fn finish_head(&self, request: &mut String) {
        if let Some(credentials) = &self.authorization {
            request.push_str("Authorization: Basic ");
            request.push_str(credentials);
            request.push_str("\r\n");
        }
        request.push_str("Connection: close\r\n\r\n");
    }
}

fn basic_auth(config: &ConnectionConfig) -> Option<String> {
    config
        .has_credentials()
        .then(|| STANDARD.encode(format!("{}:{}", config.username, config.password)))
}

fn push_segments(url: &mut Url, segments: &[&str]) -> Result<()> {
    let rendered = url.to_string();
    url.path_segments_mut()
        .map_err(|()| NtripError::Config(format!("`{rendered}` cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

fn proxy_url_for(config: &ConnectionConfig, proxy_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(proxy_url)?;
    push_segments(&mut url, segments)?;
    url.query_pairs_mut()
        .append_pair("host", config.caster_host())
        .append_pair("port", &config.caster_port.to_string())
        .append_pair("user", &config.username)
        .append_pair("password", &config.password);
    Ok(url)
}

/// Accepts `ICY 200 OK`, `SOURCETABLE 200 OK` and any `HTTP/1.x 2xx`.
pub(crate) fn check_status(line: &str) -> Result<()> {
    let line = line.trim_end();
    if line.starts_with("ICY 200") || line.starts_with("SOURCETABLE 200") {
        return Ok(());
    }
    let mut parts = line.splitn(3, ' ');
    let status = match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code.parse().unwrap_or(0),
        _ => 0,
    };
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(NtripError::Http {
            status,
            line: line.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub(crate) status_line: String,
    pub(crate) headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"))
    }
}

fn invalid_data(message: impl Into<String>) -> NtripError {
    NtripError::Io(io::Error::new(io::ErrorKind::InvalidData, message.into()))
}

/// Read the status line and headers. Returns the head and whatever body
/// bytes arrived with it.
pub(crate) async fn read_head<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<(ResponseHead, Vec<u8>)> {
    let mut buf = Vec::with_capacity(READ_BUFFER_SIZE);
    let mut chunk = [0u8; READ_BUFFER_SIZE];
    loop {
        if let Some((head, consumed)) = parse_head(&buf)? {
            return Ok((head, buf.split_off(consumed)));
        }
        if buf.len() > MAX_HEAD_LEN {
            return Err(invalid_data("response head too large"));
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(NtripError::StreamEnded);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn parse_head(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>> {
    let Some(status_end) = find_newline(buf, 0) else {
        return Ok(None);
    };
    let status_line = String::from_utf8_lossy(&buf[..status_end]).trim_end().to_string();
    check_status(&status_line)?;
    let icy = status_line.starts_with("ICY");

    let mut head = ResponseHead {
        status_line,
        headers: Vec::new(),
    };
    let mut pos = status_end + 1;
    loop {
        // NTRIP 1.0 casters may start streaming right after the status line
        if icy && buf.get(pos) == Some(&RTCM_SYNC_CHAR) {
            return Ok(Some((head, pos)));
        }
        let Some(end) = find_newline(buf, pos) else {
            return Ok(None);
        };
        let line = String::from_utf8_lossy(&buf[pos..end]);
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(Some((head, end + 1)));
        }
        match line.split_once(':') {
            Some((name, value)) => head
                .headers
                .push((name.trim().to_string(), value.trim().to_string())),
            None if icy => return Ok(Some((head, pos))),
            None => trace!(line, "ignoring malformed header"),
        }
        pos = end + 1;
    }
}

fn find_newline(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|b| *b == b'\n')
        .map(|i| from + i)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ChunkState {
    #[default]
    Size,
    Data(usize),
    DataEnd,
    Done,
}

/// Incremental `Transfer-Encoding: chunked` decoder.
#[derive(Debug, Default)]
pub(crate) struct ChunkedDecoder {
    state: ChunkState,
    line: Vec<u8>,
}

impl ChunkedDecoder {
    /// Append the payload bytes contained in `input` to `out`.
    pub(crate) fn decode(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        while !input.is_empty() {
            match self.state {
                ChunkState::Size | ChunkState::DataEnd => {
                    let Some(i) = input.iter().position(|b| *b == b'\n') else {
                        self.line.extend_from_slice(input);
                        if self.line.len() > MAX_CHUNK_LINE_LEN {
                            return Err(invalid_data("chunk size line too long"));
                        }
                        return Ok(());
                    };
                    self.line.extend_from_slice(&input[..i]);
                    input = &input[i + 1..];
                    let line = std::mem::take(&mut self.line);
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();
                    self.state = if self.state == ChunkState::DataEnd {
                        if !line.is_empty() {
                            return Err(invalid_data("missing CRLF after chunk"));
                        }
                        ChunkState::Size
                    } else {
                        let size = line.split(';').next().unwrap_or_default().trim();
                        match usize::from_str_radix(size, 16) {
                            Ok(0) => ChunkState::Done,
                            Ok(size) => ChunkState::Data(size),
                            Err(_) => return Err(invalid_data(format!("bad chunk size `{size}`"))),
                        }
                    };
                },
                ChunkState::Data(remaining) => {
                    let n = remaining.min(input.len());
                    out.extend_from_slice(&input[..n]);
                    input = &input[n..];
                    self.state = if n == remaining {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(remaining - n)
                    };
                },
                // trailers are of no interest
                ChunkState::Done => return Ok(()),
            }
        }
        Ok(())
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }
}

/// Streaming GET to the caster or relay.
#[derive(Debug)]
pub(crate) struct HttpLink {
    stream: TcpStream,
    chunked: Option<ChunkedDecoder>,
    pending: Option<Vec<u8>>,
    buf: Vec<u8>,
    gga_target: HttpTarget,
    user_agent: String,
}

impl HttpLink {
    /// Connect, send the request and wait for an accepted status line.
    pub(crate) async fn open(
        target: &HttpTarget,
        gga_target: HttpTarget,
        user_agent: &str,
    ) -> Result<Self> {
        let mut stream = TcpStream::connect(&target.authority).await?;
        stream
            .write_all(target.get_request(user_agent).as_bytes())
            .await?;
        let (head, rest) = read_head(&mut stream).await?;
        debug!(status = %head.status_line, "caster accepted request");

        let mut chunked = head.is_chunked().then(ChunkedDecoder::default);
        let body = decode_body(&mut chunked, &rest)?;
        Ok(Self {
            stream,
            chunked,
            pending: (!body.is_empty()).then_some(body),
            buf: vec![0; READ_BUFFER_SIZE],
            gga_target,
            user_agent: user_agent.to_string(),
        })
    }

    /// Next block of body bytes, `None` once the caster closed the stream.
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        loop {
            if self.chunked.as_ref().is_some_and(ChunkedDecoder::is_done) {
                return Ok(None);
            }
            let n = self.stream.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
            let body = decode_body(&mut self.chunked, &self.buf[..n])?;
            // a read may carry nothing but chunk framing
            if !body.is_empty() {
                return Ok(Some(body));
            }
        }
    }

    /// POST the sentence on a separate connection without waiting for the
    /// outcome.
    pub(crate) fn send_gga(&self, sentence: &str) {
        let target = self.gga_target.clone();
        let request = target.post_request(&self.user_agent, sentence);
        tokio::spawn(async move {
            match tokio::time::timeout(GGA_POST_TIMEOUT, post(&target, &request)).await {
                Ok(Ok(())) => trace!(path = %target.path, "GGA delivered"),
                Ok(Err(e)) => warn!(path = %target.path, "GGA post failed: {e}"),
                Err(_) => warn!(path = %target.path, "GGA post timed out"),
            }
        });
    }
}

fn decode_body(chunked: &mut Option<ChunkedDecoder>, input: &[u8]) -> Result<Vec<u8>> {
    match chunked {
        Some(decoder) => {
            let mut out = Vec::with_capacity(input.len());
            decoder.decode(input, &mut out)?;
            Ok(out)
        },
        None => Ok(input.to_vec()),
    }
}

async fn post(target: &HttpTarget, request: &str) -> Result<()> {
    let mut stream = TcpStream::connect(&target.authority).await?;
    stream.write_all(request.as_bytes()).await?;
    read_head(&mut stream).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            username: "user".into(),
            password: "pass".into(),
            ..ConnectionConfig::new("caster.example", 2101, "MOUNT")
        }
    }

    #[test]
    fn direct_get_request() {
        let target = HttpTarget::direct(&config()).unwrap();
        assert_eq!(
            target.get_request("rtklink/0.1.0"),
            "GET /MOUNT HTTP/1.1\r\n\
             Host: caster.example:2101\r\n\
             Accept: application/octet-stream\r\n\
             Ntrip-Version: Ntrip/2.0\r\n\
             User-Agent: NTRIP rtklink/0.1.0\r\n\
             Authorization: Basic dXNlcjpwYXNz\r\n\
             Connection: close\r\n\r\n"
        );
    }

    #[test]
    fn no_credentials_no_authorization() {
        let target = HttpTarget::direct(&ConnectionConfig::new("10.0.0.1", 2101, "/M")).unwrap();
        let request = target.get_request("x");
        assert!(request.starts_with("GET /M HTTP/1.1\r\nHost: 10.0.0.1:2101\r\n"));
        assert!(!request.contains("Authorization"));
    }

    #[test]
    fn proxy_targets() {
        let target = HttpTarget::proxy(&config(), "http://relay.example:8080/ntrip").unwrap();
        assert_eq!(target.authority, "relay.example:8080");
        assert_eq!(
            target.path,
            "/ntrip/MOUNT?host=caster.example&port=2101&user=user&password=pass"
        );
        assert_eq!(target.authorization, None);

        let gga = HttpTarget::proxy_gga(&config(), "http://relay.example/").unwrap();
        assert_eq!(gga.authority, "relay.example:80");
        assert!(gga.path.starts_with("/MOUNT/gga?host=caster.example"));
    }

    #[test]
    fn relay_url_without_path_is_rejected() {
        let err = HttpTarget::proxy(&config(), "mailto:relay@example.com").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: `mailto:relay@example.com` cannot carry a path"
        );
    }

    #[test]
    fn https_is_rejected() {
        let err = HttpTarget::proxy(&config(), "https://relay.example/").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn post_request_carries_sentence() {
        let target = HttpTarget::direct(&config()).unwrap();
        let request = target.post_request("x", "$GPGGA*00\r\n");
        assert!(request.starts_with("POST /MOUNT HTTP/1.1\r\n"));
        assert!(request.contains("Content-Type: text/plain\r\nContent-Length: 11\r\n"));
        assert!(request.ends_with("\r\n\r\n$GPGGA*00\r\n"));
    }

    #[test]
    fn status_lines() {
        assert!(check_status("ICY 200 OK").is_ok());
        assert!(check_status("HTTP/1.1 200 OK\r\n").is_ok());
        assert!(check_status("HTTP/1.0 204 No Content").is_ok());
        assert!(check_status("SOURCETABLE 200 OK").is_ok());
        match check_status("HTTP/1.1 401 Unauthorized") {
            Err(NtripError::Http { status, line }) => {
                assert_eq!(status, 401);
                assert_eq!(line, "HTTP/1.1 401 Unauthorized");
            },
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            check_status("garbage"),
            Err(NtripError::Http { status: 0, .. })
        ));
    }

    #[tokio::test]
    async fn head_with_headers() {
        let mut response: &[u8] = b"HTTP/1.1 200 OK\r\n\
            Content-Type: gnss/data\r\n\
            Transfer-Encoding: chunked\r\n\r\n\
            5\r\nhello";
        let (head, rest) = read_head(&mut response).await.unwrap();
        assert_eq!(head.status_line, "HTTP/1.1 200 OK");
        assert_eq!(head.header("content-type"), Some("gnss/data"));
        assert!(head.is_chunked());
        assert_eq!(rest, b"5\r\nhello");
    }

    #[tokio::test]
    async fn icy_straight_into_data() {
        let mut response: &[u8] = b"ICY 200 OK\r\n\xd3\x00\x03";
        let (head, rest) = read_head(&mut response).await.unwrap();
        assert_eq!(head.status_line, "ICY 200 OK");
        assert_eq!(rest, vec![0xd3, 0x00, 0x03]);
    }

    #[tokio::test]
    async fn rejected_status() {
        let mut response: &[u8] = b"HTTP/1.1 404 Not Found\r\n\r\n";
        assert!(matches!(
            read_head(&mut response).await,
            Err(NtripError::Http { status: 404, .. })
        ));
        let mut truncated: &[u8] = b"ICY 2";
        assert!(matches!(
            read_head(&mut truncated).await,
            Err(NtripError::StreamEnded)
        ));
    }

    #[test]
    fn chunked_across_reads() {
        let mut decoder = ChunkedDecoder::default();
        let mut out = Vec::new();
        for piece in [&b"4\r\nab"[..], b"cd\r", b"\n3;ext=1\r\nxyz\r\n", b"0\r\n\r\n"] {
            decoder.decode(piece, &mut out).unwrap();
        }
        assert_eq!(out, b"abcdxyz");
        assert!(decoder.is_done());
    }

    #[test]
    fn chunked_rejects_garbage() {
        let mut decoder = ChunkedDecoder::default();
        let mut out = Vec::new();
        assert!(decoder.decode(b"zz\r\n", &mut out).is_err());
    }
}
