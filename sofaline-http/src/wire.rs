//! HTTP/1.1 wire format: request serialization and incremental response
//! parsing, shared by the non-blocking and blocking paths.

use bytes::{Buf, BytesMut};

use crate::transfer::{Method, Transfer, TransferResult};

/// Cap on the response head (and on the trailer section of a chunked
/// body). Anything larger fails the exchange as malformed.
const MAX_HEAD_BYTES: usize = 64 * 1024;
/// Cap on a single chunk, size line included. Chunks are buffered whole
/// before being copied out, so this bounds decoder memory.
const MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

// ── URL splitting ───────────────────────────────────────────────────────

/// The pieces of a URL the transport needs: where to connect and what to
/// put on the request line.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    /// Host for resolution, IPv6 brackets stripped.
    pub(crate) lookup_host: String,
    pub(crate) port: u16,
    /// `host[:port]` for the `host` header, brackets kept, port omitted
    /// when it is the default.
    pub(crate) host_header: String,
    /// Request target: path plus query, never empty.
    pub(crate) target: String,
}

pub(crate) fn split_url(raw: &str) -> Result<Endpoint, (TransferResult, String)> {
    let url = url::Url::parse(raw).map_err(|e| (TransferResult::BadUrl, e.to_string()))?;
    match url.scheme() {
        "http" => {}
        other => {
            return Err((
                TransferResult::UnsupportedScheme,
                format!("scheme {other:?} is not supported"),
            ));
        }
    }
    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => return Err((TransferResult::BadUrl, "URL has no host".to_string())),
    };
    let port = url.port().unwrap_or(80);
    let host_header = if port == 80 {
        host.to_string()
    } else {
        format!("{host}:{port}")
    };
    let lookup_host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    Ok(Endpoint {
        lookup_host,
        port,
        host_header,
        target,
    })
}

// ── Request serialization ───────────────────────────────────────────────

/// Serialize the request head (and nothing of the body) into `out`.
///
/// Built-in headers are suppressed one-by-one when the transfer carries
/// a custom header of the same name. `content-length` is always present
/// for PUT and POST, zero-length bodies included, so the server never
/// waits for framing that is not coming.
pub(crate) fn write_request_head(
    out: &mut Vec<u8>,
    t: &Transfer,
    endpoint: &Endpoint,
    user_agent: &str,
) {
    use base64::Engine as _;

    let has = |name: &str| t.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name));

    out.extend_from_slice(t.method.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(endpoint.target.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\n");

    if !has("host") {
        out.extend_from_slice(b"host: ");
        out.extend_from_slice(endpoint.host_header.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if !has("user-agent") {
        out.extend_from_slice(b"user-agent: ");
        out.extend_from_slice(user_agent.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if !has("connection") {
        out.extend_from_slice(b"connection: close\r\n");
    }
    let needs_length =
        matches!(t.method, Method::Put | Method::Post) || !t.body_out.is_empty();
    if needs_length && !has("content-length") {
        out.extend_from_slice(b"content-length: ");
        out.extend_from_slice(t.body_out.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if let Some(userpwd) = &t.userpwd
        && !has("authorization")
    {
        out.extend_from_slice(b"authorization: Basic ");
        out.extend_from_slice(
            base64::engine::general_purpose::STANDARD
                .encode(userpwd)
                .as_bytes(),
        );
        out.extend_from_slice(b"\r\n");
    }
    for (name, value) in &t.headers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

// ── Response head ───────────────────────────────────────────────────────

struct ParsedHead {
    status: u16,
    headers: Vec<(String, String)>,
    content_length: Option<u64>,
    chunked: bool,
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(3)).find(|&i| {
        data[i] == b'\r' && data[i + 1] == b'\n' && data[i + 2] == b'\r' && data[i + 3] == b'\n'
    })
}

/// Parse a response head (everything before `\r\n\r\n`).
fn parse_head(data: &[u8]) -> Option<ParsedHead> {
    let text = std::str::from_utf8(data).ok()?;
    let mut lines = text.split("\r\n");

    // Status line: HTTP/1.1 200 OK
    let status_line = lines.next()?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let status: u16 = parts.next()?.parse().ok()?;
    if !(100..=999).contains(&status) {
        return None;
    }

    let mut headers = Vec::new();
    let mut content_length = None;
    let mut chunked = false;

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_string();
            let value = value.trim().to_string();

            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().ok();
            }
            if name.eq_ignore_ascii_case("transfer-encoding")
                && value.eq_ignore_ascii_case("chunked")
            {
                chunked = true;
            }

            headers.push((name, value));
        }
    }

    Some(ParsedHead {
        status,
        headers,
        content_length,
        chunked,
    })
}

// ── Chunked bodies ──────────────────────────────────────────────────────

enum ChunkResult<'a> {
    Complete {
        data: &'a [u8],
        consumed: usize,
        is_last: bool,
    },
    NeedMore,
    Bad(&'static str),
}

/// Decode one chunk from chunked transfer encoding.
fn decode_chunk(data: &[u8]) -> ChunkResult<'_> {
    // Chunk size line: <hex>[;extensions]\r\n
    let crlf = match find_crlf(data) {
        Some(pos) => pos,
        None => return ChunkResult::NeedMore,
    };
    let size_str = match std::str::from_utf8(&data[..crlf]) {
        Ok(s) => s.trim(),
        Err(_) => return ChunkResult::Bad("chunk size line is not text"),
    };
    let size_hex = size_str.split(';').next().unwrap_or("").trim();
    let size = match u64::from_str_radix(size_hex, 16) {
        Ok(s) => s,
        Err(_) => return ChunkResult::Bad("chunk size is not hex"),
    };
    if size > MAX_CHUNK_BYTES as u64 {
        return ChunkResult::Bad("chunk exceeds decoder limit");
    }
    let size = size as usize;

    if size == 0 {
        // Last chunk; trailers follow.
        return ChunkResult::Complete {
            data: &[],
            consumed: crlf + 2,
            is_last: true,
        };
    }

    let chunk_start = crlf + 2;
    let chunk_end = chunk_start + size;
    let total = chunk_end + 2; // trailing \r\n

    if data.len() < total {
        return ChunkResult::NeedMore;
    }
    if &data[chunk_end..total] != b"\r\n" {
        return ChunkResult::Bad("chunk data not terminated by CRLF");
    }

    ChunkResult::Complete {
        data: &data[chunk_start..chunk_end],
        consumed: total,
        is_last: false,
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(1)).find(|&i| data[i] == b'\r' && data[i + 1] == b'\n')
}

// ── Incremental response parser ─────────────────────────────────────────

/// How the response body ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    /// No body follows the head (HEAD request, 204, 304).
    None,
    /// `content-length` bytes.
    Length(u64),
    /// Chunked transfer encoding.
    Chunked,
    /// Body runs until the peer closes.
    Eof,
}

/// Incremental response parser: feed it socket reads as they arrive, in
/// any fragmentation. Status, headers, and decoded body land directly on
/// the transfer.
pub(crate) struct ResponseParser {
    buf: BytesMut,
    framing: Option<BodyFraming>,
    body_left: u64,
    in_trailers: bool,
    head_request: bool,
    done: bool,
}

impl ResponseParser {
    pub(crate) fn new(head_request: bool) -> ResponseParser {
        ResponseParser {
            buf: BytesMut::new(),
            framing: None,
            body_left: 0,
            in_trailers: false,
            head_request,
            done: false,
        }
    }

    /// Consume one socket read. Returns `Ok(true)` once the response is
    /// complete; a parse failure is terminal and maps to
    /// [`TransferResult::BadResponse`].
    pub(crate) fn feed(&mut self, data: &[u8], t: &mut Transfer) -> Result<bool, &'static str> {
        self.buf.extend_from_slice(data);
        loop {
            if self.done {
                // connection: close — anything past the body is junk.
                self.buf.clear();
                return Ok(true);
            }
            let Some(framing) = self.framing else {
                let Some(end) = find_head_end(&self.buf) else {
                    if self.buf.len() > MAX_HEAD_BYTES {
                        return Err("response head exceeds limit");
                    }
                    return Ok(false);
                };
                let head = parse_head(&self.buf[..end]).ok_or("malformed response head")?;
                self.buf.advance(end + 4);
                if (100..200).contains(&head.status) && head.status != 101 {
                    // Interim response; the real head follows.
                    continue;
                }
                t.status = head.status;
                t.resp_headers = head.headers;
                self.framing = Some(if self.head_request || head.status == 204 || head.status == 304 {
                    BodyFraming::None
                } else if head.chunked {
                    BodyFraming::Chunked
                } else if let Some(n) = head.content_length {
                    self.body_left = n;
                    BodyFraming::Length(n)
                } else {
                    BodyFraming::Eof
                });
                continue;
            };
            match framing {
                BodyFraming::None => {
                    self.done = true;
                }
                BodyFraming::Length(_) => {
                    let take = (self.body_left.min(self.buf.len() as u64)) as usize;
                    if take > 0 {
                        t.body_in.extend_from_slice(&self.buf.split_to(take));
                        self.body_left -= take as u64;
                    }
                    if self.body_left == 0 {
                        self.done = true;
                    } else {
                        return Ok(false);
                    }
                }
                BodyFraming::Eof => {
                    if !self.buf.is_empty() {
                        let all = self.buf.len();
                        t.body_in.extend_from_slice(&self.buf.split_to(all));
                    }
                    // Only the peer closing finishes this framing.
                    return Ok(false);
                }
                BodyFraming::Chunked => {
                    if self.in_trailers {
                        match find_crlf(&self.buf) {
                            None => {
                                if self.buf.len() > MAX_HEAD_BYTES {
                                    return Err("trailer section exceeds limit");
                                }
                                return Ok(false);
                            }
                            Some(0) => {
                                self.buf.advance(2);
                                self.done = true;
                            }
                            Some(pos) => {
                                // Trailer headers are not recorded.
                                self.buf.advance(pos + 2);
                            }
                        }
                    } else {
                        match decode_chunk(&self.buf) {
                            ChunkResult::NeedMore => {
                                if self.buf.len() > MAX_CHUNK_BYTES + MAX_HEAD_BYTES {
                                    return Err("chunk exceeds decoder limit");
                                }
                                return Ok(false);
                            }
                            ChunkResult::Bad(msg) => return Err(msg),
                            ChunkResult::Complete {
                                data,
                                consumed,
                                is_last,
                            } => {
                                t.body_in.extend_from_slice(data);
                                self.buf.advance(consumed);
                                if is_last {
                                    self.in_trailers = true;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// The peer closed the connection. Either that legitimately ends an
    /// EOF-framed body, or the response was cut short.
    pub(crate) fn finish_eof(&mut self) -> Result<(), (TransferResult, String)> {
        if self.done {
            return Ok(());
        }
        match self.framing {
            None => Err((
                TransferResult::RecvFailed,
                "connection closed before the response head".to_string(),
            )),
            Some(BodyFraming::Eof) => {
                self.done = true;
                Ok(())
            }
            Some(BodyFraming::Length(_)) => Err((
                TransferResult::RecvFailed,
                format!(
                    "connection closed with {} body bytes missing",
                    self.body_left
                ),
            )),
            Some(BodyFraming::Chunked) => Err((
                TransferResult::RecvFailed,
                "connection closed mid-chunk".to_string(),
            )),
            Some(BodyFraming::None) => {
                // Unreachable in practice: None framing is marked done in
                // the same feed that parses the head.
                self.done = true;
                Ok(())
            }
        }
    }
}
