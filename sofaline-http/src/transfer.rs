use bytes::{Bytes, BytesMut};

// ── Method ──────────────────────────────────────────────────────────────

/// Request method, including the `COPY` extension method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Head,
    Copy,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Copy => "COPY",
            Method::Delete => "DELETE",
        }
    }
}

// ── Result codes ────────────────────────────────────────────────────────

/// Outcome of one exchange.
///
/// Everything except [`Ok`](TransferResult::Ok) and
/// [`Pending`](TransferResult::Pending) is a transport-level failure;
/// an HTTP error status still counts as `Ok` here, because the exchange
/// itself ran to completion. Failures usually carry a human-readable
/// note in [`Transfer::error_detail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferResult {
    /// Exchange still in flight (or never submitted).
    #[error("exchange still in flight")]
    Pending,
    /// Response received in full.
    #[error("completed")]
    Ok,
    /// URL scheme is not `http`.
    #[error("unsupported URL scheme")]
    UnsupportedScheme,
    /// URL failed to parse or has no host.
    #[error("URL failed to parse")]
    BadUrl,
    /// Host name did not resolve to any address.
    #[error("host resolution failed")]
    ResolveFailed,
    /// TCP connect was refused or errored.
    #[error("connect failed")]
    ConnectFailed,
    /// TCP connect outlived the configured connect timeout.
    #[error("connect timed out")]
    ConnectTimedOut,
    /// Exchange outlived the configured transfer timeout.
    #[error("exchange timed out")]
    TimedOut,
    /// Socket write failed mid-request.
    #[error("send failed")]
    SendFailed,
    /// Socket read failed, or the peer closed before the response ended.
    #[error("receive failed")]
    RecvFailed,
    /// Response head or chunked framing failed to parse.
    #[error("malformed response")]
    BadResponse,
}

impl TransferResult {
    pub fn is_ok(self) -> bool {
        matches!(self, TransferResult::Ok)
    }
}

// ── Transfer ────────────────────────────────────────────────────────────

/// One HTTP exchange: the request to send, and after completion the
/// response received.
///
/// A transfer is built up-front with the consuming setters, submitted to
/// a session (or run through [`perform`](crate::perform)), and handed
/// back with [`status`](Self::status), [`result`](Self::result), headers,
/// and body filled in. The descriptor is reusable: the response side is
/// reset every time an exchange starts.
#[derive(Debug)]
pub struct Transfer {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    /// `user:password`, sent preemptively as basic auth when present.
    pub(crate) userpwd: Option<String>,
    pub(crate) body_out: Vec<u8>,
    /// Bytes of `body_out` already written to the socket.
    pub(crate) sent: usize,
    pub(crate) status: u16,
    pub(crate) resp_headers: Vec<(String, String)>,
    pub(crate) body_in: BytesMut,
    pub(crate) result: TransferResult,
    pub(crate) detail: Option<String>,
}

impl Transfer {
    pub fn new(method: Method, url: impl Into<String>) -> Transfer {
        Transfer {
            method,
            url: url.into(),
            headers: Vec::new(),
            userpwd: None,
            body_out: Vec::new(),
            sent: 0,
            status: 0,
            resp_headers: Vec::new(),
            body_in: BytesMut::new(),
            result: TransferResult::Pending,
            detail: None,
        }
    }

    // ── Request builders ────────────────────────────────────────────────

    /// Add a request header. A header set here suppresses the built-in
    /// header of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Transfer {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Authenticate every request with basic auth, sent preemptively.
    pub fn userpwd(mut self, user: impl Into<String>, password: impl Into<String>) -> Transfer {
        self.userpwd = Some(format!("{}:{}", user.into(), password.into()));
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Transfer {
        self.body_out = body.into();
        self
    }

    /// Append one query parameter, percent-encoded, with the standard
    /// `?`/`&` separators.
    pub fn query(mut self, key: &str, value: &str) -> Transfer {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        self.url.push(sep);
        self.url.push_str(&urlencoding::encode(key));
        self.url.push('=');
        self.url.push_str(&urlencoding::encode(value));
        self
    }

    /// Drop the URL's query string, if any.
    pub fn clear_query(mut self) -> Transfer {
        if let Some(pos) = self.url.find('?') {
            self.url.truncate(pos);
        }
        self
    }

    /// Clear the request body so the descriptor can be reused with new
    /// data. The recorded response is untouched.
    pub fn clear_data(&mut self) {
        self.body_out.clear();
        self.sent = 0;
    }

    // ── Response accessors ──────────────────────────────────────────────

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Response status code; `0` until a status line has been parsed.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn result(&self) -> TransferResult {
        self.result
    }

    /// Note attached to a transport-level failure.
    pub fn error_detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn response_body(&self) -> &[u8] {
        &self.body_in
    }

    /// Take ownership of the response body, leaving the descriptor empty.
    pub fn take_response_body(&mut self) -> Bytes {
        self.body_in.split().freeze()
    }

    /// First response header matching `name`, case-insensitively.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.resp_headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn response_headers(&self) -> &[(String, String)] {
        &self.resp_headers
    }

    // ── Transport hooks ─────────────────────────────────────────────────

    /// Wipe the response side; runs every time an exchange starts, so a
    /// reused descriptor never shows stale data.
    pub(crate) fn reset_response(&mut self) {
        self.sent = 0;
        self.status = 0;
        self.resp_headers.clear();
        self.body_in.clear();
        self.result = TransferResult::Pending;
        self.detail = None;
    }

    pub(crate) fn fail(&mut self, result: TransferResult, detail: impl Into<String>) {
        self.result = result;
        self.detail = Some(detail.into());
    }

    pub(crate) fn unsent_body(&self) -> &[u8] {
        &self.body_out[self.sent.min(self.body_out.len())..]
    }

    pub(crate) fn advance_sent(&mut self, n: usize) {
        self.sent = (self.sent + n).min(self.body_out.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_appends_with_standard_separators() {
        let t = Transfer::new(Method::Get, "http://h/db/_changes")
            .query("since", "5")
            .query("feed", "longpoll");
        assert_eq!(t.url(), "http://h/db/_changes?since=5&feed=longpoll");
    }

    #[test]
    fn query_values_are_percent_encoded() {
        let t = Transfer::new(Method::Get, "http://h/db").query("key", "\"a b\"");
        assert_eq!(t.url(), "http://h/db?key=%22a%20b%22");
    }

    #[test]
    fn clear_query_drops_everything_after_the_marker() {
        let t = Transfer::new(Method::Get, "http://h/db")
            .query("a", "1")
            .clear_query();
        assert_eq!(t.url(), "http://h/db");
    }

    #[test]
    fn clear_data_keeps_the_response() {
        let mut t = Transfer::new(Method::Post, "http://h/db").body("{}");
        t.status = 201;
        t.body_in.extend_from_slice(b"{\"ok\":true}");
        t.clear_data();
        assert!(t.body_out.is_empty());
        assert_eq!(t.status(), 201);
        assert_eq!(t.response_body(), b"{\"ok\":true}");
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let mut t = Transfer::new(Method::Head, "http://h/db/doc");
        t.resp_headers.push(("ETag".into(), "\"1-abc\"".into()));
        assert_eq!(t.response_header("etag"), Some("\"1-abc\""));
        assert_eq!(t.response_header("content-type"), None);
    }

    #[test]
    fn userpwd_joins_with_a_colon() {
        let t = Transfer::new(Method::Get, "http://h/").userpwd("admin", "s3cret");
        assert_eq!(t.userpwd.as_deref(), Some("admin:s3cret"));
    }

    #[test]
    fn sent_cursor_clamps_to_body_length() {
        let mut t = Transfer::new(Method::Put, "http://h/db/doc").body("abcdef");
        t.advance_sent(4);
        assert_eq!(t.unsent_body(), b"ef");
        t.advance_sent(100);
        assert_eq!(t.unsent_body(), b"");
    }
}
