//! sofaline-couchdb — CouchDB request builders over the sofaline
//! transport.
//!
//! [`Couch`] points at a server and [`Database`] scopes requests to one
//! database. Every builder hands back a plain [`Transfer`] ready to run:
//! push it through a [`Session`](sofaline_http::Session) to multiplex
//! many exchanges on one thread, or through [`perform`] for the one-shot
//! blocking path. Database and document names are percent-encoded into
//! the URL, so names carrying `/` or spaces are safe.
//!
//! ```rust,no_run
//! use sofaline_couchdb::{Couch, json_body, perform};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let couch = Couch::new("http://127.0.0.1:5984");
//!     let albums = couch.database("albums");
//!
//!     let mut create = albums.create();
//!     perform(&mut create);
//!
//!     let mut put = albums.put("gold", &serde_json::json!({ "artist": "ABBA" }))?;
//!     perform(&mut put);
//!     println!("stored: {}", json_body(&put)?);
//!     Ok(())
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Serialize;

pub(crate) mod mime;

pub mod error;

/// Errors from the helpers that interpret a finished exchange.
pub use error::Error;

// Transport types that appear in this crate's signatures.
pub use sofaline_http::{Method, Transfer, TransferResult, perform, perform_with};

// ── Server handle ───────────────────────────────────────────────────────

/// Handle on one CouchDB server.
///
/// Holds the base URL and, optionally, credentials that every request
/// built from this handle will carry as preemptive basic auth.
#[derive(Debug, Clone)]
pub struct Couch {
    base: String,
    auth: Option<(String, String)>,
}

impl Couch {
    /// Point at a server, e.g. `http://127.0.0.1:5984`. A trailing slash
    /// on the base URL is dropped.
    pub fn new(base: impl Into<String>) -> Couch {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Couch { base, auth: None }
    }

    /// Same as [`new`](Couch::new), with basic-auth credentials attached
    /// to every request.
    pub fn with_auth(
        base: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Couch {
        let mut couch = Couch::new(base);
        couch.auth = Some((user.into(), password.into()));
        couch
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `GET /_all_dbs`: list every database on the server.
    pub fn all_dbs(&self) -> Transfer {
        self.transfer(Method::Get, &["_all_dbs"])
    }

    /// Scope requests to one database. Nothing is sent; the database
    /// does not have to exist yet.
    pub fn database(&self, name: &str) -> Database<'_> {
        Database {
            couch: self,
            name: name.to_string(),
        }
    }

    /// Build a transfer for `{base}/{segments...}`, percent-encoding
    /// each path segment so `/` in a name stays inside its segment.
    fn transfer(&self, method: Method, segments: &[&str]) -> Transfer {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        let mut t = Transfer::new(method, url);
        if let Some((user, password)) = &self.auth {
            t = t.userpwd(user.as_str(), password.as_str());
        }
        t
    }
}

// ── Database handle ─────────────────────────────────────────────────────

/// Request builders scoped to one database.
///
/// Built by [`Couch::database`]; borrows the server handle so the same
/// base URL and credentials flow into every request.
#[derive(Debug)]
pub struct Database<'a> {
    couch: &'a Couch,
    name: String,
}

impl Database<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Database operations ─────────────────────────────────────────────

    /// `PUT /{db}`: create the database.
    pub fn create(&self) -> Transfer {
        self.couch.transfer(Method::Put, &[self.name.as_str()])
    }

    /// `DELETE /{db}`: drop the database and everything in it.
    pub fn delete(&self) -> Transfer {
        self.couch.transfer(Method::Delete, &[self.name.as_str()])
    }

    /// `GET /{db}`: database metadata (document count, update seq, ...).
    pub fn info(&self) -> Transfer {
        self.couch.transfer(Method::Get, &[self.name.as_str()])
    }

    /// `GET /{db}/_changes` with the given query parameters, e.g.
    /// `[("since", "5"), ("feed", "longpoll")]`.
    pub fn changes(&self, params: &[(&str, &str)]) -> Transfer {
        let mut t = self
            .couch
            .transfer(Method::Get, &[self.name.as_str(), "_changes"]);
        for (key, value) in params {
            t = t.query(key, value);
        }
        t
    }

    /// `GET /{db}/_revs_limit`: how many revisions the database keeps.
    pub fn revs_limit(&self) -> Transfer {
        self.couch
            .transfer(Method::Get, &[self.name.as_str(), "_revs_limit"])
    }

    /// `PUT /{db}/_revs_limit`: set the revision depth. The body is the
    /// bare number.
    pub fn set_revs_limit(&self, limit: u32) -> Transfer {
        self.couch
            .transfer(Method::Put, &[self.name.as_str(), "_revs_limit"])
            .body(limit.to_string())
    }

    /// `POST /{db}/_compact`: start compaction. Returns immediately on
    /// the server side; poll [`info`](Database::info) to watch progress.
    pub fn compact(&self) -> Transfer {
        self.couch
            .transfer(Method::Post, &[self.name.as_str(), "_compact"])
            .header("content-type", "application/json")
            .body("{}")
    }

    /// `GET /{db}/_all_docs`: every document, keyed by id.
    pub fn all_docs(&self) -> Transfer {
        self.couch
            .transfer(Method::Get, &[self.name.as_str(), "_all_docs"])
    }

    /// `GET /{db}/_all_docs_by_seq`: every document in update order.
    pub fn all_docs_by_seq(&self) -> Transfer {
        self.couch
            .transfer(Method::Get, &[self.name.as_str(), "_all_docs_by_seq"])
    }

    // ── Documents ───────────────────────────────────────────────────────

    /// `GET /{db}/{id}`: the current revision of a document.
    pub fn get(&self, id: &str) -> Transfer {
        self.couch.transfer(Method::Get, &[self.name.as_str(), id])
    }

    /// `GET /{db}/{id}?rev=...`: one specific revision.
    pub fn get_rev(&self, id: &str, rev: &str) -> Transfer {
        self.get(id).query("rev", rev)
    }

    /// `GET /{db}/{id}?revs=true`: the document with its revision
    /// history inlined.
    pub fn revisions(&self, id: &str) -> Transfer {
        self.get(id).query("revs", "true")
    }

    /// `HEAD /{db}/{id}`: headers only. The `etag` header carries the
    /// current revision, quoted.
    pub fn head(&self, id: &str) -> Transfer {
        self.couch.transfer(Method::Head, &[self.name.as_str(), id])
    }

    /// `PUT /{db}/{id}`: store `doc` under a chosen id, serialized as
    /// JSON. Updating an existing document requires a `_rev` field in
    /// `doc` naming the revision being replaced.
    pub fn put(&self, id: &str, doc: &impl Serialize) -> Result<Transfer, Error> {
        let body = serde_json::to_vec(doc)?;
        Ok(self
            .couch
            .transfer(Method::Put, &[self.name.as_str(), id])
            .header("content-type", "application/json")
            .body(body))
    }

    /// `POST /{db}`: store `doc` under a server-assigned id.
    pub fn post(&self, doc: &impl Serialize) -> Result<Transfer, Error> {
        let body = serde_json::to_vec(doc)?;
        Ok(self
            .couch
            .transfer(Method::Post, &[self.name.as_str()])
            .header("content-type", "application/json")
            .body(body))
    }

    /// `COPY /{db}/{id}` with a `destination` header: duplicate a
    /// document server-side. Pass `rev` to overwrite an existing
    /// destination document at that revision.
    pub fn copy(&self, id: &str, destination: &str, rev: Option<&str>) -> Transfer {
        let target = match rev {
            Some(rev) => format!("{destination}?rev={rev}"),
            None => destination.to_string(),
        };
        self.couch
            .transfer(Method::Copy, &[self.name.as_str(), id])
            .header("destination", target)
    }

    /// `DELETE /{db}/{id}?rev=...`: delete the revision `rev`.
    pub fn remove(&self, id: &str, rev: &str) -> Transfer {
        self.couch
            .transfer(Method::Delete, &[self.name.as_str(), id])
            .query("rev", rev)
    }

    // ── Attachments ─────────────────────────────────────────────────────

    /// `GET /{db}/{id}/{name}`: fetch an attachment's bytes.
    pub fn attachment(&self, id: &str, name: &str) -> Transfer {
        self.couch
            .transfer(Method::Get, &[self.name.as_str(), id, name])
    }

    /// `PUT /{db}/{id}/{file name}`: upload a file as an attachment,
    /// named after the file and typed by its extension. Attaching to an
    /// existing document requires a `rev` query parameter; add it with
    /// [`Transfer::query`].
    pub fn put_attachment(&self, id: &str, path: impl AsRef<Path>) -> Result<Transfer, Error> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::BadAttachmentPath(path.display().to_string()))?;
        let data = fs::read(path)?;
        Ok(self
            .couch
            .transfer(Method::Put, &[self.name.as_str(), id, name])
            .header("content-type", mime::content_type_for(name))
            .body(data))
    }

    // ── Blocking helpers ────────────────────────────────────────────────

    /// Fetch the current revision of a document with a blocking `HEAD`
    /// exchange, ready to feed into [`remove`](Database::remove) or a
    /// `_rev` field.
    pub fn current_revision(&self, id: &str) -> Result<String, Error> {
        let mut head = self.head(id);
        perform(&mut head);
        if !head.result().is_ok() {
            return Err(Error::Transfer(head.result()));
        }
        if !(200..300).contains(&head.status()) {
            return Err(Error::Status(head.status()));
        }
        let etag = head
            .response_header("etag")
            .ok_or(Error::MissingHeader("etag"))?;
        // The revision is the quoted span of the etag.
        let rev = match (etag.find('"'), etag.rfind('"')) {
            (Some(open), Some(close)) if close > open => &etag[open + 1..close],
            _ => etag,
        };
        Ok(rev.to_string())
    }
}

// ── Response helpers ────────────────────────────────────────────────────

/// Parse a finished exchange's body as JSON.
///
/// Fails if the exchange never completed or the body is not JSON. An
/// HTTP error status still parses: CouchDB describes its errors as JSON
/// bodies, so `{"error": ..., "reason": ...}` comes back as a value.
pub fn json_body(t: &Transfer) -> Result<serde_json::Value, Error> {
    if !t.result().is_ok() {
        return Err(Error::Transfer(t.result()));
    }
    Ok(serde_json::from_slice(t.response_body())?)
}
