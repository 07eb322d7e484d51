//! Integration tests: exchanges against real sockets on localhost.
//!
//! Each test stands up one or more `tiny_http` servers (or a silent raw
//! listener), drives a session to completion, and asserts on what the
//! sink received. Server-side request assertions run on the server
//! thread and surface through `join`.

use std::cell::RefCell;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener};
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sofaline_http::{
    CompletionSink, Config, EventLoop, Method, Multi, Resolver, Session, Transfer,
    TransferResult, new_session,
};
use tiny_http::{Response, Server};

// ── Helpers ─────────────────────────────────────────────────────────────

/// Serve exactly one request with `respond`, then exit the thread.
fn serve_once<F>(respond: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(tiny_http::Request) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let request = server.recv().unwrap();
        respond(request);
    });
    (addr, handle)
}

fn collecting_session(config: Config) -> (Session<Multi>, Rc<RefCell<Vec<Transfer>>>) {
    let done: Rc<RefCell<Vec<Transfer>>> = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&done);
    let sink: CompletionSink<Transfer> = Box::new(move |t| log.borrow_mut().push(t));
    let session = new_session(config, Some(sink)).unwrap();
    (session, done)
}

fn header(request: &tiny_http::Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str().to_string())
}

// ── Concurrent exchanges ────────────────────────────────────────────────

#[test]
fn three_exchanges_three_completions() {
    let mut handles = Vec::new();
    let mut urls = Vec::new();
    for body in ["alpha", "beta", "gamma"] {
        let (addr, handle) = serve_once(move |request| {
            request.respond(Response::from_string(body)).unwrap();
        });
        urls.push((format!("http://{addr}/{body}"), body));
        handles.push(handle);
    }

    let (mut session, done) = collecting_session(Config::default());
    for (url, _) in &urls {
        session
            .submit(Transfer::new(Method::Get, url.clone()))
            .unwrap();
    }
    session.run().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    let done = done.borrow();
    assert_eq!(done.len(), 3);
    for t in done.iter() {
        assert_eq!(t.result(), TransferResult::Ok, "{}: {:?}", t.url(), t.error_detail());
        assert_eq!(t.status(), 200);
        let expected = urls.iter().find(|(u, _)| u.as_str() == t.url()).unwrap().1;
        assert_eq!(t.response_body(), expected.as_bytes());
    }
}

#[test]
fn post_body_and_chunked_response() {
    let (addr, handle) = serve_once(|mut request| {
        assert_eq!(request.method().as_str(), "POST");
        assert_eq!(request.url(), "/db");
        assert_eq!(
            header(&request, "content-type").as_deref(),
            Some("application/json")
        );
        assert_eq!(header(&request, "user-agent").as_deref(), Some("sofaline-test/1"));
        assert_eq!(header(&request, "content-length").as_deref(), Some("9"));
        let mut body = Vec::new();
        request.as_reader().read_to_end(&mut body).unwrap();
        assert_eq!(body, br#"{"doc":1}"#);
        request
            .respond(Response::from_string("{\"ok\":true}").with_chunked_threshold(1))
            .unwrap();
    });

    let config = Config {
        user_agent: "sofaline-test/1".into(),
        ..Config::default()
    };
    let (mut session, done) = collecting_session(config);
    session
        .submit(
            Transfer::new(Method::Post, format!("http://{addr}/db"))
                .header("Content-Type", "application/json")
                .body(r#"{"doc":1}"#),
        )
        .unwrap();
    session.run().unwrap();
    handle.join().unwrap();

    let done = done.borrow();
    assert_eq!(done.len(), 1);
    let t = &done[0];
    assert_eq!(t.result(), TransferResult::Ok, "{:?}", t.error_detail());
    assert_eq!(t.status(), 200);
    assert_eq!(t.response_body(), b"{\"ok\":true}");
}

#[test]
fn head_exchange_exposes_headers_without_a_body() {
    let (addr, handle) = serve_once(|request| {
        let response = Response::empty(200).with_header(
            tiny_http::Header::from_bytes(&b"ETag"[..], &b"\"3-deadbeef\""[..]).unwrap(),
        );
        request.respond(response).unwrap();
    });

    let (mut session, done) = collecting_session(Config::default());
    session
        .submit(Transfer::new(Method::Head, format!("http://{addr}/db/doc")))
        .unwrap();
    session.run().unwrap();
    handle.join().unwrap();

    let done = done.borrow();
    let t = &done[0];
    assert_eq!(t.result(), TransferResult::Ok, "{:?}", t.error_detail());
    assert_eq!(t.response_header("etag"), Some("\"3-deadbeef\""));
    assert!(t.response_body().is_empty());
}

// ── Setup failures ──────────────────────────────────────────────────────

#[test]
fn bad_urls_complete_without_io() {
    let (mut session, done) = collecting_session(Config::default());
    session
        .submit(Transfer::new(Method::Get, "http://"))
        .unwrap();
    session
        .submit(Transfer::new(Method::Get, "https://secure.example/db"))
        .unwrap();
    session.run().unwrap();

    let done = done.borrow();
    assert_eq!(done.len(), 2);
    assert_eq!(done[0].result(), TransferResult::BadUrl);
    assert_eq!(done[1].result(), TransferResult::UnsupportedScheme);
}

#[test]
fn failing_resolver_fails_the_exchange() {
    let resolver: Resolver =
        Box::new(|host, _| Err(io::Error::other(format!("no DNS for {host}"))));
    let multi = Multi::with_resolver(Config::default(), resolver).unwrap();
    let mut session = Session::new(EventLoop::new().unwrap(), multi, None);

    session
        .submit(Transfer::new(Method::Get, "http://couch.invalid/_all_dbs"))
        .unwrap();
    session.run().unwrap();

    let t = session.take_finished().unwrap();
    assert_eq!(t.result(), TransferResult::ResolveFailed);
    assert!(t.error_detail().unwrap().contains("couch.invalid"));
}

// ── Timeouts and teardown ───────────────────────────────────────────────

#[test]
fn unreachable_host_times_out_on_the_connect_budget() {
    let config = Config {
        connect_timeout: Duration::from_secs(2),
        transfer_timeout: Duration::from_secs(60),
        ..Config::default()
    };
    let (mut session, done) = collecting_session(config);

    // Non-routable address: the SYN goes nowhere.
    session
        .submit(Transfer::new(Method::Get, "http://10.255.255.1:81/"))
        .unwrap();
    let start = Instant::now();
    session.run().unwrap();
    let elapsed = start.elapsed();

    let done = done.borrow();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].result(), TransferResult::ConnectTimedOut);
    assert!(
        elapsed >= Duration::from_secs(2) && elapsed <= Duration::from_millis(2500),
        "connect timeout fired after {elapsed:?}"
    );
}

#[test]
fn teardown_abandons_in_flight_exchanges() {
    // Connects complete via the backlog, but nobody ever responds.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let (mut session, done) = collecting_session(Config::default());
    session
        .submit(Transfer::new(Method::Get, format!("http://{addr}/one")))
        .unwrap();
    session
        .submit(Transfer::new(Method::Get, format!("http://{addr}/two")))
        .unwrap();
    for _ in 0..3 {
        session.step(Some(Duration::from_millis(50))).unwrap();
    }
    assert_eq!(session.in_flight(), 2);

    session.teardown();
    assert!(done.borrow().is_empty(), "abandoned exchanges must not reach the sink");
}
