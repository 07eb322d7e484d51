//! Integration tests for the blocking single-exchange path.

use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sofaline_http::{Config, Method, Transfer, TransferResult, perform, perform_with};
use tiny_http::{Response, Server};

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

#[test]
fn get_round_trip() {
    let (addr, handle) = serve_once(|request| {
        assert_eq!(request.method().as_str(), "GET");
        assert_eq!(request.url(), "/db/doc");
        let ua = request
            .headers()
            .iter()
            .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("user-agent"))
            .map(|h| h.value.as_str().to_string());
        assert!(
            ua.as_deref().is_some_and(|ua| ua.starts_with("sofaline-http/")),
            "unexpected user-agent: {ua:?}"
        );
        request
            .respond(Response::from_string("{\"_id\":\"doc\"}"))
            .unwrap();
    });

    let mut t = Transfer::new(Method::Get, format!("http://{addr}/db/doc"));
    perform(&mut t);
    handle.join().unwrap();

    assert_eq!(t.result(), TransferResult::Ok, "{:?}", t.error_detail());
    assert_eq!(t.status(), 200);
    assert_eq!(t.response_body(), b"{\"_id\":\"doc\"}");
}

#[test]
fn connect_refused_fails_fast() {
    // Bind then drop: nothing listens on the port any more.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let mut t = Transfer::new(Method::Get, format!("http://{addr}/"));
    let start = Instant::now();
    perform(&mut t);

    assert_eq!(t.result(), TransferResult::ConnectFailed);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn descriptor_reuse_after_clear_data() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let mut body = Vec::new();
        request.as_reader().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"one");
        request.respond(Response::from_string("first")).unwrap();

        let mut request = server.recv().unwrap();
        let mut body = Vec::new();
        request.as_reader().read_to_end(&mut body).unwrap();
        assert!(body.is_empty(), "cleared body resent: {body:?}");
        request.respond(Response::from_string("second")).unwrap();
    });

    let mut t = Transfer::new(Method::Put, format!("http://{addr}/db/doc")).body("one");
    perform(&mut t);
    assert_eq!(t.response_body(), b"first");

    t.clear_data();
    perform(&mut t);
    handle.join().unwrap();

    assert_eq!(t.result(), TransferResult::Ok, "{:?}", t.error_detail());
    assert_eq!(t.response_body(), b"second", "stale response survived the retry");
}

#[test]
fn slow_response_hits_the_transfer_budget() {
    let (addr, handle) = serve_once(|request| {
        thread::sleep(Duration::from_millis(800));
        // The client is long gone; the send may fail.
        let _ = request.respond(Response::from_string("late"));
    });

    let config = Config {
        connect_timeout: Duration::from_millis(200),
        transfer_timeout: Duration::from_millis(300),
        ..Config::default()
    };
    let mut t = Transfer::new(Method::Get, format!("http://{addr}/slow"));
    let start = Instant::now();
    perform_with(&mut t, &config).unwrap();
    let elapsed = start.elapsed();
    handle.join().unwrap();

    assert_eq!(t.result(), TransferResult::TimedOut);
    assert!(
        elapsed >= Duration::from_millis(280) && elapsed < Duration::from_millis(800),
        "budget enforced after {elapsed:?}"
    );
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = Config {
        connect_timeout: Duration::ZERO,
        ..Config::default()
    };
    let mut t = Transfer::new(Method::Get, "http://127.0.0.1:1/");
    assert!(perform_with(&mut t, &config).is_err());
    // The exchange itself never ran.
    assert_eq!(t.result(), TransferResult::Pending);
}
