use sofaline_couchdb::{Couch, json_body, perform};
use sofaline_http::{CompletionSink, Config, Transfer, new_session};

fn main() {
    let base = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:5984".to_string());

    let couch = Couch::new(&base);
    let db = couch.database("sofaline-demo");

    let mut create = db.create();
    perform(&mut create);
    eprintln!(
        "create {}: {} {:?}",
        db.name(),
        create.status(),
        create.result()
    );

    // Store a few documents concurrently through one session.
    let sink: CompletionSink<Transfer> = Box::new(|t: Transfer| {
        eprintln!(
            "{} {} -> {:?} {}",
            t.method().as_str(),
            t.url(),
            t.result(),
            t.status()
        );
    });
    let mut session =
        new_session(Config::default(), Some(sink)).expect("failed to set up session");
    for (id, artist) in [("gold", "ABBA"), ("parklife", "Blur"), ("pablo", "2Pac")] {
        let put = db
            .put(id, &serde_json::json!({ "artist": artist }))
            .expect("failed to encode document");
        session.submit(put).expect("failed to submit");
    }
    session.run().expect("session failed");

    let mut all = db.all_docs();
    perform(&mut all);
    match json_body(&all) {
        Ok(listing) => eprintln!("all_docs: {} rows", listing["total_rows"]),
        Err(e) => eprintln!("all_docs failed: {e}"),
    }

    let rev = db.current_revision("gold").expect("failed to read revision");
    let mut remove = db.remove("gold", &rev);
    perform(&mut remove);
    eprintln!("removed gold at {rev}: {}", remove.status());

    let mut drop_db = db.delete();
    perform(&mut drop_db);
    eprintln!("delete {}: {}", db.name(), drop_db.status());
}
