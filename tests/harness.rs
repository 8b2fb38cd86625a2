//! Discovery and harness against an in-process HTTP listing.

mod common;

use devtools_harness::{Error, Harness};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use common::{MockTarget, init_tracing, test_options};

/// Serves `/json/list` and `/json/version` with fixed bodies.
async fn spawn_listing(targets: Value) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let targets = targets.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                }

                let head = String::from_utf8_lossy(&buf[..read]);
                let path = head.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match path {
                    "/json/list" => ("200 OK", targets.to_string()),
                    "/json/version" => (
                        "200 OK",
                        json!({ "Browser": "Chrome/126.0.0.0", "Protocol-Version": "1.3" }).to_string(),
                    ),
                    _ => ("404 Not Found", String::new()),
                };

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    port
}

#[tokio::test]
async fn connect_page_attaches_to_matching_target() -> anyhow::Result<()> {
    init_tracing();
    let target = MockTarget::bind().await;
    let ws_url = target.url().to_string();

    let port = spawn_listing(json!([
        { "id": "BG", "type": "service_worker", "title": "bg", "url": "chrome-extension://ext/bg.js", "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/page/BG" },
        { "id": "MOCK", "type": "page", "title": "Fixture", "url": "http://localhost:8000/fixtures/scroll.html", "webSocketDebuggerUrl": ws_url }
    ]))
    .await;

    let harness = Harness::builder().port(port).options(test_options()).build()?;

    let version = harness.discovery().version().await?;
    assert_eq!(version.browser, "Chrome/126.0.0.0");

    let (session, mut peer) = tokio::join!(harness.connect_page("fixtures/scroll"), target.accept());
    let session = session?;
    assert_eq!(session.target_id().as_str(), "MOCK");
    assert_eq!(harness.session_count(), 1);

    let focus = tokio::spawn({
        let session = session.clone();
        async move { session.bring_to_front().await }
    });
    let request = peer.next_request().await;
    assert_eq!(request["method"], "Page.bringToFront");
    peer.respond(&request["id"], json!({})).await;
    tokio_test::assert_ok!(focus.await?);

    harness.close();
    assert!(session.is_closed());
    assert_eq!(harness.session_count(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_targets_are_reported() {
    init_tracing();
    let port = spawn_listing(json!([
        { "id": "P", "type": "page", "url": "chrome://newtab/", "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/page/P" }
    ]))
    .await;

    let harness = Harness::builder().port(port).extension_id("ext").build().unwrap();

    let err = tokio_test::assert_err!(harness.connect_background().await);
    assert!(matches!(err, Error::TargetNotFound { .. }));

    let err = tokio_test::assert_err!(harness.connect_page("fixtures").await);
    assert!(matches!(err, Error::TargetNotFound { .. }));
}
