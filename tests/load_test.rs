//! Concurrent load against a real listener.

use std::time::Duration;

use rust_service::lifecycle::Shutdown;

mod common;

use common::Captured;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_are_all_counted() {
    let captured = Captured::new();
    let server = captured.server();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    let total_requests = 100;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{addr}/");

    let mut tasks = Vec::new();
    for _ in 0..total_requests {
        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            client
                .get(&url)
                .send()
                .await
                .map(|res| res.status().as_u16())
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        if let Ok(Ok(200)) = task.await {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, total_requests);

    assert_eq!(captured.requests_total("GET", "/", "200"), total_requests);

    let incoming = captured.records("Incoming HTTP request");
    let completed = captured.records("HTTP request completed");
    assert_eq!(incoming.len() as u64, total_requests);
    assert_eq!(completed.len() as u64, total_requests);
    for record in incoming.iter().chain(completed.iter()) {
        let remote = record["fields"]["remote_addr"].as_str().unwrap();
        assert!(remote.starts_with("127.0.0.1:"), "unexpected peer {remote}");
    }

    let body = client
        .get(format!("http://{addr}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains(&format!(
        "http_requests_total{{method=\"GET\",endpoint=\"/\",status=\"200\"}} {total_requests}"
    )));
    assert!(body.contains("http_request_duration_seconds_bucket"));

    shutdown.trigger();
    let stopped = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop after shutdown");
    assert!(stopped.unwrap().is_ok());

    let stopped_logs = captured.records("HTTP server stopped");
    assert_eq!(stopped_logs.len(), 1);
    assert_eq!(captured.records("Rust service starting").len(), 1);
}
