use mr_stub::{ServiceError, StubConfig, StubService};
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::test]
async fn serves_over_tcp_and_stops_on_shutdown() {
    let service = StubService::new(StubConfig::default()).expect("service");
    let shutdown = service.shutdown_handle();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(service.serve(listener));

    let client = reqwest::Client::new();
    let alive = client
        .get(format!("http://{}/", addr))
        .send()
        .await
        .expect("alive request");
    assert_eq!(alive.status(), 200);
    assert_eq!(alive.text().await.expect("body"), "OK");

    let id = client
        .post(format!("http://{}/send-request?operation=GET&url=/p", addr))
        .send()
        .await
        .expect("submit")
        .text()
        .await
        .expect("id");
    assert!(id.parse::<u64>().is_ok());

    drop(client);
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .expect("server task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let mut config = StubConfig::default();
    config.http.host = "127.0.0.1".parse().expect("ip");
    config.http.port = taken.local_addr().expect("addr").port();

    let service = StubService::new(config).expect("service");
    assert!(matches!(service.run().await, Err(ServiceError::Bind(_))));
}

#[tokio::test]
async fn serves_https_alongside_http() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("cert");
    let cert_path = dir.path().join("cert.crt");
    let key_path = dir.path().join("key.crt");
    std::fs::write(&cert_path, cert.pem()).expect("write cert");
    std::fs::write(&key_path, key_pair.serialize_pem()).expect("write key");

    let mut config = StubConfig::default();
    config.tls.port = 0;
    config.tls.cert_path = Some(cert_path);
    config.tls.key_path = Some(key_path);
    let service = StubService::new(config).expect("service");
    let shutdown = service.shutdown_handle();

    let http = TcpListener::bind("127.0.0.1:0").await.expect("bind http");
    let https = TcpListener::bind("127.0.0.1:0").await.expect("bind https");
    let http_addr = http.local_addr().expect("addr");
    let https_addr = https.local_addr().expect("addr");
    let server = tokio::spawn(service.serve_with(http, Some(https)));

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .expect("client");
    let alive = client
        .get(format!("https://{}/", https_addr))
        .send()
        .await
        .expect("alive over https");
    assert_eq!(alive.status(), 200);
    assert_eq!(alive.text().await.expect("body"), "OK");

    // Both listeners share one broker
    client
        .post(format!("https://{}/events/shared", https_addr))
        .body("\"over-tls\"")
        .send()
        .await
        .expect("publish over https");
    let read = client
        .get(format!("http://{}/events/shared?timeout=1000", http_addr))
        .send()
        .await
        .expect("read over http")
        .text()
        .await
        .expect("body");
    assert_eq!(read, r#"["over-tls"]"#);

    drop(client);
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server did not stop")
        .expect("server task panicked");
    assert!(result.is_ok());
}
