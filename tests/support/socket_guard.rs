use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a mock server, or returns `None` when localhost sockets are
/// unavailable. Set `POLICY_SCRAPER_REQUIRE_SOCKET_TESTS=1` to panic instead.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return Some(MockServer::start().await);
    }

    let required = std::env::var("POLICY_SCRAPER_REQUIRE_SOCKET_TESTS")
        .is_ok_and(|value| matches!(value.as_str(), "1" | "true" | "yes"));
    assert!(!required, "cannot bind a localhost socket for wiremock");
    eprintln!("skipping socket-bound test: cannot bind a localhost socket");
    None
}
