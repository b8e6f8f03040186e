use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a wiremock server, or returns `None` when loopback sockets are
/// unavailable (sandboxed runners).
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(e) = TcpListener::bind("127.0.0.1:0") {
        eprintln!("skipping mock-server test: cannot bind loopback socket ({e})");
        return None;
    }
    Some(MockServer::start().await)
}
