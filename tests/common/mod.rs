//! Shared utilities for integration tests.

use std::time::Duration;

use rpc_tree::client::Client;
use rpc_tree::config::RpcConfig;
use rpc_tree::http::RpcServer;
use rpc_tree::lifecycle::Shutdown;
use rpc_tree::rpc::{CollisionPolicy, RouteTree, RpcRouter};
use tokio::net::TcpListener;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub shutdown: Shutdown,
}

impl TestServer {
    /// Route-tree client bound to this server.
    pub fn client(&self) -> Client {
        Client::with_http(&self.base_url, http_client()).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Plain HTTP client that bypasses any system proxy and connection pooling.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Compile `tree` and serve it on `127.0.0.1:0`.
pub async fn spawn_server(tree: RouteTree) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let rpc = RpcRouter::from_tree(&tree, CollisionPolicy::Reject).unwrap();
    let server = RpcServer::new(RpcConfig::default(), rpc);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        base_url: format!("http://{addr}"),
        shutdown,
    }
}
