//! Integration tests for the server accept loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use thrum::prelude::*;
use thrum::transport::{Service, TransportError};
use tokio::sync::oneshot;

/// Counts frames and echoes them back.
#[derive(Default)]
struct CountingEcho {
    frames: Arc<AtomicUsize>,
}

#[derive(Debug, thiserror::Error)]
#[error("unreachable")]
struct Never;

impl Service for CountingEcho {
    type Error = Never;

    async fn apply(&self, request: Bytes) -> Result<Bytes, Never> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(request)
    }
}

#[tokio::test]
async fn test_server_serves_many_connections() {
    let frames = Arc::new(AtomicUsize::new(0));
    let server = ThriftServer::builder()
        .bind("127.0.0.1:0")
        .build(CountingEcho {
            frames: Arc::clone(&frames),
        })
        .await
        .expect("should bind");
    let addr = server.local_addr().unwrap().to_string();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    for i in 0..3u8 {
        let client = FramedClient::connect(&addr, &FramedConfig::default())
            .await
            .expect("client should connect");
        let reply = client.call(Bytes::from(vec![i; 4])).await.unwrap();
        assert_eq!(&reply[..], &[i; 4]);
    }
    assert_eq!(frames.load(Ordering::Relaxed), 3);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_stops_accepting_after_shutdown() {
    let server = ThriftServer::builder()
        .bind("127.0.0.1:0")
        .build(CountingEcho::default())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();

    server.run_until(async {}).await.unwrap();

    let result = FramedClient::connect(&addr, &FramedConfig::default()).await;
    assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
}
