//! Server helper driven through a harness
//!
//! The helper only sees `&dyn TestControl`; these tests check that it
//! logs, registers its shutdown and reports failures through the harness.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::*;
use futures::future::join_all;
use nontest::{spawn_task, Outcome, TestControl};
use tokio::net::TcpStream;

/// Poll until nothing accepts connections on `addr`
async fn wait_until_stopped(addr: std::net::SocketAddr) -> bool {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_err() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_server_started_from_harness() -> Result<()> {
    let (harness, logger) = memory_harness(false);
    let server = start_server(&harness).await?;

    let (status, body) = http_get(server.addr()).await?;
    assert_eq!(status, 200, "status code is not 200 for {}", server.url());
    assert_eq!(body, "OK");

    let log = logger.contents();
    assert!(log.contains(r#""level":"INFO""#), "log: {}", log);
    assert!(log.contains(r#""msg":"Server started""#), "log: {}", log);

    harness.finalize();
    assert!(wait_until_stopped(server.addr()).await);
    assert!(!harness.failed());
    Ok(())
}

#[tokio::test]
async fn test_servers_from_concurrent_tasks() -> Result<()> {
    let (harness, logger) = memory_harness(false);
    let harness = Arc::new(harness);

    let tasks = (0..4).map(|_| {
        let harness = harness.clone();
        tokio::spawn(async move { start_server(&*harness).await })
    });
    let mut servers = Vec::new();
    for joined in join_all(tasks).await {
        servers.push(joined??);
    }
    assert_eq!(harness.pending().cleanups, 4);

    for server in &servers {
        let (status, body) = http_get(server.addr()).await?;
        assert_eq!((status, body.as_str()), (200, "OK"));
    }
    assert_eq!(logger.messages(tracing::Level::INFO).len(), 4);

    harness.finalize();
    for server in &servers {
        assert!(wait_until_stopped(server.addr()).await);
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_env_aborts_task() -> Result<()> {
    let (harness, logger) = memory_harness(true);
    let harness = Arc::new(harness);
    let key = unique_env_key("MISSING");

    let outcome = spawn_task(harness.clone(), |t| async move {
        let server = start_server(&*t).await.expect("bind test server");
        let _token = require_env(&*t, &key);
        unreachable!("require_env returned after fatal on {}", server.url());
    })
    .await;

    assert_eq!(outcome, Outcome::Failed);
    assert!(harness.finished());
    let errors = logger.messages(tracing::Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("is not set"), "errors: {:?}", errors);

    // The aborted task's cleanups already ran
    assert!(harness.pending().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_env_override_visible_to_helper() -> Result<()> {
    let (harness, _) = memory_harness(false);
    let key = unique_env_key("TOKEN");

    harness.set_env(&key, "secret");
    assert_eq!(require_env(&harness, &key), "secret");
    assert!(!harness.failed());

    harness.finalize();
    assert!(std::env::var_os(&key).is_none());
    Ok(())
}
