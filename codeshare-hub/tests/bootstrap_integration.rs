//! Integration tests for listener bootstrap against real occupied ports.

use codeshare_hub::bootstrap::bind_with_retry;
use codeshare_hub::config::HubConfig;
use codeshare_hub::error::{BindError, HubError};
use codeshare_hub::server::HubServer;
use tokio::net::TcpListener;

/// Find `n` consecutive free ports and occupy all of them.
///
/// Returns the first port and the listeners holding the range.
async fn occupy_range(n: u16) -> (u16, Vec<TcpListener>) {
    'search: for _ in 0..50 {
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = first.local_addr().unwrap().port();
        if base.checked_add(n + 1).is_none() {
            continue;
        }

        let mut held = vec![first];
        for offset in 1..n {
            match TcpListener::bind(("127.0.0.1", base + offset)).await {
                Ok(listener) => held.push(listener),
                Err(_) => continue 'search,
            }
        }
        return (base, held);
    }
    panic!("no run of {n} free ports found");
}

/// Occupy `n` consecutive ports whose successor is free.
async fn occupy_range_with_free_successor(n: u16) -> (u16, Vec<TcpListener>) {
    loop {
        let (base, held) = occupy_range(n).await;
        let successor = base + n;
        if let Ok(probe) = TcpListener::bind(("127.0.0.1", successor)).await {
            drop(probe);
            return (base, held);
        }
    }
}

#[tokio::test]
async fn test_taken_port_moves_to_next() {
    let (port, _held) = occupy_range_with_free_successor(1).await;

    let (_listener, bound) = bind_with_retry("127.0.0.1", port, 10).await.unwrap();
    assert_eq!(bound, port + 1);
}

#[tokio::test]
async fn test_skips_several_taken_ports() {
    let (port, _held) = occupy_range_with_free_successor(3).await;

    let (_listener, bound) = bind_with_retry("127.0.0.1", port, 10).await.unwrap();
    assert_eq!(bound, port + 3);
}

#[tokio::test]
async fn test_all_attempts_taken_fails() {
    let (port, _held) = occupy_range(10).await;

    let err = bind_with_retry("127.0.0.1", port, 10).await.unwrap_err();
    match err {
        BindError::PortsExhausted { first, last, attempts } => {
            assert_eq!(first, port);
            assert_eq!(last, port + 9);
            assert_eq!(attempts, 10);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hub_server_bind_surfaces_exhaustion() {
    let (port, _held) = occupy_range(2).await;

    let config = HubConfig {
        host: "127.0.0.1".to_string(),
        port,
        max_port_attempts: 2,
        ..HubConfig::default()
    };
    let result = HubServer::bind(config).await;
    assert!(matches!(
        result,
        Err(HubError::Bind(BindError::PortsExhausted { .. }))
    ));
}

#[tokio::test]
async fn test_hub_server_binds_next_free_port() {
    let (port, _held) = occupy_range_with_free_successor(1).await;

    let config = HubConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..HubConfig::default()
    };
    let server = HubServer::bind(config).await.unwrap();
    assert_eq!(server.port(), port + 1);
}
