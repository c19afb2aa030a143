//! The service on a real Unix socket.

use std::time::Duration;

use sigil_client::{ClientConfig, RpcClient};
use sigil_protocol::favorite::{FavoriteAddArg, Folder};
use sigil_protocol::log_ui::{LogArg, LogLevel};
use sigil_protocol::SessionId;
use sigil_server::{ServerConfig, SigilServer};
use tokio::sync::oneshot;

async fn wait_for(path: &std::path::Path) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("socket never appeared");
}

#[tokio::test]
async fn serves_until_shutdown_and_removes_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("run").join("sigil.sock");
    let server = SigilServer::builder()
        .config(ServerConfig {
            socket_path: socket_path.clone(),
            fs_root: dir.path().to_path_buf(),
            ..Default::default()
        })
        .build()
        .unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(async move {
        server
            .serve_until(async {
                let _ = stopped.await;
            })
            .await
    });
    wait_for(&socket_path).await;

    let client = RpcClient::connect(ClientConfig::default().with_socket_path(&socket_path))
        .await
        .unwrap();
    client
        .favorite()
        .favorite_add(FavoriteAddArg {
            session_id: SessionId(1),
            folder: Folder::new("team"),
        })
        .await
        .unwrap();
    assert_eq!(
        client.favorite().favorite_list(SessionId(1)).await.unwrap(),
        vec![Folder::new("team")]
    );
    client
        .log_ui()
        .log(LogArg {
            session_id: SessionId(1),
            level: LogLevel::Info,
            text: "hello".into(),
        })
        .await
        .unwrap();

    stop.send(()).unwrap();
    serving.await.unwrap().unwrap();
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn stale_socket_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("sigil.sock");
    // Left behind by a process that did not clean up
    drop(std::os::unix::net::UnixListener::bind(&socket_path).unwrap());
    assert!(socket_path.exists());

    let server = SigilServer::builder()
        .config(ServerConfig {
            socket_path: socket_path.clone(),
            ..Default::default()
        })
        .build()
        .unwrap();
    server.serve_until(async {}).await.unwrap();
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn refuses_to_replace_a_regular_file() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("sigil.sock");
    std::fs::write(&socket_path, b"not a socket").unwrap();

    let server = SigilServer::builder()
        .config(ServerConfig {
            socket_path: socket_path.clone(),
            ..Default::default()
        })
        .build()
        .unwrap();
    assert!(server.serve_until(async {}).await.is_err());
    assert_eq!(std::fs::read(&socket_path).unwrap(), b"not a socket");
}
