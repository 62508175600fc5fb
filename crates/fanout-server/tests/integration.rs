//! End-to-end tests over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use fanout_server::{FanoutServer, ServerConfig};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn boot_server() -> (SocketAddr, FanoutServer) {
    let server = FanoutServer::new(ServerConfig::default());
    let (addr, _handle) = server.listen().await.unwrap();
    (addr, server)
}

/// Connect and consume the identity announcement.
async fn connect(addr: SocketAddr) -> (WsStream, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let welcome = recv(&mut ws).await;
    assert_eq!(welcome[0]["type"], "register");
    let id = welcome[0]["content"].as_str().unwrap().to_owned();
    (ws, id)
}

/// Next text frame, split into envelopes.
async fn recv(ws: &mut WsStream) -> Vec<Value> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("transport error");
        match msg {
            Message::Text(t) => {
                return t
                    .as_str()
                    .split('\n')
                    .map(|line| serde_json::from_str(line).unwrap())
                    .collect();
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

/// Collect `n` envelopes across however many frames they arrive in.
async fn recv_n(ws: &mut WsStream, n: usize) -> Vec<Value> {
    let mut out = Vec::new();
    while out.len() < n {
        out.extend(recv(ws).await);
    }
    out
}

async fn send(ws: &mut WsStream, text: &str) {
    ws.send(Message::text(text)).await.unwrap();
}

async fn clients(addr: SocketAddr) -> Value {
    reqwest::get(format!("http://{addr}/clients"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn wait_for_count(addr: SocketAddr, n: u64) {
    timeout(TIMEOUT, async {
        while clients(addr).await["count"] != n {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("client count never settled");
}

#[tokio::test]
async fn ping_endpoint() {
    let (addr, _server) = boot_server().await;
    let body: Value = reqwest::get(format!("http://{addr}/ping"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "pong");
}

#[tokio::test]
async fn identities_are_unique_and_listed() {
    let (addr, _server) = boot_server().await;
    let (_a, a) = connect(addr).await;
    let (_b, b) = connect(addr).await;
    assert_ne!(a, b);

    wait_for_count(addr, 2).await;
    let listed = clients(addr).await;
    let ids: Vec<&str> = listed["clients"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(ids.contains(&a.as_str()));
    assert!(ids.contains(&b.as_str()));
}

#[tokio::test]
async fn direct_message_reaches_only_target() {
    let (addr, _server) = boot_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;
    wait_for_count(addr, 2).await;

    send(
        &mut a,
        &format!(r#"{{"type":"direct","target":"{b_id}","content":"hi"}}"#),
    )
    .await;
    let got = recv(&mut b).await;
    assert_eq!(got[0]["content"], "hi");
    assert_eq!(got[0]["from"], a_id.as_str());

    // A gets nothing from its own direct message; the next thing it sees is
    // this broadcast.
    send(&mut b, "marker").await;
    let next = recv(&mut a).await;
    assert_eq!(next[0]["content"], "marker");
}

#[tokio::test]
async fn broadcast_reaches_everyone_including_sender() {
    let (addr, _server) = boot_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    let (mut c, _) = connect(addr).await;
    wait_for_count(addr, 3).await;

    send(&mut a, r#"{"type":"broadcast","content":"hello"}"#).await;
    for ws in [&mut a, &mut b, &mut c] {
        let got = recv(ws).await;
        assert_eq!(got[0]["content"], "hello");
        assert_eq!(got[0]["from"], a_id.as_str());
    }
}

#[tokio::test]
async fn malformed_payload_is_broadcast_verbatim() {
    let (addr, _server) = boot_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    wait_for_count(addr, 2).await;

    send(&mut a, "not json at all").await;
    let got = recv(&mut b).await;
    assert_eq!(got[0]["type"], "broadcast");
    assert_eq!(got[0]["content"], "not json at all");
    assert_eq!(got[0]["from"], a_id.as_str());
}

#[tokio::test]
async fn spoofed_sender_is_overwritten() {
    let (addr, _server) = boot_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    wait_for_count(addr, 2).await;

    send(&mut a, r#"{"content":"trust me","from":"admin"}"#).await;
    let got = recv(&mut b).await;
    assert_eq!(got[0]["from"], a_id.as_str());
}

#[tokio::test]
async fn sender_order_is_preserved() {
    let (addr, _server) = boot_server().await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    wait_for_count(addr, 2).await;

    for i in 0..20 {
        send(&mut a, &format!("m{i}")).await;
    }
    let got = recv_n(&mut b, 20).await;
    for (i, env) in got.iter().enumerate() {
        assert_eq!(env["content"], format!("m{i}"));
    }
}

#[tokio::test]
async fn closing_client_is_unregistered() {
    let (addr, _server) = boot_server().await;
    let (mut a, _) = connect(addr).await;
    let (_b, b_id) = connect(addr).await;
    wait_for_count(addr, 2).await;

    a.close(None).await.unwrap();
    wait_for_count(addr, 1).await;
    assert_eq!(clients(addr).await["clients"][0], b_id.as_str());
}

#[tokio::test]
async fn oversized_frame_closes_connection() {
    let (addr, _server) = boot_server().await;
    let (mut a, _) = connect(addr).await;
    wait_for_count(addr, 1).await;

    send(&mut a, &"x".repeat(4096)).await;
    let ended = timeout(TIMEOUT, async {
        loop {
            match a.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
    wait_for_count(addr, 0).await;
}

#[tokio::test]
async fn shutdown_disconnects_clients() {
    let server = FanoutServer::new(ServerConfig::default());
    let (addr, handle) = server.listen().await.unwrap();
    let (mut a, _) = connect(addr).await;

    server.shutdown().shutdown();
    let ended = timeout(TIMEOUT, async {
        loop {
            match a.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
    timeout(TIMEOUT, handle).await.unwrap().unwrap();
}
