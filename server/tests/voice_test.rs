//! Integration tests for the voice signaling socket: rooms, relay, hangup and upgrade errors.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tanq_realtime::config::RealtimeConfig;
use tanq_realtime::state::AppState;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper: start the server on a random port and return (state, addr).
async fn start_test_server() -> (AppState, SocketAddr) {
    let state = AppState::new(b"test-secret".to_vec(), RealtimeConfig::default());

    let app = tanq_realtime::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (state, addr)
}

async fn connect(addr: SocketAddr, room: &str) -> Socket {
    let url = format!("ws://{}/api/realtime/voice?room={}", addr, room);
    let (socket, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("voice socket connects");
    socket
}

/// Next JSON text frame, skipping control frames.
async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("frame within timeout")
            .expect("socket still open")
            .expect("frame is ok");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {:?}", other),
        }
    }
}

/// Assert nothing but control frames arrives for a short while.
async fn expect_silence(socket: &mut Socket) {
    loop {
        match tokio::time::timeout(Duration::from_millis(200), socket.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("expected no frame, got {:?}", other),
        }
    }
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn join(addr: SocketAddr, room: &str) -> (Socket, String, Value) {
    let mut socket = connect(addr, room).await;
    let init = next_json(&mut socket).await;
    assert_eq!(init["type"], "init");
    let peer_id = init["peerId"].as_str().unwrap().to_string();
    (socket, peer_id, init)
}

#[tokio::test]
async fn test_join_identify_leave_flow() {
    let (state, addr) = start_test_server().await;

    let (mut a, pa, init_a) = join(addr, "r1").await;
    assert_eq!(init_a["peers"], json!([]));
    assert_eq!(pa.len(), 32);

    let (mut b, pb, init_b) = join(addr, "r1").await;
    assert_ne!(pa, pb);
    assert_eq!(init_b["peers"], json!([{ "peerId": pa }]));

    let join_msg = next_json(&mut a).await;
    assert_eq!(join_msg, json!({ "type": "peer-join", "peerId": pb }));

    send_json(&mut b, json!({ "type": "identity", "userId": "u2", "name": "Ren" })).await;
    let info = next_json(&mut a).await;
    assert_eq!(
        info,
        json!({ "type": "peer-info", "peerId": pb, "meta": { "userId": "u2", "name": "Ren" } })
    );
    expect_silence(&mut b).await;

    // A third peer sees B's identity in its init
    let (c, _pc, init_c) = join(addr, "r1").await;
    assert_eq!(
        init_c["peers"],
        json!([
            { "peerId": pa },
            { "peerId": pb, "meta": { "userId": "u2", "name": "Ren" } }
        ])
    );
    drop(c);
    let _ = next_json(&mut a).await; // peer-join for C
    let _ = next_json(&mut a).await; // peer-leave for C

    b.close(None).await.unwrap();
    let leave = next_json(&mut a).await;
    assert_eq!(leave, json!({ "type": "peer-leave", "peerId": pb }));

    a.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!state.voice.contains_room("r1"));
}

#[tokio::test]
async fn test_offer_relayed_with_sender() {
    let (_state, addr) = start_test_server().await;

    let (mut a, pa, _) = join(addr, "r2").await;
    let (mut b, pb, _) = join(addr, "r2").await;
    let _ = next_json(&mut a).await; // peer-join

    send_json(
        &mut a,
        json!({ "type": "offer", "target": pb, "sdp": "v=0", "from": "spoofed" }),
    )
    .await;
    let offer = next_json(&mut b).await;
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["sdp"], "v=0");
    assert_eq!(offer["target"], pb.as_str());
    assert_eq!(offer["from"], pa.as_str());

    send_json(
        &mut b,
        json!({ "type": "ice-candidate", "target": pa, "candidate": { "candidate": "c1" } }),
    )
    .await;
    let candidate = next_json(&mut a).await;
    assert_eq!(candidate["type"], "ice-candidate");
    assert_eq!(candidate["candidate"]["candidate"], "c1");
    assert_eq!(candidate["from"], pb.as_str());
}

#[tokio::test]
async fn test_binary_frames_are_read_as_text() {
    let (_state, addr) = start_test_server().await;

    let (mut a, pa, _) = join(addr, "r3").await;
    let (mut b, pb, _) = join(addr, "r3").await;
    let _ = next_json(&mut a).await;

    let answer = json!({ "type": "answer", "target": pa, "sdp": "v=0" }).to_string();
    b.send(Message::Binary(answer.into_bytes().into())).await.unwrap();

    let relayed = next_json(&mut a).await;
    assert_eq!(relayed["type"], "answer");
    assert_eq!(relayed["from"], pb.as_str());
}

#[tokio::test]
async fn test_relay_to_unknown_target_is_dropped() {
    let (_state, addr) = start_test_server().await;

    let (mut a, _pa, _) = join(addr, "r4").await;
    let (mut b, _pb, _) = join(addr, "r4").await;
    let _ = next_json(&mut a).await;

    send_json(&mut b, json!({ "type": "offer", "target": "nobody", "sdp": "x" })).await;
    expect_silence(&mut a).await;
    expect_silence(&mut b).await;
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let (_state, addr) = start_test_server().await;

    let (mut a, pa, _) = join(addr, "r5").await;
    let (mut b, pb, _) = join(addr, "r5").await;
    let _ = next_json(&mut a).await;

    b.send(Message::Text("not json".into())).await.unwrap();
    b.send(Message::Text("[1,2,3]".into())).await.unwrap();
    send_json(&mut b, json!({ "type": "dance" })).await;
    send_json(&mut b, json!({ "type": "identity", "userId": "u2" })).await;
    expect_silence(&mut a).await;

    // Still connected: a relay goes through afterwards
    send_json(&mut b, json!({ "type": "offer", "target": pa, "sdp": "v=0" })).await;
    let offer = next_json(&mut a).await;
    assert_eq!(offer["from"], pb.as_str());
}

#[tokio::test]
async fn test_hangup_notifies_room_and_closes_socket() {
    let (state, addr) = start_test_server().await;

    let (mut a, _pa, _) = join(addr, "r6").await;
    let (mut b, pb, _) = join(addr, "r6").await;
    let _ = next_json(&mut a).await;

    send_json(&mut b, json!({ "type": "hangup" })).await;

    let leave = next_json(&mut a).await;
    assert_eq!(leave, json!({ "type": "peer-leave", "peerId": pb }));

    // B receives a close frame (or the stream ends) and no further frames
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match b.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => panic!("unexpected frame after hangup: {:?}", other),
            }
        }
    })
    .await;
    assert!(ended.is_ok());

    // Only one peer-leave for B, even after its socket finishes closing
    expect_silence(&mut a).await;
    assert_eq!(state.voice.participant_count("r6"), 1);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let (_state, addr) = start_test_server().await;

    let (mut a, _pa, _) = join(addr, "alpha").await;
    let (_b, _pb, init_b) = join(addr, "beta").await;

    assert_eq!(init_b["peers"], json!([]));
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn test_plain_http_request_is_rejected() {
    let (_state, addr) = start_test_server().await;

    let resp = reqwest::get(format!("http://{}/api/realtime/voice?room=r1", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Expected websocket");
}

#[tokio::test]
async fn test_repeated_room_key_joins_first_room() {
    let (state, addr) = start_test_server().await;

    let resp = reqwest::get(format!("http://{}/api/realtime/voice?room=a&room=b", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Expected websocket");

    let (_socket, _peer, init) = join(addr, "a&room=b").await;
    assert_eq!(init["peers"], json!([]));
    assert_eq!(state.voice.participant_count("a"), 1);
    assert!(!state.voice.contains_room("b"));
}

#[tokio::test]
async fn test_missing_room_is_rejected() {
    let (_state, addr) = start_test_server().await;

    for url in [
        format!("ws://{}/api/realtime/voice", addr),
        format!("ws://{}/api/realtime/voice?room=", addr),
    ] {
        match tokio_tungstenite::connect_async(&url).await {
            Err(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), 400);
            }
            other => panic!("expected HTTP 400, got {:?}", other.map(|_| ())),
        }
    }
}

#[tokio::test]
async fn test_missing_room_message() {
    let (_state, addr) = start_test_server().await;

    // Hand-rolled upgrade request so the rejection body can be read
    let resp = reqwest::Client::new()
        .get(format!("http://{}/api/realtime/voice", addr))
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Missing room identifier");
}

#[tokio::test]
async fn test_health() {
    let (_state, addr) = start_test_server().await;
    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}
