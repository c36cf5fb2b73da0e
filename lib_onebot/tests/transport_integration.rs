//! End-to-end tests of the WebSocket client against a local endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use lib_onebot::configs::TransportSettings;
use lib_onebot::connections::{AdminManager, JsonLevelStore};
use lib_onebot::{
    BotConfig, CommandSpec, Dispatcher, Handler, OneBotClient, Param, PermissionResolver, PluginMeta, PluginUnit,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerWs = WebSocketStream<TcpStream>;

fn dispatcher(dir: &TempDir) -> Dispatcher {
    let admins = AdminManager::load(dir.path().join("admin.json")).unwrap();
    let levels = JsonLevelStore::load(dir.path().join("permissions.json")).unwrap();
    let resolver = PermissionResolver::new(Arc::new(admins), Arc::new(levels));
    Dispatcher::new(&BotConfig::default(), resolver)
}

fn settings(addr: &str, call_timeout: Duration) -> TransportSettings {
    TransportSettings {
        uri: format!("ws://{addr}"),
        token: Some("secret".to_string()),
        reconnect_delay: Duration::from_secs(30),
        call_timeout,
    }
}

fn private_msg(user_id: i64, text: &str) -> Value {
    json!({
        "post_type": "message", "message_type": "private", "sub_type": "friend",
        "time": 1700000000, "self_id": 10001, "user_id": user_id, "message_id": 7,
        "raw_message": text, "font": 0,
        "message": [{"type": "text", "data": {"text": text}}],
        "sender": {"user_id": user_id, "nickname": "tester"}
    })
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < Duration::from_secs(5), "condition not met in time");
        sleep(Duration::from_millis(10)).await;
    }
}

async fn next_json(ws: &mut ServerWs) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Accepts the next client connection on `listener` and waits until the
/// client sees it as open. Returns the server side socket and the
/// `Authorization` header it saw.
async fn accept(listener: &TcpListener, client: &Arc<OneBotClient>) -> (ServerWs, Option<String>) {
    let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("client connected in time")
        .unwrap();
    let auth = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&auth);
    let ws = tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *seen.lock().unwrap() = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(resp)
    })
    .await
    .unwrap();

    let watched = Arc::clone(client);
    wait_until(move || watched.is_open()).await;
    let auth = auth.lock().unwrap().clone();
    (ws, auth)
}

/// Binds a local endpoint and starts a client against it.
async fn connected(
    call_timeout: Duration,
    dispatcher: Dispatcher,
) -> (Arc<OneBotClient>, ServerWs, Option<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let client = Arc::new(OneBotClient::new(settings(&addr, call_timeout), Arc::new(dispatcher)));
    tokio::spawn(Arc::clone(&client).connect());
    let (ws, auth) = accept(&listener, &client).await;
    (client, ws, auth)
}

/// Answers the next call frame with `{"status": "ok"}`.
async fn answer_next_call(ws: &mut ServerWs) -> Value {
    let frame = next_json(ws).await;
    send_json(ws, json!({"status": "ok", "retcode": 0, "echo": frame["echo"]})).await;
    frame
}

#[tokio::test]
async fn test_call_before_connect_is_not_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let client = OneBotClient::new(settings("127.0.0.1:9", Duration::from_secs(1)), Arc::new(dispatcher(&dir)));
    let res = client.call("get_status", json!({})).await;
    assert_eq!(
        res,
        json!({"status": "failed", "retcode": -1, "msg": "websocket not initialized"})
    );
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_bearer_token_and_frame_shape() {
    let dir = tempfile::tempdir().unwrap();
    let (client, mut ws, auth) = connected(Duration::from_secs(5), dispatcher(&dir)).await;
    assert_eq!(auth.as_deref(), Some("Bearer secret"));

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.call("get_login_info", Value::Null).await }
    });
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["action"], "get_login_info");
    assert_eq!(frame["params"], json!({}));
    let echo = frame["echo"].as_str().unwrap().to_string();

    let response = json!({"status": "ok", "retcode": 0, "data": {"user_id": 1}, "echo": echo});
    send_json(&mut ws, response.clone()).await;
    assert_eq!(call.await.unwrap(), response);
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_out_of_order_responses_are_correlated() {
    let dir = tempfile::tempdir().unwrap();
    let (client, mut ws, _) = connected(Duration::from_secs(5), dispatcher(&dir)).await;

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.call("get_msg", json!({"message_id": 1})).await }
    });
    let second = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.call("get_msg", json!({"message_id": 2})).await }
    });

    let a = next_json(&mut ws).await;
    let b = next_json(&mut ws).await;
    assert_ne!(a["echo"], b["echo"]);

    // Answer in reverse order of arrival.
    for frame in [&b, &a] {
        let id = frame["params"]["message_id"].clone();
        send_json(&mut ws, json!({"status": "ok", "data": {"id": id}, "echo": frame["echo"]})).await;
    }

    assert_eq!(first.await.unwrap()["data"]["id"], 1);
    assert_eq!(second.await.unwrap()["data"]["id"], 2);
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_timeout_then_late_response_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let call_timeout = Duration::from_millis(200);
    let (client, mut ws, _) = connected(call_timeout, dispatcher(&dir)).await;

    let started = Instant::now();
    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.call("get_status", json!({})).await }
    });
    let frame = next_json(&mut ws).await;

    let res = call.await.unwrap();
    assert!(started.elapsed() >= call_timeout);
    assert_eq!(res, json!({"status": "failed", "retcode": -1, "msg": "api timeout"}));
    assert_eq!(client.pending_calls(), 0);

    // The late answer must not disturb the next call.
    send_json(&mut ws, json!({"status": "ok", "echo": frame["echo"]})).await;
    let next = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.call("get_status", json!({})).await }
    });
    let frame = next_json(&mut ws).await;
    send_json(&mut ws, json!({"status": "ok", "retcode": 0, "echo": frame["echo"]})).await;
    assert_eq!(next.await.unwrap()["retcode"], 0);
}

#[tokio::test]
async fn test_push_event_runs_command_and_replies() {
    let dir = tempfile::tempdir().unwrap();
    let disp = dispatcher(&dir);
    let mut unit = PluginUnit::new(PluginMeta::new("echo", "", "/echo <text>"));
    unit.command(
        CommandSpec::new("echo"),
        &[Param::Bot, Param::Event, Param::Args],
        Handler::from_async(|ctx| async move {
            let text = ctx.args()?.join(" ");
            ctx.bot()?.send(ctx.event()?, text).await;
            Ok(false)
        }),
    )
    .unwrap();
    disp.load_plugin("echo", unit);

    let (_client, mut ws, _) = connected(Duration::from_secs(5), disp).await;
    send_json(&mut ws, private_msg(42, "/echo hello world")).await;

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["action"], "send_private_msg");
    assert_eq!(frame["params"]["user_id"], 42);
    assert_eq!(frame["params"]["message"], "hello world");
    send_json(&mut ws, json!({"status": "ok", "retcode": 0, "echo": frame["echo"]})).await;
}

#[tokio::test]
async fn test_remote_close_reports_not_open() {
    let dir = tempfile::tempdir().unwrap();
    let (client, mut ws, _) = connected(Duration::from_secs(5), dispatcher(&dir)).await;

    // Frames that are neither events nor responses are ignored.
    send_json(&mut ws, json!({"hello": "world"})).await;
    ws.send(Message::Text("not json".into())).await.unwrap();
    ws.close(None).await.unwrap();
    drop(ws);

    let watched = Arc::clone(&client);
    wait_until(move || !watched.is_open()).await;
    let res = client.call("get_status", json!({})).await;
    assert_eq!(
        res,
        json!({"status": "failed", "retcode": -1, "msg": "websocket is not open"})
    );
}

#[tokio::test]
async fn test_reconnects_after_fixed_delay() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let mut transport = settings(&addr, Duration::from_secs(5));
    transport.reconnect_delay = Duration::from_millis(200);
    let client = Arc::new(OneBotClient::new(transport, Arc::new(dispatcher(&dir))));
    tokio::spawn(Arc::clone(&client).connect());

    let (mut first, _) = accept(&listener, &client).await;
    first.close(None).await.unwrap();
    drop(first);
    let watched = Arc::clone(&client);
    wait_until(move || !watched.is_open()).await;
    let closed_at = Instant::now();

    let (mut second, auth) = accept(&listener, &client).await;
    assert!(closed_at.elapsed() < Duration::from_secs(5));
    assert_eq!(auth.as_deref(), Some("Bearer secret"));

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.call("get_status", json!({})).await }
    });
    let frame = answer_next_call(&mut second).await;
    assert_eq!(frame["action"], "get_status");
    assert_eq!(call.await.unwrap()["status"], "ok");
}

#[tokio::test]
async fn test_slow_handler_does_not_block_receive_loop() {
    let dir = tempfile::tempdir().unwrap();
    let disp = dispatcher(&dir);
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let mut unit = PluginUnit::new(PluginMeta::new("slow", "", "/slow"));
    {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        unit.command(
            CommandSpec::new("slow"),
            &[],
            Handler::from_blocking(move |_| {
                started.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_secs(3));
                finished.store(true, Ordering::SeqCst);
                Ok(false)
            }),
        )
        .unwrap();
    }
    disp.load_plugin("slow", unit);

    let (client, mut ws, _) = connected(Duration::from_secs(5), disp).await;
    send_json(&mut ws, private_msg(42, "/slow")).await;
    let watched = Arc::clone(&started);
    wait_until(move || watched.load(Ordering::SeqCst)).await;

    let issued = Instant::now();
    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.call("get_status", json!({})).await }
    });
    answer_next_call(&mut ws).await;
    assert_eq!(call.await.unwrap()["status"], "ok");
    assert!(issued.elapsed() < Duration::from_secs(2));
    assert!(!finished.load(Ordering::SeqCst));
}
