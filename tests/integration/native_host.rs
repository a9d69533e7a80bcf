//! Native messaging client against a scripted extension shim

use serde_json::{json, Value};
use tab_counter::core::events::HostEvent;
use tab_counter::counter::{TabId, WindowId};
use tab_counter::host::protocol::{read_frame, write_frame};
use tab_counter::host::{Host, HostError, NativeHost};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};

struct Shim {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
}

fn connect() -> (NativeHost, tokio::sync::mpsc::UnboundedReceiver<HostEvent>, Shim) {
    let (host_side, shim_side) = tokio::io::duplex(1 << 16);
    let (host_read, host_write) = tokio::io::split(host_side);
    let (reader, writer) = tokio::io::split(shim_side);
    let (host, events) = NativeHost::spawn(host_read, host_write);
    (host, events, Shim { reader, writer })
}

async fn send_json<W: AsyncWrite + Unpin>(writer: &mut W, value: Value) {
    let payload = serde_json::to_vec(&value).unwrap();
    let mut frame = (payload.len() as u32).to_ne_bytes().to_vec();
    frame.extend_from_slice(&payload);
    write_frame(writer, &frame).await.unwrap();
}

async fn recv_json<R: AsyncRead + Unpin>(reader: &mut R) -> Value {
    let payload = read_frame(reader).await.unwrap().expect("stream closed");
    serde_json::from_slice(&payload).unwrap()
}

#[tokio::test]
async fn test_events_are_forwarded() {
    let (_host, mut events, mut shim) = connect();

    send_json(
        &mut shim.writer,
        json!({"event": "tabCreated", "tabId": 3, "windowId": 1, "hidden": true}),
    )
    .await;
    send_json(&mut shim.writer, json!({"event": "unknownThing"})).await;
    send_json(
        &mut shim.writer,
        json!({"event": "windowRemoved", "windowId": 1}),
    )
    .await;

    assert_eq!(
        events.recv().await,
        Some(HostEvent::TabCreated {
            tab_id: TabId(3),
            window_id: WindowId(1),
            hidden: true
        })
    );
    // the malformed message is skipped
    assert_eq!(
        events.recv().await,
        Some(HostEvent::WindowRemoved {
            window_id: WindowId(1)
        })
    );
}

#[tokio::test]
async fn test_queries_are_answered_by_id() {
    let (host, _events, mut shim) = connect();

    let shim_side = async {
        let request = recv_json(&mut shim.reader).await;
        assert_eq!(request["query"], "activeTab");
        send_json(&mut shim.writer, json!({"id": request["id"], "result": 42})).await;

        let request = recv_json(&mut shim.reader).await;
        assert_eq!(request["query"], "snapshot");
        send_json(
            &mut shim.writer,
            json!({"id": request["id"], "result": {"windows": [
                {"id": 1, "type": "normal", "focused": true, "tabs": [{"id": 42}, {"id": 43, "hidden": true}]}
            ]}}),
        )
        .await;

        let request = recv_json(&mut shim.reader).await;
        assert_eq!(request["query"], "tabHidden");
        assert_eq!(request["tabId"], 43);
        send_json(&mut shim.writer, json!({"id": request["id"], "result": true})).await;
    };

    let host_side = async {
        let active = host.active_tab().await.unwrap();
        let snapshot = host.snapshot().await.unwrap();
        let hidden = host.tab_hidden(TabId(43)).await.unwrap();
        (active, snapshot, hidden)
    };

    let ((active, snapshot, hidden), ()) = tokio::join!(host_side, shim_side);
    assert_eq!(active, Some(TabId(42)));
    assert_eq!(snapshot.tab_count(), 2);
    assert!(hidden);
}

#[tokio::test]
async fn test_error_reply_and_missing_tab() {
    let (host, _events, mut shim) = connect();

    let shim_side = async {
        let request = recv_json(&mut shim.reader).await;
        send_json(
            &mut shim.writer,
            json!({"id": request["id"], "error": "Invalid tab ID: 9"}),
        )
        .await;

        let request = recv_json(&mut shim.reader).await;
        send_json(&mut shim.writer, json!({"id": request["id"], "result": null})).await;
    };

    let host_side = async {
        let rejected = host.tab_hidden(TabId(9)).await;
        let missing = host.tab_hidden(TabId(10)).await;
        (rejected, missing)
    };

    let ((rejected, missing), ()) = tokio::join!(host_side, shim_side);
    assert!(matches!(rejected, Err(HostError::Rejected(message)) if message.contains("9")));
    assert!(matches!(missing, Err(HostError::NoSuchTab(TabId(10)))));
}

#[tokio::test]
async fn test_commands_are_written_in_order() {
    let (host, _events, mut shim) = connect();

    host.set_badge_background("#999999").await.unwrap();
    host.set_badge_text(Some(TabId(5)), "12").await.unwrap();
    host.set_title(None, "Tab Counter").await.unwrap();

    assert_eq!(
        recv_json(&mut shim.reader).await,
        json!({"command": "setBadgeBackgroundColor", "color": "#999999"})
    );
    assert_eq!(
        recv_json(&mut shim.reader).await,
        json!({"command": "setBadgeText", "tabId": 5, "text": "12"})
    );
    assert_eq!(
        recv_json(&mut shim.reader).await,
        json!({"command": "setTitle", "title": "Tab Counter"})
    );
}

#[tokio::test]
async fn test_closing_the_stream_disconnects() {
    let (host, mut events, shim) = connect();

    let pending = host.active_tab();
    let close = async move {
        let mut shim = shim;
        // wait for the request so the query is really pending
        let request = recv_json(&mut shim.reader).await;
        assert_eq!(request["query"], "activeTab");
        drop(shim);
    };

    let (result, ()) = tokio::join!(pending, close);
    assert!(matches!(result, Err(HostError::Disconnected)));
    assert_eq!(events.recv().await, None);
    assert!(!host.is_connected());
    assert!(matches!(host.snapshot().await, Err(HostError::Disconnected)));
}
