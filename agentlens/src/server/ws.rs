//! Live push channel: every recorded message and session end, as JSON text
//! frames, to each connected observer.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::broadcast::Broadcaster;

pub fn router(broadcaster: Broadcaster) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/ws", get(websocket_handler))
        .with_state(broadcaster)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<Broadcaster>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, broadcaster))
}

async fn handle_websocket(mut socket: WebSocket, broadcaster: Broadcaster) {
    let mut subscription = broadcaster.subscribe();
    tracing::debug!(observers = broadcaster.observer_count(), "observer connected");

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    let _ = socket.send(WsMessage::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(error = %err, "could not encode live event");
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    broadcaster.unsubscribe(subscription);
    tracing::debug!("observer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;

    use crate::broadcast::{LiveEvent, SessionEndEvent};
    use crate::models::SessionStatus;

    async fn serve(broadcaster: Broadcaster) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(broadcaster)).await.unwrap();
        });
        addr
    }

    async fn wait_for_observers(broadcaster: &Broadcaster, count: usize) {
        for _ in 0..100 {
            if broadcaster.observer_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} observers, have {}", broadcaster.observer_count());
    }

    fn session_end() -> LiveEvent {
        LiveEvent::SessionEnd(SessionEndEvent {
            session_id: "s1".to_string(),
            code: Some(0),
            status: SessionStatus::Completed,
        })
    }

    #[tokio::test]
    async fn observer_receives_events_then_close() {
        let broadcaster = Broadcaster::default();
        let addr = serve(broadcaster.clone()).await;

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        wait_for_observers(&broadcaster, 1).await;

        assert_eq!(broadcaster.publish(session_end()), 1);
        broadcaster.close();

        let frame = socket.next().await.unwrap().unwrap();
        let ClientMessage::Text(text) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["event"], "session_end");
        assert_eq!(json["data"]["session_id"], "s1");
        assert_eq!(json["data"]["code"], 0);
        assert_eq!(json["data"]["status"], "completed");

        let frame = socket.next().await.unwrap().unwrap();
        assert!(matches!(frame, ClientMessage::Close(_)), "got {frame:?}");
    }

    #[tokio::test]
    async fn root_path_also_upgrades() {
        let broadcaster = Broadcaster::default();
        let addr = serve(broadcaster.clone()).await;

        let (_socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
            .await
            .unwrap();
        wait_for_observers(&broadcaster, 1).await;
    }

    #[tokio::test]
    async fn disconnected_observer_is_unsubscribed() {
        let broadcaster = Broadcaster::default();
        let addr = serve(broadcaster.clone()).await;

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        wait_for_observers(&broadcaster, 1).await;

        socket.close(None).await.unwrap();
        drop(socket);
        wait_for_observers(&broadcaster, 0).await;
    }
}
