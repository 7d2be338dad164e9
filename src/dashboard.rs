use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;

use crate::status::{LiveStatus, StatusBoard};

const PUSH_INTERVAL: Duration = Duration::from_millis(500);

pub fn router(board: StatusBoard) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/ws", get(ws_handler))
        .with_state(board)
}

pub async fn start_dashboard(board: StatusBoard, port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    log::info!("Status dashboard at http://{}/status", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router(board)).await
}

async fn status_handler(State(board): State<StatusBoard>) -> Json<LiveStatus> {
    Json(board.snapshot().await)
}

async fn ws_handler(ws: WebSocketUpgrade, State(board): State<StatusBoard>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, board))
}

async fn handle_socket(mut socket: WebSocket, board: StatusBoard) {
    loop {
        let json = match serde_json::to_string(&board.snapshot().await) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Status serialization failed: {}", e);
                break;
            }
        };
        if socket.send(Message::Text(json)).await.is_err() {
            // Client disconnected
            break;
        }
        sleep(PUSH_INTERVAL).await;
    }
}
