//! WebSocket upgrade + message loop. Each connection keeps its own `UiState`
//! and the fragments it last sent; after every action only the fragments
//! whose HTML changed are sent back.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use chrono::Local;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::logic::{Action, UiState};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::render::{current_href, fragments, Fragments};
use crate::state::AppState;

#[instrument(level = "info", skip(state, ws))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "tracker", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Per-connection view state.
struct Connection {
  ui: UiState,
  last: Option<Fragments>,
}

impl Connection {
  fn new(state: &AppState) -> Self {
    Self { ui: state.session(None, String::new()), last: None }
  }

  fn handle(&mut self, state: &AppState, msg: ClientWsMessage) -> ServerWsMessage {
    let now = Local::now().fixed_offset();
    let prefs = state.store.preferences();
    match msg {
      ClientWsMessage::Ping => return ServerWsMessage::Pong,
      ClientWsMessage::Hello { lesson, q } => {
        self.ui = state.session(None, q);
        if let Some(id) = lesson {
          self.ui = state.dispatch(std::mem::take(&mut self.ui), Action::Select { id, now: Some(now) });
        }
        // The client already shows server-rendered HTML; resync from scratch.
        self.last = None;
      }
      other => {
        if let Some(action) = other.into_action(now, prefs.quiz_threshold) {
          // Pick up progress written by other clients before reducing.
          self.ui.progress = state.store.load();
          self.ui = state.dispatch(std::mem::take(&mut self.ui), action);
        }
      }
    }
    let next = fragments(&state.catalog, &self.ui, &prefs, &now);
    let (sidebar, lesson) = changed(self.last.as_ref(), &next);
    self.last = Some(next);
    ServerWsMessage::Render { sidebar, lesson, href: current_href(&self.ui) }
  }
}

/// Fragments that differ from what the client already has.
fn changed(last: Option<&Fragments>, next: &Fragments) -> (Option<String>, Option<String>) {
  match last {
    None => (Some(next.sidebar.clone()), Some(next.lesson.clone())),
    Some(prev) => (
      (prev.sidebar != next.sidebar).then(|| next.sidebar.clone()),
      (prev.lesson != next.lesson).then(|| next.lesson.clone()),
    ),
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let conn_id = Uuid::new_v4();
  info!(target: "tracker", %conn_id, "WebSocket connected");
  let mut conn = Connection::new(&state);
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "tracker", %conn_id, "WS received: {:?}", &incoming);
            conn.handle(&state, incoming)
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid message: {e}") },
        };

        let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "tracker", %conn_id, error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "tracker", %conn_id, "WebSocket disconnected");
}
