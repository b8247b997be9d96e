use axum::{
    extract::{
        ws::{Message, WebSocket},
        State as AxumState, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Duration};

use spintrack_types::{BetRequest, JackpotSlots, PlanEntry, TrackSlot};

use crate::App;

/// Outbound frames queued per connection before a slow client is dropped.
const OUTBOUND_CAPACITY: usize = 256;

fn ws_send_timeout() -> Duration {
    let raw = std::env::var("WS_SEND_TIMEOUT_MS").ok();
    let parsed = raw
        .as_deref()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0);
    Duration::from_millis(parsed.unwrap_or(2_000))
}

enum OutboundSendError {
    Closed,
    Full,
}

fn enqueue(sender: &mpsc::Sender<Message>, message: Message) -> Result<(), OutboundSendError> {
    match sender.try_send(message) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => Err(OutboundSendError::Full),
        Err(mpsc::error::TrySendError::Closed(_)) => Err(OutboundSendError::Closed),
    }
}

/// Display knobs echoed to the client so it can render timers and payout
/// labels without a second fetch.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigEcho {
    bet_window_sec: u64,
    spin_duration_sec: u64,
    normal_mult: u64,
    jackpot_small_mult: u64,
    jackpot_big_mult: u64,
}

/// First frame on every connection. Carries the full board layout so a
/// client joining mid-round can draw immediately.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitFrame<'a> {
    r#type: &'static str,
    track: &'a [TrackSlot],
    rows: u32,
    cols: u32,
    jackpot_slots: JackpotSlots,
    respin_slots: &'a [u32],
    jackpot_pool: u64,
    config: ConfigEcho,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AckFrame {
    r#type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    round_id: u64,
    accepted: Vec<PlanEntry>,
    reused: bool,
    jackpot_pool: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorFrame {
    r#type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    code: &'static str,
    message: String,
}

/// Messages a client may push over the socket. Anything that fails to
/// parse is answered with a `bad_message` error frame.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Bet {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
        #[serde(flatten)]
        request: BetRequest,
    },
}

fn encode<T: Serialize>(frame: &T) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::warn!("Failed to encode websocket frame: {err}");
            None
        }
    }
}

fn init_frame(app: &App) -> InitFrame<'_> {
    let plan = app.plan();
    let config = app.game_config();
    InitFrame {
        r#type: "init",
        track: &plan.track,
        rows: plan.rows,
        cols: plan.cols,
        jackpot_slots: plan.jackpot,
        respin_slots: &plan.respin_slots,
        jackpot_pool: app.jackpot_pool(),
        config: ConfigEcho {
            bet_window_sec: config.bet_window_secs,
            spin_duration_sec: config.spin_duration_secs,
            normal_mult: config.normal_mult,
            jackpot_small_mult: config.jackpot_small_mult,
            jackpot_big_mult: config.jackpot_big_mult,
        },
    }
}

/// Runs a wager pushed over the socket and encodes the reply frame.
fn handle_client_text(app: &App, text: &str) -> Option<String> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!("Unparseable websocket message: {err}");
            return encode(&ErrorFrame {
                r#type: "error",
                request_id: None,
                code: "bad_message",
                message: "message could not be parsed".to_string(),
            });
        }
    };
    match message {
        ClientMessage::Bet {
            request_id,
            request,
        } => match app.place_bet(request) {
            Ok(receipt) => encode(&AckFrame {
                r#type: "ack",
                request_id,
                round_id: receipt.round_id,
                accepted: receipt.accepted,
                reused: receipt.reused,
                jackpot_pool: receipt.jackpot_pool,
            }),
            Err(rejection) => encode(&ErrorFrame {
                r#type: "error",
                request_id,
                code: rejection.code(),
                message: rejection.to_string(),
            }),
        },
    }
}

pub(super) async fn game_ws(
    AxumState(app): AxumState<Arc<App>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_game_ws(socket, app))
}

async fn handle_game_ws(socket: WebSocket, app: Arc<App>) {
    app.metrics().ws_connected();
    tracing::debug!("Game websocket connected");

    // Subscribe before snapshotting the init frame so no event can fall
    // between the snapshot and the live feed.
    let mut events = app.subscribe();
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            match timeout(ws_send_timeout(), sender.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    tracing::debug!("Websocket send failed, client disconnected");
                    break;
                }
                Err(_) => {
                    tracing::warn!("Websocket send timed out, closing connection");
                    break;
                }
            }
        }
        let _ = sender.close().await;
    });

    let init_sent = match encode(&init_frame(&app)) {
        Some(text) => {
            if enqueue(&out_tx, Message::Text(text)).is_err() {
                tracing::warn!("Failed to enqueue init frame, closing connection");
                false
            } else {
                app.metrics().inc_ws_messages();
                true
            }
        }
        None => false,
    };

    if init_sent {
        loop {
            tokio::select! {
                inbound = receiver.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            let Some(reply) = handle_client_text(&app, &text) else {
                                continue;
                            };
                            if enqueue(&out_tx, Message::Text(reply)).is_err() {
                                tracing::warn!("Failed to enqueue reply, closing connection");
                                break;
                            }
                            app.metrics().inc_ws_messages();
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if enqueue(&out_tx, Message::Pong(data)).is_err() {
                                tracing::warn!("Failed to enqueue pong, closing connection");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::debug!("Client closed websocket connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::debug!("Websocket error: {err}");
                            break;
                        }
                        None => break,
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            let Some(text) = encode(&event) else {
                                continue;
                            };
                            if enqueue(&out_tx, Message::Text(text)).is_err() {
                                tracing::warn!("Failed to enqueue event, closing connection");
                                break;
                            }
                            app.metrics().inc_ws_messages();
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("Websocket client lagged, skipped {skipped} events");
                            app.metrics().inc_ws_lagged(skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    }

    drop(out_tx);
    let _ = writer_handle.await;
    app.metrics().ws_disconnected();
    tracing::debug!("Game websocket disconnected");
}
