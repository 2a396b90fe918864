use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::mpsc;
use tracing::{info, warn};

use mela_db::Database;
use mela_types::api::Claims;
use mela_types::events::{GatewayCommand, GatewayEvent, Room};

use crate::dispatcher::{Dispatcher, should_deliver};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a single WebSocket connection. The first frame must be an
/// `identify` command carrying a valid bearer JWT; anything else closes the
/// connection.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let claims = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(claims) => claims,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };
    let user_id = claims.sub;

    info!("{} ({}) connected to gateway", claims.email, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        email: claims.email.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    // Rooms this connection joined; shared between the send task (filtering)
    // and the receive loop (membership changes).
    let rooms: Arc<std::sync::RwLock<HashSet<Room>>> =
        Arc::new(std::sync::RwLock::new(HashSet::new()));
    let send_rooms = rooms.clone();

    // Direct replies (errors) bypass the broadcast channel.
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let mut broadcast_rx = dispatcher.subscribe();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts and direct replies to the client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    {
                        let rooms = send_rooms.read().expect("room lock poisoned");
                        if !should_deliver(&rooms, &msg) {
                            continue;
                        }
                    }

                    if send_event(&mut sender, &msg.event).await.is_err() {
                        break;
                    }
                }
                result = direct_rx.recv() => {
                    let Some(event) = result else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let recv_dispatcher = dispatcher.clone();
    let recv_rooms = rooms.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let command: GatewayCommand = match serde_json::from_str(&text) {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            warn!("Unparseable gateway command from {}: {}", user_id, e);
                            continue;
                        }
                    };
                    handle_command(
                        command,
                        user_id,
                        &recv_dispatcher,
                        &recv_rooms,
                        &db,
                        &direct_tx,
                    )
                    .await;
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} disconnected from gateway", user_id);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).expect("gateway event serializes");
    sender.send(Message::Text(text.into())).await
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Claims> {
    let msg = receiver.next().await?.ok()?;
    let Message::Text(text) = msg else {
        return None;
    };
    let command: GatewayCommand = serde_json::from_str(&text).ok()?;
    let GatewayCommand::Identify { token } = command else {
        return None;
    };

    decode::<Claims>(
        &token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

async fn handle_command(
    command: GatewayCommand,
    user_id: uuid::Uuid,
    dispatcher: &Dispatcher,
    rooms: &Arc<std::sync::RwLock<HashSet<Room>>>,
    db: &Arc<Database>,
    direct_tx: &mpsc::UnboundedSender<GatewayEvent>,
) {
    match command {
        GatewayCommand::Identify { .. } => {
            // Already authenticated; ignore repeats.
        }
        GatewayCommand::JoinEvent { event_id } => {
            rooms
                .write()
                .expect("room lock poisoned")
                .insert(Room::Event(event_id));
            dispatcher.broadcast_to(
                Room::Event(event_id),
                GatewayEvent::UserJoined {
                    event_id,
                    user_id,
                    timestamp: Utc::now(),
                },
            );
        }
        GatewayCommand::LeaveEvent { event_id } => {
            rooms
                .write()
                .expect("room lock poisoned")
                .remove(&Room::Event(event_id));
            dispatcher.broadcast_to(
                Room::Event(event_id),
                GatewayEvent::UserLeft { event_id, user_id },
            );
        }
        GatewayCommand::SubscribeEvents => {
            rooms
                .write()
                .expect("room lock poisoned")
                .insert(Room::EventsFeed);
        }
        GatewayCommand::UnsubscribeEvents => {
            rooms
                .write()
                .expect("room lock poisoned")
                .remove(&Room::EventsFeed);
        }
        GatewayCommand::SubscribeRides => {
            rooms
                .write()
                .expect("room lock poisoned")
                .insert(Room::RidesFeed);
        }
        GatewayCommand::SendMessage { event_id, message } => {
            // Same persistence path as the REST handler, minus the AI hook.
            let db = db.clone();
            let result = tokio::task::spawn_blocking(move || {
                let sender_type = db
                    .user_by_id(user_id)?
                    .map(|u| match u.user_type {
                        mela_types::models::UserType::Organizer => {
                            mela_types::models::SenderType::Organizer
                        }
                        _ => mela_types::models::SenderType::User,
                    })
                    .unwrap_or(mela_types::models::SenderType::User);
                db.insert_chat_message(
                    uuid::Uuid::new_v4(),
                    user_id,
                    event_id,
                    message.trim(),
                    sender_type,
                )
            })
            .await;

            match result {
                Ok(Ok(msg)) => {
                    dispatcher.broadcast_to(
                        Room::Event(event_id),
                        GatewayEvent::MessageNew {
                            id: msg.id,
                            user_id: msg.user_id,
                            event_id: msg.event_id,
                            message: msg.message,
                            sender_type: msg.sender_type,
                            user_name: msg.user_name,
                            created_at: msg.created_at,
                        },
                    );
                }
                Ok(Err(e)) => {
                    warn!("Gateway message persist failed: {}", e);
                    let _ = direct_tx.send(GatewayEvent::Error {
                        message: "Failed to send message".into(),
                    });
                }
                Err(e) => warn!("spawn_blocking join error: {}", e),
            }
        }
        GatewayCommand::UpdateEventStatus {
            event_id,
            status,
            current_attendance,
        } => {
            let db = db.clone();
            let result = tokio::task::spawn_blocking(move || {
                db.set_event_status(event_id, status, current_attendance)
            })
            .await;

            match result {
                Ok(Ok(true)) => {
                    dispatcher.broadcast_to(
                        Room::Event(event_id),
                        GatewayEvent::EventStatusChanged {
                            event_id,
                            status,
                            current_attendance,
                            timestamp: Utc::now(),
                        },
                    );
                }
                Ok(Ok(false)) => {
                    let _ = direct_tx.send(GatewayEvent::Error {
                        message: "Event not found".into(),
                    });
                }
                Ok(Err(e)) => warn!("Gateway status update failed: {}", e),
                Err(e) => warn!("spawn_blocking join error: {}", e),
            }
        }
    }
}
