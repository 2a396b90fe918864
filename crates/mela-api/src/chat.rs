use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use mela_types::api::{ChatHistoryQuery, Claims, SendChatRequest};
use mela_types::events::{GatewayEvent, Room};
use mela_types::models::{ChatMessage, SenderType, UserType};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

const DEFAULT_PAGE_SIZE: u32 = 50;

/// How long we give the AI service before giving up on an auto-reply.
const AI_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn get_messages(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<ChatHistoryQuery>,
) -> ApiResult<impl IntoResponse> {
    let messages = state.db.event_messages(
        event_id,
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        query.offset.unwrap_or(0),
    )?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<SendChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let text = req.message.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let sender_type = match state.db.user_by_id(claims.sub)?.map(|u| u.user_type) {
        Some(UserType::Organizer) => SenderType::Organizer,
        _ => SenderType::User,
    };

    let message =
        state
            .db
            .insert_chat_message(Uuid::new_v4(), claims.sub, event_id, &text, sender_type)?;

    broadcast_message(&state, &message);

    // Question-looking messages get a non-blocking AI auto-reply; failures
    // there never fail this request.
    if is_question(&text) && state.ai_service_url.is_some() {
        tokio::spawn(auto_reply(state.clone(), event_id, text));
    }

    Ok((StatusCode::CREATED, Json(message)))
}

fn broadcast_message(state: &AppState, message: &ChatMessage) {
    state.dispatcher.broadcast_to(
        Room::Event(message.event_id),
        GatewayEvent::MessageNew {
            id: message.id,
            user_id: message.user_id,
            event_id: message.event_id,
            message: message.message.clone(),
            sender_type: message.sender_type,
            user_name: message.user_name.clone(),
            created_at: message.created_at,
        },
    );
}

/// Crude question detector, mirroring what the chat clients expect to
/// trigger the assistant: a question mark anywhere, or an interrogative
/// lead-in.
pub fn is_question(message: &str) -> bool {
    let lower = message.trim().to_lowercase();
    const LEAD_INS: [&str; 8] = ["what", "when", "where", "how", "why", "is", "can", "does"];
    lower.contains('?') || LEAD_INS.iter().any(|lead| lower.starts_with(lead))
}

#[derive(Serialize)]
struct AiChatRequest<'a> {
    message: &'a str,
    event_id: Uuid,
}

#[derive(Deserialize)]
struct AiChatReply {
    reply: Option<String>,
}

/// Fire-and-forget call to the AI service. Every failure path logs and
/// returns; the user's message already went out.
async fn auto_reply(state: AppState, event_id: Uuid, message: String) {
    let Some(base_url) = state.ai_service_url.as_deref() else {
        return;
    };

    let response = state
        .http
        .post(format!("{}/chat", base_url.trim_end_matches('/')))
        .timeout(AI_TIMEOUT)
        .json(&AiChatRequest {
            message: &message,
            event_id,
        })
        .send()
        .await;

    let reply = match response {
        Ok(resp) if resp.status().is_success() => match resp.json::<AiChatReply>().await {
            Ok(AiChatReply { reply: Some(reply) }) if !reply.trim().is_empty() => reply,
            Ok(_) => return,
            Err(e) => {
                debug!("AI service returned an unreadable body: {}", e);
                return;
            }
        },
        Ok(resp) => {
            debug!("AI service answered {}", resp.status());
            return;
        }
        Err(e) => {
            debug!("AI service not available: {}", e);
            return;
        }
    };

    match state.db.insert_bot_message(Uuid::new_v4(), event_id, &reply) {
        Ok(bot_message) => broadcast_message(&state, &bot_message),
        Err(e) => warn!("Could not save AI message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::is_question;

    #[test]
    fn question_marks_and_lead_ins_trigger_the_assistant() {
        assert!(is_question("when does the show start"));
        assert!(is_question("Is parking available?"));
        assert!(is_question("the venue is WHERE exactly?"));
        assert!(is_question("Can I bring my dog"));
    }

    #[test]
    fn statements_do_not() {
        assert!(!is_question("see you all there"));
        assert!(!is_question("great lineup this year"));
    }
}
