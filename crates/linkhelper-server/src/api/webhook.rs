//! Telegram webhook ingress.
//!
//! Only the handful of `Update` fields the bot reads are modelled. Anything
//! that parses as an update is acknowledged with `200`, even when it is
//! ignored, so Telegram never redelivers it.

use axum::{body::Bytes, extract::State, Extension, Json};
use linkhelper_core::{ChatRef, FormattedReply, ResolutionJob};
use linkhelper_scraper::pattern::first_url;
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatchError;
use crate::middleware::RequestId;
use crate::transport::deliver;

use super::{ApiError, AppState};

pub(super) const HELP_MESSAGE: &str = "Hi! I am your Link Helper Bot.\n\nSend me a Wishlink URL and I'll fetch the product links for you.";

pub(super) const PROCESSING_MESSAGE: &str = "Processing... Please wait. ⏳";

pub(super) const NO_LINK_MESSAGE: &str =
    "Please send me a link. It should start with http:// or https://.";

pub(super) const BUSY_MESSAGE: &str =
    "I'm handling a lot of links right now. Please try again in a minute.";

#[derive(Debug, Deserialize)]
pub(super) struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    chat: IncomingChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingChat {
    id: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct WebhookAck {
    ok: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Help,
    NoLink,
    Link(String),
}

fn is_command(token: &str, name: &str) -> bool {
    token
        .strip_prefix('/')
        .map(|cmd| cmd.split_once('@').map_or(cmd, |(cmd, _bot)| cmd))
        .is_some_and(|cmd| cmd.eq_ignore_ascii_case(name))
}

fn classify(text: &str) -> Inbound {
    let text = text.trim();
    let first = text.split_whitespace().next().unwrap_or_default();
    if is_command(first, "start") || is_command(first, "help") {
        return Inbound::Help;
    }
    first_url(text).map_or(Inbound::NoLink, Inbound::Link)
}

pub(super) async fn receive_update(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let update: Update = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(request_id = %req_id.0, error = %e, "rejecting malformed update");
        ApiError::new(req_id.0.clone(), "bad_request", format!("invalid update: {e}"))
    })?;

    handle_update(&state, update).await;
    Ok(Json(WebhookAck { ok: true }))
}

async fn handle_update(state: &AppState, update: Update) {
    let Some(message) = update.message else {
        tracing::debug!(update_id = update.update_id, "ignoring update without message");
        return;
    };
    let Some(text) = message.text.as_deref() else {
        tracing::debug!(update_id = update.update_id, "ignoring message without text");
        return;
    };
    let chat = ChatRef(message.chat.id);

    let source_url = match classify(text) {
        Inbound::Help => {
            reply(state, chat, &FormattedReply::plain(HELP_MESSAGE)).await;
            return;
        }
        Inbound::NoLink => {
            reply(state, chat, &FormattedReply::plain(NO_LINK_MESSAGE)).await;
            return;
        }
        Inbound::Link(url) => url,
    };

    let placeholder = match state
        .transport
        .send(chat, &FormattedReply::plain(PROCESSING_MESSAGE))
        .await
    {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(chat_id = chat.0, error = %e, "failed to send placeholder");
            None
        }
    };

    let job = ResolutionJob::new(chat, source_url).with_placeholder(placeholder);
    let url = job.source_url.clone();
    match state.dispatcher.submit(job) {
        Ok(()) => tracing::info!(chat_id = chat.0, url = %url, "job queued"),
        Err(e) => {
            match e {
                DispatchError::QueueFull => {
                    tracing::warn!(chat_id = chat.0, url = %url, "job queue full, rejecting");
                }
                DispatchError::Closed => {
                    tracing::warn!(chat_id = chat.0, url = %url, "job queue closed, rejecting");
                }
            }
            let busy = FormattedReply::plain(BUSY_MESSAGE);
            if let Err(e) = deliver(state.transport.as_ref(), chat, placeholder, &busy).await {
                tracing::warn!(chat_id = chat.0, error = %e, "failed to send busy reply");
            }
        }
    }
}

async fn reply(state: &AppState, chat: ChatRef, reply: &FormattedReply) {
    if let Err(e) = state.transport.send(chat, reply).await {
        tracing::warn!(chat_id = chat.0, error = %e, "failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_help_commands_are_recognised() {
        assert_eq!(classify("/start"), Inbound::Help);
        assert_eq!(classify("  /help  "), Inbound::Help);
        assert_eq!(classify("/start@linkhelper_bot"), Inbound::Help);
        assert_eq!(classify("/HELP"), Inbound::Help);
    }

    #[test]
    fn unknown_command_without_link_asks_for_one() {
        assert_eq!(classify("/settings"), Inbound::NoLink);
        assert_eq!(classify("hello there"), Inbound::NoLink);
        assert_eq!(classify(""), Inbound::NoLink);
    }

    #[test]
    fn first_link_in_text_is_taken() {
        assert_eq!(
            classify("look at https://www.wishlink.com/a/post/1, and https://x.test"),
            Inbound::Link("https://www.wishlink.com/a/post/1".to_owned())
        );
    }

    #[test]
    fn command_must_be_the_first_word() {
        assert_eq!(
            classify("see /start https://wishlink.com/share/x"),
            Inbound::Link("https://wishlink.com/share/x".to_owned())
        );
    }

    #[test]
    fn update_without_message_parses() {
        let update: Update = serde_json::from_str(r#"{"update_id": 5}"#).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn update_id_is_required() {
        assert!(serde_json::from_str::<Update>(r#"{"message": null}"#).is_err());
    }
}
