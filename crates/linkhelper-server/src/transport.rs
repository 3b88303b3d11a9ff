//! Outbound chat transport.
//!
//! The dispatcher and the webhook only see [`ChatTransport`]; the Telegram
//! implementation lives behind it so tests can record replies instead.

use std::time::Duration;

use async_trait::async_trait;
use linkhelper_core::{ChatRef, FormatMode, FormattedReply, MessageRef};
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] RequestError),

    #[error("failed to build telegram client: {0}")]
    Client(String),
}

/// Sends and edits chat messages.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `reply` as a new message and returns its reference.
    async fn send(&self, chat: ChatRef, reply: &FormattedReply)
        -> Result<MessageRef, TransportError>;

    /// Replaces the text of a message sent earlier.
    async fn edit(
        &self,
        chat: ChatRef,
        message: MessageRef,
        reply: &FormattedReply,
    ) -> Result<(), TransportError>;
}

/// [`ChatTransport`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Builds a bot handle with a bounded idle connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the HTTP client cannot be built.
    pub fn new(token: &str, pool_max_idle: usize) -> Result<Self, TransportError> {
        let client = teloxide::net::default_reqwest_settings()
            .pool_max_idle_per_host(pool_max_idle)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            bot: Bot::with_client(token, client),
        })
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(
        &self,
        chat: ChatRef,
        reply: &FormattedReply,
    ) -> Result<MessageRef, TransportError> {
        let chat_id = ChatId(chat.0);

        if reply.mode == Some(FormatMode::Html) {
            match self
                .bot
                .send_message(chat_id, reply.text.as_str())
                .parse_mode(ParseMode::Html)
                .await
            {
                Ok(message) => return Ok(MessageRef(message.id.0)),
                Err(e) if !markup_rejected(&e) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        chat_id = chat.0,
                        error = %e,
                        "telegram HTML send failed, retrying as plain text"
                    );
                }
            }
        }

        let message = self.bot.send_message(chat_id, reply.text.as_str()).await?;
        Ok(MessageRef(message.id.0))
    }

    async fn edit(
        &self,
        chat: ChatRef,
        message: MessageRef,
        reply: &FormattedReply,
    ) -> Result<(), TransportError> {
        let chat_id = ChatId(chat.0);
        let message_id = MessageId(message.0);

        if reply.mode == Some(FormatMode::Html) {
            match self
                .bot
                .edit_message_text(chat_id, message_id, reply.text.as_str())
                .parse_mode(ParseMode::Html)
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) if is_message_not_modified(&e) => return Ok(()),
                Err(e) if !markup_rejected(&e) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        chat_id = chat.0,
                        message_id = message.0,
                        error = %e,
                        "telegram HTML edit failed, retrying as plain text"
                    );
                }
            }
        }

        match self
            .bot
            .edit_message_text(chat_id, message_id, reply.text.as_str())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_message_not_modified(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Replaces `placeholder` with `reply` when there is one, otherwise sends
/// `reply` as a new message.
///
/// # Errors
///
/// Returns whatever the transport returned; callers log it.
pub async fn deliver(
    transport: &dyn ChatTransport,
    chat: ChatRef,
    placeholder: Option<MessageRef>,
    reply: &FormattedReply,
) -> Result<(), TransportError> {
    match placeholder {
        Some(message) => transport.edit(chat, message, reply).await,
        None => transport.send(chat, reply).await.map(|_| ()),
    }
}

fn is_message_not_modified(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}

/// Telegram refused the request outright. Network and I/O failures may
/// already have been delivered and are never re-sent.
fn markup_rejected(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(_))
}
