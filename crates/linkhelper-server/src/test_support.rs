//! Test doubles shared by the dispatcher and route tests.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use linkhelper_core::{ChatRef, FormattedReply, MessageRef};

use crate::transport::{ChatTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Delivered {
    Sent { chat: i64, text: String },
    Edited { chat: i64, message: i32, text: String },
}

impl Delivered {
    pub(crate) fn chat(&self) -> i64 {
        match self {
            Delivered::Sent { chat, .. } | Delivered::Edited { chat, .. } => *chat,
        }
    }

    pub(crate) fn text(&self) -> &str {
        match self {
            Delivered::Sent { text, .. } | Delivered::Edited { text, .. } => text,
        }
    }
}

/// Records every outbound message. Sends get increasing message ids
/// starting at 100. With `fail_sends` set every send errors.
#[derive(Debug)]
pub(crate) struct RecordingTransport {
    log: Mutex<Vec<Delivered>>,
    next_id: AtomicI32,
    fail_sends: bool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(100),
            fail_sends: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    pub(crate) fn delivered(&self) -> Vec<Delivered> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(
        &self,
        chat: ChatRef,
        reply: &FormattedReply,
    ) -> Result<MessageRef, TransportError> {
        if self.fail_sends {
            return Err(TransportError::Client("send disabled".to_owned()));
        }
        self.log.lock().unwrap().push(Delivered::Sent {
            chat: chat.0,
            text: reply.text.clone(),
        });
        Ok(MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit(
        &self,
        chat: ChatRef,
        message: MessageRef,
        reply: &FormattedReply,
    ) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(Delivered::Edited {
            chat: chat.0,
            message: message.0,
            text: reply.text.clone(),
        });
        Ok(())
    }
}
