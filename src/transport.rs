//! Chat platform transport seam.
//!
//! The delivery helper and progress tracker talk to the chat platform
//! through [`ChatTransport`] so their behavior (fallbacks, rate limiting,
//! terminal renders) can be exercised against an in-memory transport.
//! [`TelegramTransport`] is the production implementation.

use crate::error::TransportError;
use crate::{ChatRef, MessageHandle};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, MessageId, ParseMode};

/// Outbound message primitives the core needs from the platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one message; `rich` enables the platform's markup rendering.
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        rich: bool,
    ) -> Result<MessageHandle, TransportError>;

    /// Edit a previously sent message in place.
    async fn edit_message(
        &self,
        chat: ChatRef,
        handle: MessageHandle,
        text: &str,
        rich: bool,
    ) -> Result<(), TransportError>;

    /// Show the "typing" indicator.
    async fn send_typing(&self, chat: ChatRef) -> Result<(), TransportError>;
}

/// Production transport over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        rich: bool,
    ) -> Result<MessageHandle, TransportError> {
        let mut request = self.bot.send_message(ChatId(chat.0), text);
        if rich {
            request = request.parse_mode(ParseMode::Html);
        }
        let message = request.await.map_err(map_request_error)?;
        Ok(MessageHandle(message.id.0))
    }

    async fn edit_message(
        &self,
        chat: ChatRef,
        handle: MessageHandle,
        text: &str,
        rich: bool,
    ) -> Result<(), TransportError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat.0), MessageId(handle.0), text);
        if rich {
            request = request.parse_mode(ParseMode::Html);
        }
        request.await.map_err(map_request_error)?;
        Ok(())
    }

    async fn send_typing(&self, chat: ChatRef) -> Result<(), TransportError> {
        self.bot
            .send_chat_action(ChatId(chat.0), ChatAction::Typing)
            .await
            .map_err(map_request_error)?;
        Ok(())
    }
}

/// Map teloxide errors into the transport taxonomy. API-level rejections
/// keep their description text so [`TransportError::is_markup_rejection`]
/// can classify them; everything else is a plain network failure.
fn map_request_error(err: teloxide::RequestError) -> TransportError {
    match err {
        teloxide::RequestError::Api(api) => TransportError::Rejected {
            description: api.to_string(),
        },
        teloxide::RequestError::Network(net) if net.is_timeout() => TransportError::Timeout,
        other => TransportError::Network(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport that records calls and replays scripted results.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Send {
            chat: ChatRef,
            text: String,
            rich: bool,
        },
        Edit {
            chat: ChatRef,
            handle: MessageHandle,
            text: String,
            rich: bool,
        },
        Typing,
    }

    #[derive(Default)]
    pub struct RecordingTransport {
        calls: Mutex<Vec<Call>>,
        /// Scripted outcomes consumed by send/edit in call order; an empty
        /// queue means success.
        script: Mutex<VecDeque<Result<(), TransportError>>>,
        next_handle: AtomicI32,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(&self, outcomes: Vec<Result<(), TransportError>>) {
            *self.script.lock() = outcomes.into();
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub fn markup_rejection() -> TransportError {
            TransportError::Rejected {
                description: "Bad Request: can't parse entities: unsupported start tag \"xx\""
                    .into(),
            }
        }

        fn next_outcome(&self) -> Result<(), TransportError> {
            self.script.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send_message(
            &self,
            chat: ChatRef,
            text: &str,
            rich: bool,
        ) -> Result<MessageHandle, TransportError> {
            self.calls.lock().push(Call::Send {
                chat,
                text: text.to_string(),
                rich,
            });
            self.next_outcome()?;
            Ok(MessageHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1))
        }

        async fn edit_message(
            &self,
            chat: ChatRef,
            handle: MessageHandle,
            text: &str,
            rich: bool,
        ) -> Result<(), TransportError> {
            self.calls.lock().push(Call::Edit {
                chat,
                handle,
                text: text.to_string(),
                rich,
            });
            self.next_outcome()
        }

        async fn send_typing(&self, _chat: ChatRef) -> Result<(), TransportError> {
            self.calls.lock().push(Call::Typing);
            Ok(())
        }
    }
}
