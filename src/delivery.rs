//! Outbound message delivery with a plain-text fallback.
//!
//! Every outbound text goes out with rich markup first. When the platform
//! rejects the payload specifically because it could not parse the markup,
//! the identical text is resent once with rendering disabled. Any other
//! failure propagates to the caller untouched.

use crate::chunk::{MAX_MESSAGE_LEN, chunk_markup};
use crate::error::TransportError;
use crate::transport::ChatTransport;
use crate::{ChatRef, MessageHandle};

/// Send one message, falling back to plain text on a markup rejection.
pub async fn deliver(
    transport: &dyn ChatTransport,
    chat: ChatRef,
    text: &str,
) -> Result<MessageHandle, TransportError> {
    match transport.send_message(chat, text, true).await {
        Ok(handle) => Ok(handle),
        Err(err) if err.is_markup_rejection() => {
            tracing::warn!(error = %err, "rich send rejected, retrying as plain text");
            transport.send_message(chat, text, false).await
        }
        Err(err) => Err(err),
    }
}

/// Split converted markup into platform-sized chunks and deliver each.
/// Stops at the first non-recoverable failure.
pub async fn deliver_all(
    transport: &dyn ChatTransport,
    chat: ChatRef,
    text: &str,
) -> Result<(), TransportError> {
    for piece in chunk_markup(text, MAX_MESSAGE_LEN) {
        if piece.trim().is_empty() {
            continue;
        }
        deliver(transport, chat, &piece).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Call, RecordingTransport};

    const CHAT: ChatRef = ChatRef(77);

    #[tokio::test]
    async fn successful_rich_send_makes_one_call() {
        let transport = RecordingTransport::new();
        let handle = deliver(&transport, CHAT, "<b>hi</b>")
            .await
            .expect("send should succeed");

        assert_eq!(handle, MessageHandle(1));
        assert_eq!(
            transport.calls(),
            vec![Call::Send {
                chat: CHAT,
                text: "<b>hi</b>".into(),
                rich: true,
            }]
        );
    }

    #[tokio::test]
    async fn markup_rejection_retries_identical_text_plain() {
        let transport = RecordingTransport::new();
        transport.script(vec![Err(RecordingTransport::markup_rejection()), Ok(())]);

        deliver(&transport, CHAT, "<b>broken").await.expect("fallback should succeed");

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            Call::Send {
                chat: CHAT,
                text: "<b>broken".into(),
                rich: false,
            }
        );
    }

    #[tokio::test]
    async fn unrelated_error_propagates_after_one_call() {
        let transport = RecordingTransport::new();
        transport.script(vec![Err(TransportError::Network("connection reset".into()))]);

        let err = deliver(&transport, CHAT, "hello").await.expect_err("must propagate");

        assert!(matches!(err, TransportError::Network(_)));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn long_text_goes_out_as_multiple_sends() {
        let transport = RecordingTransport::new();
        let text = "line of reply text\n".repeat(400);

        deliver_all(&transport, CHAT, &text).await.expect("all chunks should send");

        let calls = transport.calls();
        assert!(calls.len() >= 2);
        for call in calls {
            match call {
                Call::Send { text, .. } => assert!(text.chars().count() <= MAX_MESSAGE_LEN),
                other => panic!("unexpected call: {other:?}"),
            }
        }
    }
}
