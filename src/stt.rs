//! Remote speech-to-text for voice messages.
//!
//! Posts the raw audio bytes to a Deepgram-style listen endpoint and pulls
//! the first alternative's transcript out of the response. Duration limits
//! are enforced by the caller before the audio is ever downloaded.

use crate::error::SttError;
use serde::Deserialize;

const LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Results,
}

#[derive(Debug, Deserialize)]
struct Results {
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

/// Transcribe one voice message. `mime` is the container type as the chat
/// platform reports it (Telegram voice notes are `audio/ogg`).
pub async fn transcribe(
    client: &reqwest::Client,
    api_key: &str,
    audio: Vec<u8>,
    mime: &str,
) -> Result<String, SttError> {
    let response = client
        .post(LISTEN_URL)
        .header("Authorization", format!("Token {api_key}"))
        .header("Content-Type", mime)
        .query(&[("model", "nova-2"), ("smart_format", "true")])
        .body(audio)
        .send()
        .await
        .map_err(|e| SttError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SttError::Request(format!("{status}: {body}")));
    }

    let body: ListenResponse = response
        .json()
        .await
        .map_err(|e| SttError::Malformed(e.to_string()))?;

    let transcript = body
        .results
        .channels
        .first()
        .and_then(|c| c.alternatives.first())
        .map(|a| a.transcript.trim())
        .ok_or_else(|| SttError::Malformed("no alternatives in response".into()))?;

    if transcript.is_empty() {
        return Err(SttError::Empty);
    }
    Ok(transcript.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn transcript_comes_from_the_first_alternative() {
        let json = indoc! {r#"
            {
                "results": {
                    "channels": [{
                        "alternatives": [
                            { "transcript": "create an issue for the login bug" },
                            { "transcript": "create an issue for the log in bug" }
                        ]
                    }]
                }
            }
        "#};
        let parsed: ListenResponse = serde_json::from_str(json).expect("should deserialize");
        assert_eq!(
            parsed.results.channels[0].alternatives[0].transcript,
            "create an issue for the login bug"
        );
    }

    #[test]
    fn empty_channel_list_deserializes() {
        let parsed: ListenResponse =
            serde_json::from_str(r#"{"results":{"channels":[]}}"#).expect("should deserialize");
        assert!(parsed.results.channels.is_empty());
    }
}
