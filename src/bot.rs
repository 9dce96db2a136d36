//! Telegram front end.
//!
//! One dispatcher with a message branch and a callback branch. Text from
//! the allowed user is routed through the command layer; voice messages
//! are transcribed and parked in the pending store until a confirmation
//! button is pressed. Everything outbound goes through the converter,
//! chunker and delivery helper.

use crate::commands::{self, Parsed, Services};
use crate::config::{Config, SttConfig};
use crate::delivery::deliver;
use crate::error::Error;
use crate::markup::{self, ConvertOptions};
use crate::pending::PendingCommands;
use crate::progress::Progress;
use crate::transport::{ChatTransport, TelegramTransport};
use crate::{stt, ChatRef};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, MaybeInaccessibleMessage,
};

const CONFIRM_PREFIX: &str = "vc";
const DISCARD_PREFIX: &str = "vx";

/// Long-lived bot state shared across handler invocations.
pub struct IssueBot {
    bot: Bot,
    transport: Arc<dyn ChatTransport>,
    services: Services,
    pending: Arc<PendingCommands>,
    http: reqwest::Client,
    bot_token: String,
    allowed_user_id: u64,
    stt: Option<SttConfig>,
    progress_enabled: bool,
    min_edit_interval: Duration,
}

impl IssueBot {
    pub fn new(
        bot: Bot,
        services: Services,
        pending: Arc<PendingCommands>,
        http: reqwest::Client,
        config: &Config,
    ) -> Self {
        let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));
        Self {
            bot,
            transport,
            services,
            pending,
            http,
            bot_token: config.bot_token.clone(),
            allowed_user_id: config.allowed_user_id,
            stt: config.stt.clone(),
            progress_enabled: config.delivery.progress_enabled,
            min_edit_interval: config.delivery.min_edit_interval,
        }
    }

    /// Register the command menu and run the dispatcher until shutdown.
    pub async fn run(self: Arc<Self>) {
        if let Err(error) = self.bot.set_my_commands(command_menu()).await {
            tracing::warn!(%error, "failed to register command menu");
        }

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let app = Arc::clone(&self);
                move |msg: Message| {
                    let app = Arc::clone(&app);
                    async move {
                        app.handle_message(msg).await;
                        respond(())
                    }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let app = Arc::clone(&self);
                move |q: CallbackQuery| {
                    let app = Arc::clone(&app);
                    async move {
                        app.handle_callback(q).await;
                        respond(())
                    }
                }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_message(&self, msg: Message) {
        let Some(user) = &msg.from else { return };
        let chat = ChatRef(msg.chat.id.0);

        if user.id.0 != self.allowed_user_id {
            tracing::warn!(user_id = user.id.0, "message from unauthorized user");
            return;
        }

        if let Some(text) = msg.text() {
            let text = text.to_string();
            self.handle_text(chat, &text).await;
        } else if let Some(voice) = msg.voice() {
            let file_id = voice.file.id.clone();
            let duration = voice.duration.seconds() as u64;
            self.handle_voice(chat, user.id.0, file_id, duration).await;
        }
    }

    async fn handle_text(&self, chat: ChatRef, text: &str) {
        if let Err(error) = self.transport.send_typing(chat).await {
            tracing::debug!(%error, "typing indicator failed");
        }

        let mut progress = self.progress_for(chat, text);
        progress.start().await;

        let session = chat.0.to_string();
        match self.services.respond(text, &session, &mut progress).await {
            Ok(reply) => self.finish(chat, &mut progress, &reply).await,
            Err(error) => {
                let notice = commands::render_error(&error);
                progress.error(&notice).await;
                if matches!(progress, Progress::Disabled) {
                    if let Err(error) = deliver(self.transport.as_ref(), chat, &notice).await {
                        tracing::warn!(%error, "error notice delivery failed");
                    }
                }
            }
        }
    }

    /// Convert, chunk and send a successful reply. The progress message
    /// becomes the first chunk; remaining chunks go out as fresh sends.
    async fn finish(&self, chat: ChatRef, progress: &mut Progress, reply: &str) {
        let converted = markup::convert(reply, &ConvertOptions::default());
        if converted.is_empty() {
            progress.complete("Done.").await;
            return;
        }

        let chunks = crate::chunk::chunk_markup(&converted, crate::chunk::MAX_MESSAGE_LEN);
        let mut chunks = chunks.into_iter();

        if let Some(first) = chunks.next() {
            match progress {
                Progress::Live(_) => progress.complete(&first).await,
                Progress::Disabled => {
                    if let Err(error) = deliver(self.transport.as_ref(), chat, &first).await {
                        tracing::warn!(%error, "reply delivery failed");
                        return;
                    }
                }
            }
        }

        for piece in chunks {
            if let Err(error) = deliver(self.transport.as_ref(), chat, &piece).await {
                tracing::warn!(%error, "reply continuation delivery failed");
                return;
            }
        }
    }

    async fn handle_voice(&self, chat: ChatRef, caller_id: u64, file_id: teloxide::types::FileId, duration_secs: u64) {
        let Some(stt) = &self.stt else {
            self.notify(chat, "Voice messages are not enabled for this bot.")
                .await;
            return;
        };

        if Duration::from_secs(duration_secs) > stt.max_duration {
            self.notify(
                chat,
                &format!(
                    "That voice message is too long ({duration_secs}s). \
                     The limit is {}s.",
                    stt.max_duration.as_secs()
                ),
            )
            .await;
            return;
        }

        let transcript = match self.transcribe_voice(&stt.api_key, file_id).await {
            Ok(t) => t,
            Err(error) => {
                tracing::warn!(%error, "voice transcription failed");
                self.notify(chat, "I couldn't transcribe that voice message.")
                    .await;
                return;
            }
        };

        let token = self.pending.store(caller_id, &transcript);
        let keyboard = InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("Run it", format!("{CONFIRM_PREFIX}:{token}")),
            InlineKeyboardButton::callback("Discard", format!("{DISCARD_PREFIX}:{token}")),
        ]]);

        let prompt = confirmation_prompt(&transcript);
        if let Err(error) = self
            .bot
            .send_message(ChatId(chat.0), prompt)
            .parse_mode(teloxide::types::ParseMode::Html)
            .reply_markup(keyboard)
            .await
        {
            tracing::warn!(%error, "confirmation prompt failed");
        }
    }

    async fn transcribe_voice(
        &self,
        api_key: &str,
        file_id: teloxide::types::FileId,
    ) -> Result<String, Error> {
        let file = self
            .bot
            .get_file(file_id)
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("get_file failed: {e}")))?;

        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot_token, file.path
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("voice download failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("voice download failed: {e}")))?;

        let transcript =
            stt::transcribe(&self.http, api_key, bytes.to_vec(), "audio/ogg").await?;
        Ok(transcript)
    }

    async fn handle_callback(&self, q: CallbackQuery) {
        if q.from.id.0 != self.allowed_user_id {
            tracing::warn!(user_id = q.from.id.0, "callback from unauthorized user");
            let _ = self.bot.answer_callback_query(q.id).await;
            return;
        }

        let Some(data) = q.data.as_deref() else { return };
        let Some((prefix, token)) = data.split_once(':') else {
            return;
        };

        match prefix {
            CONFIRM_PREFIX => {
                let chat = match &q.message {
                    Some(MaybeInaccessibleMessage::Regular(m)) => Some(ChatRef(m.chat.id.0)),
                    _ => None,
                };
                match confirmed_command(&self.pending, token, chat) {
                    Some((chat, command)) => {
                        let _ = self.bot.answer_callback_query(q.id).text("Running…").await;
                        if let Some(MaybeInaccessibleMessage::Regular(m)) = q.message {
                            let _ = self
                                .bot
                                .edit_message_text(m.chat.id, m.id, format!("▶️ {}", command.text))
                                .await;
                        }
                        self.handle_text(chat, &command.text).await;
                    }
                    None => {
                        let _ = self
                            .bot
                            .answer_callback_query(q.id)
                            .text("That command has expired.")
                            .await;
                    }
                }
            }
            DISCARD_PREFIX => {
                // Consume regardless of expiry so the entry is gone either way.
                let _ = self.pending.consume(token);
                let _ = self.bot.answer_callback_query(q.id).text("Discarded.").await;
                if let Some(MaybeInaccessibleMessage::Regular(m)) = q.message {
                    let _ = self
                        .bot
                        .edit_message_text(m.chat.id, m.id, "Discarded.")
                        .await;
                }
            }
            _ => {}
        }
    }

    /// Progress is skipped for inputs answered without touching any
    /// remote service.
    fn progress_for(&self, chat: ChatRef, text: &str) -> Progress {
        use crate::commands::Command;
        let trivial = matches!(
            commands::parse(text),
            Parsed::Invalid(_) | Parsed::Command(Command::Start) | Parsed::Command(Command::Help)
        );
        if trivial || !self.progress_enabled {
            Progress::disabled()
        } else {
            Progress::live(Arc::clone(&self.transport), chat, self.min_edit_interval)
        }
    }

    async fn notify(&self, chat: ChatRef, text: &str) {
        if let Err(error) = deliver(self.transport.as_ref(), chat, text).await {
            tracing::warn!(%error, "notice delivery failed");
        }
    }

    /// Spawn the periodic pending-command sweep.
    pub fn spawn_sweeper(pending: Arc<PendingCommands>, every: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = pending.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "swept expired pending commands");
                }
            }
        });
    }
}

/// Resolve a confirm tap. The token is consumed only once a usable chat
/// is in hand; an inaccessible origin message leaves the entry parked so
/// the command is not lost without ever running.
fn confirmed_command(
    pending: &PendingCommands,
    token: &str,
    chat: Option<ChatRef>,
) -> Option<(ChatRef, crate::pending::PendingCommand)> {
    let chat = chat?;
    pending.consume(token).map(|command| (chat, command))
}

/// The transcript is untrusted text going into an HTML-parse-mode
/// message, so it must be escaped or the platform rejects the prompt.
fn confirmation_prompt(transcript: &str) -> String {
    format!(
        "I heard:\n\n<i>{}</i>\n\nRun this?",
        escape_html(transcript)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn command_menu() -> Vec<BotCommand> {
    vec![
        BotCommand::new("issues", "Your open issues"),
        BotCommand::new("issue", "Show one issue"),
        BotCommand::new("create", "Open a new issue"),
        BotCommand::new("comment", "Comment on an issue"),
        BotCommand::new("prs", "Open pull requests"),
        BotCommand::new("tasks", "Recent background jobs"),
        BotCommand::new("run", "Dispatch a background job"),
        BotCommand::new("help", "Command list"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::CannedAgent;
    use crate::config::TrackerConfig;
    use crate::delivery::deliver_all;
    use crate::tracker::IssueTracker;
    use crate::transport::testing::{Call, RecordingTransport};

    const CHAT: ChatRef = ChatRef(9);

    fn services(agent: Arc<CannedAgent>) -> Services {
        Services {
            tracker: IssueTracker::new(
                reqwest::Client::new(),
                TrackerConfig {
                    base_url: "http://localhost:1".into(),
                    api_key: "unused".into(),
                },
            ),
            forge: None,
            runner: None,
            agent,
        }
    }

    #[tokio::test]
    async fn chat_reply_is_converted_and_delivered() {
        let transport = Arc::new(RecordingTransport::new());
        let agent = Arc::new(CannedAgent::new(vec![
            "<p>The deploy <b>succeeded</b> at noon.</p>",
        ]));
        let services = services(Arc::clone(&agent));

        let mut progress = Progress::disabled();
        let reply = services
            .respond("how did the deploy go?", "9", &mut progress)
            .await
            .expect("agent reply");
        let converted = markup::convert(&reply, &ConvertOptions::default());
        deliver_all(transport.as_ref() as &dyn ChatTransport, CHAT, &converted)
            .await
            .expect("delivery");

        assert_eq!(agent.prompts.lock().as_slice(), ["how did the deploy go?"]);
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let Call::Send { text, rich, .. } = &calls[0] else {
            panic!("expected a send");
        };
        assert!(*rich);
        // Converter output: tags kept, glyph injected on the positive word.
        assert!(text.contains("<b>✅ succeeded</b>"));
    }

    #[tokio::test]
    async fn progress_placeholder_becomes_the_reply() {
        let transport = Arc::new(RecordingTransport::new());
        let agent = Arc::new(CannedAgent::new(vec!["<p>All quiet.</p>"]));
        let services = services(Arc::clone(&agent));

        let mut progress = Progress::live(
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            CHAT,
            Duration::from_secs(60),
        );
        progress.start().await;
        let reply = services
            .respond("anything new?", "9", &mut progress)
            .await
            .expect("agent reply");
        let converted = markup::convert(&reply, &ConvertOptions::default());
        progress.complete(&converted).await;

        let calls = transport.calls();
        assert!(matches!(&calls[0], Call::Send { .. }));
        assert!(matches!(
            calls.last(),
            Some(Call::Edit { text, .. }) if text.contains("All quiet.")
        ));
    }

    #[test]
    fn confirmation_prompt_escapes_markup_in_the_transcript() {
        let prompt = confirmation_prompt("set priority < 2 & notify <ops>");
        assert!(prompt.contains("set priority &lt; 2 &amp; notify &lt;ops&gt;"));
        assert!(!prompt.contains("<ops>"));
        // The prompt's own formatting survives the escaping.
        assert!(prompt.starts_with("I heard:\n\n<i>"));
        assert!(prompt.ends_with("</i>\n\nRun this?"));
    }

    #[test]
    fn confirm_without_a_usable_chat_leaves_the_token_parked() {
        let pending = PendingCommands::new(Duration::from_secs(300));
        let token = pending.store(42, "run the deploy task");

        assert!(confirmed_command(&pending, &token, None).is_none());

        // The entry survived and resolves once a chat is available.
        let (chat, command) =
            confirmed_command(&pending, &token, Some(CHAT)).expect("token should still resolve");
        assert_eq!(chat, CHAT);
        assert_eq!(command.text, "run the deploy task");
    }

    #[test]
    fn command_menu_covers_every_routable_command() {
        let names: Vec<_> = command_menu().into_iter().map(|c| c.command).collect();
        for expected in ["issues", "issue", "create", "comment", "prs", "tasks", "run", "help"] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }
}
