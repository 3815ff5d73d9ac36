//! Prints chat actions to a terminal.

use async_trait::async_trait;
use parlance_conversation::{ActionType, ChatAction};
use parlance_dialog::{BotClient, ClientError};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::trace;

/// A [`BotClient`] that writes each action as one block of text.
///
/// Delays are slept through unless the bot was built with
/// [`without_delays`](Self::without_delays). The choices of the latest
/// question are remembered so numeric replies can pick one.
pub struct TerminalBot<W> {
    out: Mutex<W>,
    honor_delays: bool,
    last_choices: StdMutex<Vec<String>>,
}

impl TerminalBot<tokio::io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> TerminalBot<W> {
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            honor_delays: true,
            last_choices: StdMutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.honor_delays = false;
        self
    }

    /// Choices offered by the most recent question, if it had any.
    #[must_use]
    pub fn last_choices(&self) -> Vec<String> {
        self.last_choices
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Consumes the bot and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

/// The terminal rendering of one action.
#[must_use]
pub fn format_action(action: &ChatAction) -> String {
    let mut block = match action.action_type() {
        ActionType::SendingMedia => {
            let mut line = format!("[{}]", action.media_id().unwrap_or("media"));
            let caption = action.render_plain();
            if !caption.is_empty() {
                line.push(' ');
                line.push_str(&caption);
            }
            line
        }
        _ => action.render_plain(),
    };
    if let Some(choices) = action.choices() {
        for (i, choice) in choices.iter().enumerate() {
            block.push_str(&format!("\n  [{}] {choice}", i + 1));
        }
    }
    format!("bot> {block}\n")
}

#[async_trait]
impl<W> BotClient for TerminalBot<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        "terminal"
    }

    async fn perform_actions(&self, actions: &[ChatAction]) -> Result<(), ClientError> {
        let send_failed = |e: std::io::Error| ClientError::SendFailed {
            client: "terminal".to_string(),
            reason: e.to_string(),
        };
        let mut out = self.out.lock().await;
        for action in actions {
            if self.honor_delays
                && let Some(delay) = action.delay()
            {
                trace!(delay_ms = delay.as_millis(), "Typing");
                tokio::time::sleep(delay).await;
            }
            out.write_all(format_action(action).as_bytes())
                .await
                .map_err(send_failed)?;
            if let Some(choices) = action.choices()
                && let Ok(mut last) = self.last_choices.lock()
            {
                *last = choices.to_vec();
            }
        }
        out.flush().await.map_err(send_failed)
    }
}
