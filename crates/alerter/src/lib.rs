use crate::error::AlerterError;
use configuration::TelegramConfig;
use core_types::Direction;
use events::EngineEvent;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;

pub mod error;

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the
    /// configuration, allowing the system to run with alerting disabled.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Sends a text message to the configured Telegram chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::ApiError(error_text));
        }

        Ok(())
    }
}

/// A long-running service that listens to the engine's broadcast channel and
/// sends Telegram alerts for the events an operator cares about.
pub async fn run_alerter_service(
    alerter: TelegramAlerter,
    mut event_rx: broadcast::Receiver<EngineEvent>,
) {
    tracing::info!("Alerter service started. Listening for engine events.");

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if let Some(msg) = render_event(&event) {
                    if let Err(e) = alerter.send_message(&msg).await {
                        tracing::error!(error = ?e, "Failed to send Telegram alert.");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Alerter service lagged, skipped {} events.", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Broadcast channel closed. Alerter service shutting down.");
                break;
            }
        }
    }
}

/// Maps an engine event to a MarkdownV2 message, or `None` for events that
/// are not worth a push notification.
fn render_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Started { instruments, .. } => Some(format!(
            "✅ *Engine Started*\nWatching: `{}`",
            escape_markdown(&instruments.join(", "))
        )),
        EngineEvent::PositionOpened { instrument, direction, entry_price, quantity, stop_loss, .. } => {
            let icon = match direction {
                Direction::Long => "📈",
                Direction::Short => "📉",
            };
            Some(format!(
                "{} *OPEN {:?} {}* `@{}`\n`{}` units, stop `{}`",
                icon,
                direction,
                escape_markdown(instrument),
                entry_price,
                quantity,
                stop_loss
            ))
        }
        EngineEvent::PositionClosed { instrument, exit_price, realized_pnl, reason, .. } => {
            let icon = if realized_pnl.is_sign_negative() { "🔴" } else { "🟢" };
            Some(format!(
                "{} *CLOSED {}* `@{}` \\({:?}\\)\nP&L: `{}`",
                icon,
                escape_markdown(instrument),
                exit_price,
                reason,
                realized_pnl
            ))
        }
        EngineEvent::OrderRejected { instrument, detail } => Some(format!(
            "🚨 *ORDER REJECTED {}*\n{}",
            escape_markdown(instrument),
            escape_markdown(detail)
        )),
        EngineEvent::CooldownStarted { instrument, kind, until } => Some(format!(
            "⏸ *{} cooling down* \\({:?}\\) until `{}`",
            escape_markdown(instrument),
            kind,
            until.format("%H:%M:%S UTC")
        )),
        EngineEvent::PositionRecovered { instrument, direction, stop_level } => Some(format!(
            "♻️ *Recovered {:?} {}* with stop `{}`",
            direction,
            escape_markdown(instrument),
            stop_level
        )),
        EngineEvent::EngineError { detail } => {
            Some(format!("🚨 *ENGINE ERROR*\n{}", escape_markdown(detail)))
        }
        EngineEvent::StopAdvanced { .. } => None,
    }
}

/// Escapes characters that have special meaning in Telegram's MarkdownV2.
fn escape_markdown(text: &str) -> String {
    let special_chars = r"_*[]()~`>#+-=|{}.!";
    special_chars
        .chars()
        .fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}
