//! Telegram bot handlers.

use crate::commands::CommandHandler;
use crate::notifier::{Notifier, NotifyError};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Create a price alert. Usage: /alert BTC > 70000 and ETH < 3000")]
    Alert(String),
    #[command(description = "List your active alerts")]
    MyAlerts,
    #[command(description = "Cancel alerts. Usage: /cancel all | BTC | ID")]
    Cancel(String),
    #[command(description = "Current price. Usage: /price BTC")]
    Price(String),
    #[command(description = "Recently triggered alerts")]
    AlertHistory,
    #[command(description = "Virtual buy. Usage: /buy BTC 1000")]
    Buy(String),
    #[command(description = "Virtual sell. Usage: /sell BTC 0.05")]
    Sell(String),
    #[command(description = "Show your virtual portfolio")]
    Portfolio,
    #[command(description = "Technical analysis. Usage: /analyze_ai BTC [short|normal|long]")]
    AnalyzeAi(String),
    #[command(description = "Price outlook. Usage: /forecast BTC [force]")]
    Forecast(String),
    #[command(description = "🚀")]
    ToTheMoon,
}

fn parse_chat_id(raw: &str) -> Result<ChatId, TelegramError> {
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| TelegramError::InvalidChatId(raw.to_string()))
}

/// Send an HTML message to a chat given as a string id.
async fn send_html(bot: &Bot, chat_id: &str, message: &str) -> Result<(), TelegramError> {
    let chat_id = parse_chat_id(chat_id)?;
    bot.send_message(chat_id, message)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    handler: Arc<CommandHandler>,
    /// Empty means every chat may use the bot.
    allowed_chat_ids: Vec<i64>,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str, handler: Arc<CommandHandler>, allowed_chat_ids: Vec<i64>) -> Self {
        Self {
            bot: Bot::new(token),
            handler,
            allowed_chat_ids,
        }
    }

    /// Get the underlying bot for sending messages.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Notifier delivering through this bot.
    pub fn notifier(&self) -> TelegramNotifier {
        TelegramNotifier::new(self.bot.clone())
    }

    fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed_chat_ids.is_empty() || self.allowed_chat_ids.contains(&chat_id.0)
    }

    /// Run the bot command handler.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();

        if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let handler = Update::filter_message().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let this = Arc::clone(&self);
                async move { this.handle_command(bot, msg, cmd).await }
            },
        );

        info!("Telegram bot started");
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
        info!("Telegram bot stopped");
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        if !self.is_allowed(msg.chat.id) {
            warn!(chat_id = msg.chat.id.0, "Ignoring command from unauthorized chat");
            return Ok(());
        }

        // Alerts and portfolios are keyed by chat, so notifications reach the
        // chat the alert was created in.
        let user_id = msg.chat.id.to_string();
        debug!(chat_id = %user_id, command = ?cmd, "Handling command");
        let h = &self.handler;

        let reply = match cmd {
            Command::Start => h.start(),
            Command::Help => h.help(),
            Command::Alert(args) => h.alert(&user_id, &args).await,
            Command::MyAlerts => h.my_alerts(&user_id).await,
            Command::Cancel(args) => h.cancel(&user_id, &args).await,
            Command::Price(args) => h.price(&args).await,
            Command::AlertHistory => h.alert_history(&user_id).await,
            Command::Buy(args) => h.buy(&user_id, &args).await,
            Command::Sell(args) => h.sell(&user_id, &args).await,
            Command::Portfolio => h.portfolio(&user_id).await,
            Command::AnalyzeAi(args) => {
                bot.send_message(msg.chat.id, "⏳ Analyzing…").await?;
                h.analyze(&args).await
            }
            Command::Forecast(args) => h.forecast(&args).await,
            Command::ToTheMoon => h.to_the_moon(),
        };

        bot.send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// Delivers alert notifications as Telegram messages; the user id is the chat id.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> Result<(), NotifyError> {
        send_html(&self.bot, user_id, message)
            .await
            .map_err(|e| match e {
                TelegramError::InvalidChatId(id) => NotifyError::InvalidRecipient(id),
                TelegramError::Api(e) => NotifyError::Delivery(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_names_are_snake_case() {
        assert_eq!(
            Command::parse("/alert BTC > 70000 and ETH < 3000", "alertbot").unwrap(),
            Command::Alert("BTC > 70000 and ETH < 3000".to_string())
        );
        assert_eq!(
            Command::parse("/my_alerts", "alertbot").unwrap(),
            Command::MyAlerts
        );
        assert_eq!(
            Command::parse("/analyze_ai ETH long", "alertbot").unwrap(),
            Command::AnalyzeAi("ETH long".to_string())
        );
        assert_eq!(
            Command::parse("/to_the_moon", "alertbot").unwrap(),
            Command::ToTheMoon
        );
        assert!(Command::parse("/unknown", "alertbot").is_err());
    }

    #[test]
    fn test_descriptions_list_every_command() {
        let help = Command::descriptions().to_string();
        for name in ["/alert", "/my_alerts", "/cancel", "/alert_history", "/forecast"] {
            assert!(help.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(parse_chat_id("-100123").unwrap(), ChatId(-100123));
        assert!(matches!(
            parse_chat_id("abc"),
            Err(TelegramError::InvalidChatId(_))
        ));
    }

    #[tokio::test]
    async fn test_notifier_rejects_non_numeric_recipient() {
        let notifier = TelegramNotifier::new(Bot::new("123:TEST"));
        let err = notifier.notify("not-a-chat", "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::InvalidRecipient(_)));
    }
}
