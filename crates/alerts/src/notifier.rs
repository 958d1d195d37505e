//! Notification sink and trigger message formatting.

use alertbot_core::{format_price, PriceAlert};
use alertbot_engine::ConditionResult;
use async_trait::async_trait;
use teloxide::utils::html;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Delivers a ready-to-send HTML message to a user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, message: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no Telegram token is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> Result<(), NotifyError> {
        info!(user = %user_id, "🔔 Notification:\n{}", message);
        Ok(())
    }
}

/// Build the Telegram (HTML) message for a triggered alert.
///
/// `results` holds one entry per leaf condition, left to right.
pub fn format_trigger_message(alert: &PriceAlert, results: &[ConditionResult]) -> String {
    let created = alert.created_at.format("%Y-%m-%d %H:%M UTC");
    let price_text = |r: &ConditionResult| match r.price {
        Some(p) => format_price(p),
        None => "N/A".to_string(),
    };

    let (chart_symbol, mut msg) = match results {
        [only] if !alert.condition.is_compound() => {
            let msg = format!(
                "<b>🔔 PRICE ALERT TRIGGERED</b>\n\n\
                 <b>Symbol:</b> {}\n\
                 <b>Condition:</b> {}\n\
                 <b>Current price:</b> {}\n\
                 <b>Created:</b> {}\n\n",
                html::escape(only.condition.symbol.as_str()),
                html::escape(&only.condition.to_string()),
                price_text(only),
                created,
            );
            (&only.condition.symbol, msg)
        }
        _ => {
            let mut msg = String::from("<b>🔔 COMPOUND ALERT TRIGGERED</b>\n\n<b>Conditions:</b>\n");
            for (i, r) in results.iter().enumerate() {
                msg.push_str(&format!(
                    "{}. {} (now: {}){}\n",
                    i + 1,
                    html::escape(&r.condition.to_string()),
                    price_text(r),
                    if r.met { " ✅" } else { "" },
                ));
            }
            msg.push_str(&format!(
                "\n<b>Expression:</b> {}\n<b>Created:</b> {}\n\n",
                html::escape(&alert.condition.to_string()),
                created,
            ));
            let Some(first) = results.first() else {
                return msg;
            };
            (&first.condition.symbol, msg)
        }
    };

    msg.push_str(&format!(
        "<a href=\"{}\">View chart on TradingView</a>",
        chart_symbol.chart_link()
    ));
    msg
}
