//! Text command front-end.
//!
//! Turns chat messages (`!g balance`, `!g roulette red 100`, `/help`) into
//! ledger calls and renders the replies. Parsing and rendering are pure;
//! only `CommandHandler::handle` touches the engine.

use std::sync::Arc;
use tracing::debug;

use crate::engine::WagerEngine;
use crate::types::{BetResult, LedgerError, StoreError};

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Balance,
    Roulette { bet_type: String, amount: i64 },
}

/// A recognised command with missing or malformed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError;

impl Command {
    /// Parse a message. Returns `None` when the message is not addressed to
    /// the bot or names an unknown subcommand.
    pub fn parse(prefix: &str, content: &str) -> Option<Result<Command, UsageError>> {
        let content = content.trim();
        if content.eq_ignore_ascii_case("/help") {
            return Some(Ok(Command::Help));
        }

        let mut args = content.split_whitespace();
        if args.next()? != prefix {
            return None;
        }

        match args.next()?.to_ascii_lowercase().as_str() {
            "help" => Some(Ok(Command::Help)),
            "balance" => Some(Ok(Command::Balance)),
            "roulette" => {
                let parsed = match (args.next(), args.next().map(str::parse::<i64>)) {
                    (Some(bet_type), Some(Ok(amount))) => Ok(Command::Roulette {
                        bet_type: bet_type.to_string(),
                        amount,
                    }),
                    _ => Err(UsageError),
                };
                Some(parsed)
            }
            _ => None,
        }
    }

    /// Whether the command is subject to the channel allow-list.
    /// `/help` is answered everywhere.
    fn is_channel_bound(&self) -> bool {
        !matches!(self, Command::Help)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

pub fn render_help(prefix: &str) -> String {
    format!(
        "**Available Commands:**\n\
         `/help` - Show this help menu\n\
         `{prefix} balance` - Check your balance\n\
         `{prefix} roulette <red|black|odd|even> <amount>` - Bet on roulette"
    )
}

pub fn render_usage(prefix: &str, user_id: &str) -> String {
    format!(
        "{}, usage: `{prefix} roulette <red|black|odd|even> <amount>`",
        mention(user_id)
    )
}

pub fn render_balance(user_id: &str, balance: i64) -> String {
    format!("{}, your balance is **{balance}**.", mention(user_id))
}

pub fn render_result(user_id: &str, result: &BetResult) -> String {
    let verdict = if result.won { "You won!" } else { "You lost!" };
    format!(
        "{}, {verdict} The ball landed on **{}**. New balance: **{}**.",
        mention(user_id),
        result.outcome,
        result.new_balance
    )
}

pub fn render_error(user_id: &str, err: &LedgerError) -> String {
    let who = mention(user_id);
    match err {
        LedgerError::InvalidBetType(_) => format!("{who}, valid bets: red, black, odd, even."),
        LedgerError::InvalidAmount(_) => format!("{who}, invalid bet amount."),
        LedgerError::InsufficientFunds { balance, .. } => {
            format!("{who}, invalid bet amount. Your balance is **{balance}**.")
        }
        LedgerError::ConcurrencyExhausted { .. }
        | LedgerError::TimedOut { .. }
        | LedgerError::Store(StoreError::Unavailable(_)) => {
            format!("{who}, the table is busy right now. Your balance was not changed, please try again.")
        }
        LedgerError::EmptyUserId | LedgerError::Store(StoreError::Backend(_)) => {
            format!("{who}, something went wrong. Your balance was not changed.")
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Routes parsed commands to the engine and renders the reply.
pub struct CommandHandler {
    engine: Arc<WagerEngine>,
    prefix: String,
    channel_id: Option<String>,
}

impl CommandHandler {
    pub fn new(engine: Arc<WagerEngine>, prefix: impl Into<String>, channel_id: Option<String>) -> Self {
        Self {
            engine,
            prefix: prefix.into(),
            channel_id,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    /// Handle one incoming message. `None` means the bot stays silent.
    pub async fn handle(&self, user_id: &str, channel_id: Option<&str>, content: &str) -> Option<String> {
        let command = match Command::parse(&self.prefix, content)? {
            Ok(command) => command,
            Err(UsageError) => return Some(render_usage(&self.prefix, user_id)),
        };

        if command.is_channel_bound() {
            if let Some(allowed) = self.channel_id.as_deref() {
                if channel_id != Some(allowed) {
                    debug!(user_id, ?channel_id, "Ignoring command outside the betting channel");
                    return None;
                }
            }
        }

        let reply = match command {
            Command::Help => render_help(&self.prefix),
            Command::Balance => match self.engine.get_balance(user_id).await {
                Ok(balance) => render_balance(user_id, balance),
                Err(e) => render_error(user_id, &e),
            },
            Command::Roulette { bet_type, amount } => {
                match self.engine.place_bet(user_id, &bet_type, amount).await {
                    Ok(result) => render_result(user_id, &result),
                    Err(e) => render_error(user_id, &e),
                }
            }
        };

        Some(reply)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
