//! Telegram bot.
//!
//! The bot is a thin boundary: it parses the command surface, checks who is
//! allowed to call what, renders replies, and hands everything else to the
//! ledger engine. It keeps no state of its own beyond the undo counter.

use std::sync::Arc;

use teloxide::{prelude::*, types::UserId};

use engine::Engine;

mod commands;
mod format;
mod handlers;
mod parsing;
mod state;

#[derive(Clone)]
pub struct ConfigParameters {
    /// May run the privileged commands (global report, income detail,
    /// expenses, funds, rebuild).
    admins: Vec<UserId>,
    /// Allow-list for everything else; `None` leaves the bot open.
    employees: Option<Vec<UserId>>,
    engine: Arc<Engine>,
    undo_guard: state::UndoGuard,
}

pub struct Bot {
    token: String,
    admins: Vec<UserId>,
    employees: Option<Vec<UserId>>,
    engine: Arc<Engine>,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub async fn run(&self) {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);

        let parameters = ConfigParameters {
            admins: self.admins.clone(),
            employees: self.employees.clone(),
            engine: self.engine.clone(),
            undo_guard: state::UndoGuard::default(),
        };

        let handler =
            dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::debug!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

#[derive(Default)]
pub struct BotBuilder {
    token: String,
    admins: Vec<UserId>,
    employees: Option<Vec<UserId>>,
    engine: Option<Arc<Engine>>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn admins(mut self, admins: Vec<u64>) -> BotBuilder {
        self.admins = admins.into_iter().map(UserId).collect();
        self
    }

    pub fn employees(mut self, employees: Vec<u64>) -> BotBuilder {
        if !employees.is_empty() {
            self.employees = Some(employees.into_iter().map(UserId).collect());
        }
        self
    }

    pub fn engine(mut self, engine: Arc<Engine>) -> BotBuilder {
        self.engine = Some(engine);
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        if self.token.is_empty() {
            return Err("missing telegram token".to_string());
        }
        let engine = self.engine.ok_or_else(|| "missing engine".to_string())?;
        Ok(Bot {
            token: self.token,
            admins: self.admins,
            employees: self.employees,
            engine,
        })
    }
}
