//! Message handling: commands and free-text amount entries.

use chrono::Utc;
use engine::{CustomerKind, EngineError, Money, OrderState, RecordFilter, Scope, business_date};
use teloxide::{
    prelude::*,
    types::{ChatId, User},
};

use crate::{
    ConfigParameters,
    commands::{Command, parse_command},
    format,
    parsing::{self, AmountOp},
    state::MAX_UNDO_COUNT,
};

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if let Some(cmd) = parse_command(text) {
        handle_command(&bot, &msg, &cfg, cmd).await?;
    } else if text.trim_start().starts_with('+') {
        handle_amount_message(&bot, &msg, &cfg, text).await?;
    }
    Ok(())
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    cfg: &ConfigParameters,
    cmd: Command,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;

    if matches!(cmd, Command::Start | Command::Help) {
        bot.send_message(chat_id, format::help_text()).await?;
        return Ok(());
    }

    if !is_employee(cfg, msg.from.as_ref()) {
        bot.send_message(chat_id, "❌ Not authorized.").await?;
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let admin = is_admin(cfg, from);
    let now = Utc::now();

    match cmd {
        Command::Start | Command::Help => {}

        Command::NewOrder { args } => {
            let mut parts = args.split_whitespace();
            let (Some(group), Some(customer), Some(amount)) =
                (parts.next(), parts.next(), parts.next())
            else {
                bot.send_message(chat_id, "Usage: /neworder <group> <A|B> <amount>")
                    .await?;
                return Ok(());
            };
            let (Ok(customer), Ok(amount)) = (
                CustomerKind::try_from(customer),
                amount.parse::<Money>(),
            ) else {
                bot.send_message(chat_id, "Usage: /neworder <group> <A|B> <amount>")
                    .await?;
                return Ok(());
            };

            match cfg
                .engine
                .create_order(group, chat_id.0, customer, amount, now)
                .await
            {
                Ok(order) => {
                    cfg.undo_guard.reset(chat_id, from.id);
                    bot.send_message(
                        chat_id,
                        format!(
                            "✅ Order #{} created\nGroup: {}\nCustomer: {}\nAmount: {}",
                            order.id,
                            order.group_id,
                            order.customer.as_str(),
                            order.amount
                        ),
                    )
                    .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::Order => {
            match cfg.engine.active_order(chat_id.0).await {
                Ok(Some(order)) => {
                    let interest = cfg
                        .engine
                        .reports()
                        .interest_for_order(order.id)
                        .await
                        .unwrap_or_default();
                    bot.send_message(chat_id, format::render_order(&order, &interest))
                        .await?;
                }
                Ok(None) => {
                    bot.send_message(chat_id, "❌ No active order in this chat.")
                        .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::Normal | Command::Overdue | Command::Breach => {
            let target = match cmd {
                Command::Normal => OrderState::Normal,
                Command::Overdue => OrderState::Overdue,
                _ => OrderState::Breach,
            };
            let Some(order) = active_order_or_reply(bot, chat_id, cfg).await? else {
                return Ok(());
            };
            match cfg.engine.change_state(order.id, target, now).await {
                Ok(order) => {
                    cfg.undo_guard.reset(chat_id, from.id);
                    bot.send_message(chat_id, format::state_updated(&order)).await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::End => {
            let Some(order) = active_order_or_reply(bot, chat_id, cfg).await? else {
                return Ok(());
            };
            match cfg.engine.complete_order(order.id, now).await {
                Ok(order) => {
                    cfg.undo_guard.reset(chat_id, from.id);
                    bot.send_message(
                        chat_id,
                        format!("✅ Order completed\nAmount: {}", order.amount),
                    )
                    .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::BreachEnd => {
            let Some(order) = active_order_or_reply(bot, chat_id, cfg).await? else {
                return Ok(());
            };
            match cfg.engine.complete_breach(order.id, now).await {
                Ok(order) => {
                    cfg.undo_guard.reset(chat_id, from.id);
                    bot.send_message(
                        chat_id,
                        format!("✅ Breach order closed\nOrder #{}", order.id),
                    )
                    .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::Undo => {
            if cfg.undo_guard.remaining(chat_id, from.id) == 0 {
                bot.send_message(
                    chat_id,
                    format!(
                        "❌ Maximum of {MAX_UNDO_COUNT} consecutive undos reached.\n\
                         Enter correct data before undoing again."
                    ),
                )
                .await?;
                return Ok(());
            }
            match cfg.engine.undo_last(chat_id.0, now).await {
                Ok(result) => {
                    cfg.undo_guard.bump(chat_id, from.id);
                    bot.send_message(chat_id, format::describe_undo(&result))
                        .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::Report { args } => {
            let today = business_date(now);
            let parsed = match parsing::parse_report_args(&args, today) {
                Ok(parsed) => parsed,
                Err(err) => {
                    bot.send_message(chat_id, format!("❌ {err}")).await?;
                    return Ok(());
                }
            };
            if parsed.group_id.is_none() && !admin {
                bot.send_message(chat_id, "❌ The global report is admin only.")
                    .await?;
                return Ok(());
            }

            let report = cfg
                .engine
                .reports()
                .period(parsed.group_id.as_deref(), parsed.from, parsed.to)
                .await;
            match report {
                Ok(report) => {
                    let global = if parsed.group_id.is_none() {
                        cfg.engine.snapshot(&Scope::Global).await.ok()
                    } else {
                        None
                    };
                    let title = match &parsed.group_id {
                        Some(group) => format!("{group} {} → {}", parsed.from, parsed.to),
                        None => format!("Global {} → {}", parsed.from, parsed.to),
                    };
                    bot.send_message(
                        chat_id,
                        format::render_period_report(&title, &report, global.as_ref()),
                    )
                    .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::Search { args } => {
            let filter = match parsing::parse_search_args(&args) {
                Ok(filter) => filter,
                Err(_) => {
                    bot.send_message(
                        chat_id,
                        "Usage: /search <group|state|A|B|#id|date [date]>",
                    )
                    .await?;
                    return Ok(());
                }
            };
            match cfg.engine.find_orders(&filter).await {
                Ok(orders) => {
                    bot.send_message(chat_id, format::render_orders(&orders))
                        .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }

        Command::Expense { args } => {
            if !require_admin(bot, chat_id, admin).await? {
                return Ok(());
            }
            match parsing::parse_expense_args(&args) {
                Ok((kind, amount, note)) => {
                    match cfg
                        .engine
                        .record_expense(chat_id.0, kind, amount, note.as_deref(), now)
                        .await
                    {
                        Ok(_) => {
                            cfg.undo_guard.reset(chat_id, from.id);
                            bot.send_message(
                                chat_id,
                                format!("✅ {} expense recorded: {amount}", kind.as_str()),
                            )
                            .await?;
                        }
                        Err(err) => {
                            bot.send_message(chat_id, engine_error_text(&err)).await?;
                        }
                    }
                }
                Err(err) => {
                    bot.send_message(chat_id, format!("❌ {err}")).await?;
                }
            }
        }

        Command::Funds { args } => {
            if !require_admin(bot, chat_id, admin).await? {
                return Ok(());
            }
            match parsing::parse_funds_args(&args) {
                Ok((amount, note)) => {
                    match cfg
                        .engine
                        .adjust_funds(chat_id.0, amount, note.as_deref(), now)
                        .await
                    {
                        Ok(_) => {
                            cfg.undo_guard.reset(chat_id, from.id);
                            bot.send_message(chat_id, format!("✅ Funds adjusted by {amount}"))
                                .await?;
                        }
                        Err(err) => {
                            bot.send_message(chat_id, engine_error_text(&err)).await?;
                        }
                    }
                }
                Err(err) => {
                    bot.send_message(chat_id, format!("❌ {err}")).await?;
                }
            }
        }

        Command::Income { args } => {
            if !require_admin(bot, chat_id, admin).await? {
                return Ok(());
            }
            let today = business_date(now);
            match parsing::parse_income_args(&args, today) {
                Ok((from_date, to_date)) => {
                    let records = cfg
                        .engine
                        .reports()
                        .income_records(&RecordFilter {
                            date_range: Some((from_date, to_date)),
                            ..Default::default()
                        })
                        .await;
                    match records {
                        Ok(records) => {
                            bot.send_message(chat_id, format::render_income_records(&records))
                                .await?;
                        }
                        Err(err) => {
                            bot.send_message(chat_id, engine_error_text(&err)).await?;
                        }
                    }
                }
                Err(err) => {
                    bot.send_message(chat_id, format!("❌ {err}")).await?;
                }
            }
        }

        Command::Rebuild => {
            if !require_admin(bot, chat_id, admin).await? {
                return Ok(());
            }
            match cfg.engine.rebuild_snapshots().await {
                Ok(()) => {
                    bot.send_message(chat_id, "✅ Snapshots rebuilt from the log.")
                        .await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, engine_error_text(&err)).await?;
                }
            }
        }
    }

    Ok(())
}

async fn handle_amount_message(
    bot: &Bot,
    msg: &Message,
    cfg: &ConfigParameters,
    text: &str,
) -> ResponseResult<()> {
    if !is_employee(cfg, msg.from.as_ref()) {
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let op = match parsing::parse_amount_message(text) {
        Ok(op) => op,
        Err(_) => {
            bot.send_message(chat_id, "❌ Invalid amount format.").await?;
            return Ok(());
        }
    };

    let Some(order) = active_order_or_reply(bot, chat_id, cfg).await? else {
        return Ok(());
    };
    let now = Utc::now();

    let outcome = match op {
        AmountOp::Interest(amount) => cfg
            .engine
            .record_interest(order.id, amount, now)
            .await
            .map(|_| format!("✅ Interest recorded: {amount}\nOrder #{}", order.id)),
        AmountOp::Principal(amount) => cfg
            .engine
            .reduce_principal(order.id, amount, now)
            .await
            .map(|order| {
                format!(
                    "✅ Principal reduced by {amount}\nOutstanding: {}",
                    order.amount
                )
            }),
        AmountOp::Settlement(amount) => cfg
            .engine
            .breach_settlement(order.id, amount, now)
            .await
            .map(|_| format!("✅ Settlement recorded: {amount}\nOrder #{}", order.id)),
    };

    match outcome {
        Ok(reply) => {
            cfg.undo_guard.reset(chat_id, from.id);
            bot.send_message(chat_id, reply).await?;
        }
        Err(err) => {
            bot.send_message(chat_id, engine_error_text(&err)).await?;
        }
    }
    Ok(())
}

async fn active_order_or_reply(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
) -> ResponseResult<Option<engine::Order>> {
    match cfg.engine.active_order(chat_id.0).await {
        Ok(Some(order)) => Ok(Some(order)),
        Ok(None) => {
            bot.send_message(chat_id, "❌ No active order in this chat.")
                .await?;
            Ok(None)
        }
        Err(err) => {
            bot.send_message(chat_id, engine_error_text(&err)).await?;
            Ok(None)
        }
    }
}

fn is_employee(cfg: &ConfigParameters, from: Option<&User>) -> bool {
    let Some(from) = from else {
        return false;
    };
    if cfg.admins.contains(&from.id) {
        return true;
    }
    match &cfg.employees {
        None => true,
        Some(ids) => ids.contains(&from.id),
    }
}

fn is_admin(cfg: &ConfigParameters, from: &User) -> bool {
    cfg.admins.contains(&from.id)
}

async fn require_admin(bot: &Bot, chat_id: ChatId, admin: bool) -> ResponseResult<bool> {
    if !admin {
        bot.send_message(chat_id, "❌ This command is admin only.")
            .await?;
    }
    Ok(admin)
}

fn engine_error_text(err: &EngineError) -> String {
    match err {
        EngineError::Conflict(_) => {
            "❌ This chat already has an active order. Close it first.".to_string()
        }
        EngineError::InvalidTransition(detail) => format!("❌ Not allowed: {detail}"),
        EngineError::InvalidAmount(detail) => format!("❌ Invalid amount: {detail}"),
        EngineError::ExceedsPrincipal(_) => {
            "❌ Amount exceeds the outstanding principal.".to_string()
        }
        EngineError::NothingToUndo(_) => "❌ Nothing to undo in this chat.".to_string(),
        EngineError::NotFound(detail) => format!("❌ Not found: {detail}"),
        EngineError::Database(_) => {
            tracing::error!(error = %err, "database failure");
            "❌ Storage error, try again later.".to_string()
        }
    }
}
