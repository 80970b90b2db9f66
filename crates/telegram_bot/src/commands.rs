//! Command grammar for the chat surface.
//!
//! Arguments past the command word are kept raw here; the parsing module
//! turns them into typed values, so argument errors can answer with the
//! right usage line instead of a generic parse failure.

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
    Help,
    /// `/neworder <group> <A|B> <amount>`
    NewOrder { args: String },
    /// Show the chat's active order.
    Order,
    Normal,
    Overdue,
    Breach,
    End,
    /// `/breach_end` - closes a breached order.
    BreachEnd,
    Undo,
    /// `/report [group] [today|YYYY-MM-DD [YYYY-MM-DD]]`
    Report { args: String },
    /// `/search <group|state|A|B|#id|date [date]>`
    Search { args: String },
    /// `/expense <company|other> <amount> [note]`
    Expense { args: String },
    /// `/funds <±amount> [note]`
    Funds { args: String },
    /// `/income [YYYY-MM-DD [YYYY-MM-DD]]`
    Income { args: String },
    /// Rebuild the snapshots from the log.
    Rebuild,
}

pub(crate) fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    // Strip the bot-name suffix Telegram appends in groups.
    let cmd = cmd.split('@').next().unwrap_or(cmd);
    let arg = parts.next().unwrap_or("").trim().to_string();

    match cmd {
        "/start" => Some(Command::Start),
        "/help" => Some(Command::Help),
        "/neworder" => Some(Command::NewOrder { args: arg }),
        "/order" => Some(Command::Order),
        "/normal" => Some(Command::Normal),
        "/overdue" => Some(Command::Overdue),
        "/breach" => Some(Command::Breach),
        "/end" => Some(Command::End),
        "/breach_end" => Some(Command::BreachEnd),
        "/undo" => Some(Command::Undo),
        "/report" => Some(Command::Report { args: arg }),
        "/search" => Some(Command::Search { args: arg }),
        "/expense" => Some(Command::Expense { args: arg }),
        "/funds" => Some(Command::Funds { args: arg }),
        "/income" => Some(Command::Income { args: arg }),
        "/rebuild" => Some(Command::Rebuild),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bot_name_suffix() {
        assert_eq!(parse_command("/order@loanbook_bot"), Some(Command::Order));
    }

    #[test]
    fn keeps_raw_arguments() {
        assert_eq!(
            parse_command("/neworder S01 A 10000"),
            Some(Command::NewOrder {
                args: "S01 A 10000".to_string()
            })
        );
        assert_eq!(
            parse_command("/report"),
            Some(Command::Report {
                args: String::new()
            })
        );
    }

    #[test]
    fn non_commands_are_none() {
        assert_eq!(parse_command("+500"), None);
        assert_eq!(parse_command("/bogus"), None);
    }
}
