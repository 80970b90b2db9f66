//! Per-chat bot-side state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use teloxide::types::{ChatId, UserId};

/// Cap on consecutive undos per user and chat. A fresh successful operation
/// resets the count; past the cap the user has to re-enter correct data
/// instead of unwinding further.
pub(crate) const MAX_UNDO_COUNT: u8 = 3;

/// Tracks consecutive undo counts. Purely advisory bot-side state; losing it
/// on restart just re-opens the undo window.
#[derive(Clone, Default)]
pub(crate) struct UndoGuard {
    counts: Arc<Mutex<HashMap<(ChatId, UserId), u8>>>,
}

impl UndoGuard {
    pub(crate) fn remaining(&self, chat: ChatId, user: UserId) -> u8 {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        MAX_UNDO_COUNT.saturating_sub(*counts.get(&(chat, user)).unwrap_or(&0))
    }

    pub(crate) fn bump(&self, chat: ChatId, user: UserId) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry((chat, user)).or_insert(0) += 1;
    }

    pub(crate) fn reset(&self, chat: ChatId, user: UserId) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.remove(&(chat, user));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_window_closes_after_cap() {
        let guard = UndoGuard::default();
        let chat = ChatId(77);
        let user = UserId(1);

        assert_eq!(guard.remaining(chat, user), MAX_UNDO_COUNT);
        for _ in 0..MAX_UNDO_COUNT {
            guard.bump(chat, user);
        }
        assert_eq!(guard.remaining(chat, user), 0);

        guard.reset(chat, user);
        assert_eq!(guard.remaining(chat, user), MAX_UNDO_COUNT);
    }
}
