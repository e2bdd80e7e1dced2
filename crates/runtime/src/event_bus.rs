use foundation::ids::Generation;
use tracing::{info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible, dismissible notice.
///
/// Nothing in the map subsystem is fatal; failures that the user should know
/// about surface here instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub generation: Generation,
    pub level: NoticeLevel,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct NoticeBus {
    next_id: u64,
    notices: Vec<Notice>,
}

impl NoticeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a notice and mirrors it to the log. Returns its id.
    pub fn emit(
        &mut self,
        generation: Generation,
        level: NoticeLevel,
        kind: &'static str,
        message: impl Into<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let message = message.into();
        match level {
            NoticeLevel::Info => info!(kind, %generation, "{message}"),
            NoticeLevel::Warning | NoticeLevel::Error => warn!(kind, %generation, "{message}"),
        }
        self.notices.push(Notice {
            id,
            generation,
            level,
            kind,
            message,
        });
        id
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Returns `true` if a notice with `id` was pending.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }
}
