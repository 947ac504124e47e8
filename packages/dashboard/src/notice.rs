//! User-visible failure notices.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Number of notices kept before the oldest are dropped.
pub const MAX_NOTICES: usize = 50;

/// Which part of the dashboard a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSource {
    /// A map layer, by name.
    Layer(&'static str),
    /// A city comparison.
    Comparison,
    /// A data export.
    Export,
}

impl std::fmt::Display for NoticeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Layer(name) => write!(f, "{name} layer"),
            Self::Comparison => f.write_str("comparison"),
            Self::Export => f.write_str("export"),
        }
    }
}

/// How prominently a notice should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Shown next to the affected view; background refresh failures.
    Inline,
    /// Interrupts the user; failures of actions they started.
    Alert,
}

/// A failure the surrounding UI should show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Affected component.
    pub source: NoticeSource,
    /// Presentation.
    pub kind: NoticeKind,
    /// Message text.
    pub message: String,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.source, self.message)
    }
}

/// Bounded, oldest-first log of notices.
#[derive(Debug, Default)]
pub struct NoticeLog {
    entries: Mutex<VecDeque<Notice>>,
}

impl NoticeLog {
    /// Appends `notice`, dropping the oldest entry when full.
    pub fn push(&self, notice: Notice) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == MAX_NOTICES {
            entries.pop_front();
        }
        entries.push_back(notice);
    }

    /// Returns all notices, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notice> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Removes and returns all notices, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_when_full() {
        let log = NoticeLog::default();
        for i in 0..=MAX_NOTICES {
            log.push(Notice {
                source: NoticeSource::Export,
                kind: NoticeKind::Alert,
                message: i.to_string(),
            });
        }

        let notices = log.snapshot();
        assert_eq!(notices.len(), MAX_NOTICES);
        assert_eq!(notices[0].message, "1");
        assert_eq!(log.drain().len(), MAX_NOTICES);
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn displays_source_and_message() {
        let notice = Notice {
            source: NoticeSource::Layer("disasters"),
            kind: NoticeKind::Inline,
            message: "HTTP 500".to_string(),
        };
        assert_eq!(notice.to_string(), "[disasters layer] HTTP 500");
    }
}
