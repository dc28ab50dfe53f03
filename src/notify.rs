//! User-facing notices with severity-based auto-dismiss.

#[cfg(test)]
#[path = "notify_test.rs"]
mod notify_test;

use std::time::Duration;

use crate::clock::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// How long a notice of this severity stays visible.
    #[must_use]
    pub fn ttl(self) -> Duration {
        match self {
            Self::Error => Duration::from_secs(5),
            Self::Warning | Self::Info => Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { severity: Severity::Info, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNotice {
    pub id: u64,
    pub notice: Notice,
    pub expires_at: i64,
}

/// Notices currently on screen.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    next_id: u64,
    active: Vec<ActiveNotice>,
}

impl NoticeQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a notice. Returns its id for manual dismissal.
    pub fn push(&mut self, notice: Notice) -> u64 {
        self.push_at(notice, now_ms())
    }

    /// An identical notice that is still showing is extended rather than
    /// repeated.
    pub fn push_at(&mut self, notice: Notice, now: i64) -> u64 {
        let ttl = i64::try_from(notice.severity.ttl().as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl);
        self.active.retain(|n| n.expires_at > now);
        if let Some(existing) = self.active.iter_mut().find(|n| n.notice == notice) {
            existing.expires_at = expires_at;
            return existing.id;
        }
        self.next_id += 1;
        self.active.push(ActiveNotice { id: self.next_id, notice, expires_at });
        self.next_id
    }

    /// Dismiss a notice before it expires. Returns false if it was already gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }

    /// Drop expired notices and return what remains, oldest first.
    pub fn active(&mut self) -> &[ActiveNotice] {
        self.active_at(now_ms())
    }

    pub fn active_at(&mut self, now: i64) -> &[ActiveNotice] {
        self.active.retain(|n| n.expires_at > now);
        &self.active
    }
}
