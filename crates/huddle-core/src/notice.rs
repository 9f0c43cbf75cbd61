//! Dismissible user-facing notices raised by flows and controllers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Shared FIFO of pending notices. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct Notices {
    queue: Arc<Mutex<VecDeque<Notice>>>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notice: Notice) {
        self.lock().push_back(notice);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.push(Notice::success(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(Notice::error(text));
    }

    /// Oldest notice still showing.
    pub fn peek(&self) -> Option<Notice> {
        self.lock().front().cloned()
    }

    pub fn dismiss(&self) -> Option<Notice> {
        self.lock().pop_front()
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notice>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
