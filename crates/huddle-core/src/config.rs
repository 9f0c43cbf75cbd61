use std::time::Duration;

/// Gap under which consecutive messages from one author are compacted.
pub const COMPACT_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Messages fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    pub compact_threshold: Duration,
    pub page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            compact_threshold: COMPACT_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FeedConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
