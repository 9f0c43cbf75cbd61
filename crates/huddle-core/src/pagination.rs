//! Backward pagination over a live message stream.
//!
//! [`PaginatedCursor`] is a pure fold: every [`PageSnapshot`] the backend
//! reports replaces the content of one page, and the materialized results
//! are recomputed from the pages. Asking for more history goes through
//! [`PaginatedCursor::load_more`], which hands back the [`PageRequest`] to
//! fetch instead of fetching it. [`PaginatedQuery`] wires the fold to a
//! [`MessageSource`].

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, warn};

use huddle_types::Message;
use huddle_types::query::{MessageFilter, PageCursor, PageRange, PageRequest, PageSnapshot};

use crate::backend::MessageSource;
use crate::error::RemoteError;

/// Items that can be placed in a paged feed.
pub trait Keyed {
    fn page_key(&self) -> PageCursor;
}

impl Keyed for Message {
    fn page_key(&self) -> PageCursor {
        PageCursor::of(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStatus {
    LoadingFirstPage,
    CanLoadMore,
    LoadingMore,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub range: PageRange,
    /// Newest first.
    pub items: Vec<T>,
    pub is_done: bool,
}

#[derive(Debug, Clone)]
pub struct PaginatedCursor<T> {
    filter: MessageFilter,
    page_size: usize,
    pages: Vec<Page<T>>,
    status: PaginationStatus,
    results: Vec<T>,
}

impl<T: Keyed + Clone> PaginatedCursor<T> {
    pub fn new(filter: MessageFilter, page_size: usize) -> Self {
        Self {
            filter,
            page_size: page_size.max(1),
            pages: Vec::new(),
            status: PaginationStatus::LoadingFirstPage,
            results: Vec::new(),
        }
    }

    pub fn filter(&self) -> MessageFilter {
        self.filter
    }

    pub fn status(&self) -> PaginationStatus {
        self.status
    }

    /// Every loaded item, newest first.
    pub fn results(&self) -> &[T] {
        &self.results
    }

    pub fn pages(&self) -> &[Page<T>] {
        &self.pages
    }

    pub fn first_page_request(&self) -> PageRequest {
        PageRequest {
            filter: self.filter,
            index: 0,
            range: PageRange::default(),
            page_size: self.page_size,
        }
    }

    /// Requests that re-read every loaded page over its fixed range.
    pub fn refresh_requests(&self) -> Vec<PageRequest> {
        if self.pages.is_empty() {
            return vec![self.first_page_request()];
        }
        self.pages
            .iter()
            .enumerate()
            .map(|(index, page)| PageRequest {
                filter: self.filter,
                index,
                range: page.range,
                page_size: self.page_size,
            })
            .collect()
    }

    /// Ask for the next older page.
    ///
    /// Only acts in `CanLoadMore`; returns the request the caller must fetch
    /// and feed back through [`apply`](Self::apply).
    pub fn load_more(&mut self) -> Option<PageRequest> {
        if self.status != PaginationStatus::CanLoadMore {
            return None;
        }
        let before = self.pages.last()?.range.until?;
        self.status = PaginationStatus::LoadingMore;
        Some(PageRequest {
            filter: self.filter,
            index: self.pages.len(),
            range: PageRange {
                before: Some(before),
                until: None,
            },
            page_size: self.page_size,
        })
    }

    /// Fold one snapshot into the cursor. Returns whether it was accepted.
    ///
    /// Replaying a snapshot already applied leaves the cursor unchanged.
    pub fn apply(&mut self, snapshot: PageSnapshot<T>) -> bool {
        let PageSnapshot {
            index,
            range,
            items,
            is_done,
        } = snapshot;

        let refreshing = index < self.pages.len();
        if refreshing {
            let is_last = index + 1 == self.pages.len();
            let page = &mut self.pages[index];
            let fixed = page.range;
            // A page filled while still open-ended gets its lower bound now.
            if fixed.until.is_none() && range.before == fixed.before {
                page.range.until = range.until;
            }
            let bounds = page.range;
            page.items = items
                .into_iter()
                .filter(|item| bounds.until.is_none() || bounds.contains(&item.page_key()))
                .collect();
            if is_last {
                page.is_done = is_done;
            }
        } else if index == self.pages.len() {
            let expected_before = self.pages.last().and_then(|p| p.range.until);
            let awaited = match self.status {
                PaginationStatus::LoadingFirstPage => index == 0,
                PaginationStatus::LoadingMore => range.before == expected_before,
                _ => false,
            };
            if !awaited {
                warn!(index, status = ?self.status, "ignoring unrequested page snapshot");
                return false;
            }
            debug!(index, items = items.len(), is_done, "page loaded");
            self.pages.push(Page {
                range,
                items,
                is_done,
            });
        } else {
            warn!(index, loaded = self.pages.len(), "ignoring page snapshot past the end");
            return false;
        }

        // A refresh landing mid-load leaves the continuation pending.
        let awaiting_more = refreshing && self.status == PaginationStatus::LoadingMore;
        self.status = match self.pages.last() {
            _ if awaiting_more => PaginationStatus::LoadingMore,
            Some(last) if last.is_done => PaginationStatus::Exhausted,
            Some(_) => PaginationStatus::CanLoadMore,
            None => PaginationStatus::LoadingFirstPage,
        };
        self.rebuild();
        true
    }

    /// Record that fetching page `index` failed so it can be retried.
    pub fn fail(&mut self, index: usize) {
        if self.status == PaginationStatus::LoadingMore && index == self.pages.len() {
            self.status = PaginationStatus::CanLoadMore;
        }
    }

    fn rebuild(&mut self) {
        let mut seen = HashSet::new();
        self.results = self
            .pages
            .iter()
            .flat_map(|page| page.items.iter())
            .filter(|item| seen.insert(item.page_key()))
            .cloned()
            .collect();
    }
}

/// Resolve `request` against a newest-first list held in memory.
///
/// Open-ended ranges take at most `page_size` items; a fixed range returns
/// everything inside it. An open range resolves its `until` to the oldest
/// item returned.
pub fn slice_page<T: Keyed + Clone>(items: &[T], request: PageRequest) -> PageSnapshot<T> {
    let mut in_range: Vec<T> = items
        .iter()
        .filter(|item| request.range.contains(&item.page_key()))
        .cloned()
        .collect();
    in_range.sort_by_key(|item| std::cmp::Reverse(item.page_key()));
    if request.range.until.is_none() {
        in_range.truncate(request.page_size);
    }

    let until = request.range.until.or_else(|| in_range.last().map(Keyed::page_key));
    let is_done = match until {
        Some(until) => !items.iter().any(|item| item.page_key() < until),
        None => true,
    };

    PageSnapshot {
        index: request.index,
        range: PageRange {
            before: request.range.before,
            until,
        },
        items: in_range,
        is_done,
    }
}

/// A [`PaginatedCursor`] over messages, driven by a [`MessageSource`].
pub struct PaginatedQuery<S> {
    source: Arc<S>,
    cursor: PaginatedCursor<Message>,
}

impl<S: MessageSource> PaginatedQuery<S> {
    pub fn new(source: Arc<S>, filter: MessageFilter, page_size: usize) -> Self {
        Self {
            source,
            cursor: PaginatedCursor::new(filter, page_size),
        }
    }

    pub fn cursor(&self) -> &PaginatedCursor<Message> {
        &self.cursor
    }

    pub fn results(&self) -> &[Message] {
        self.cursor.results()
    }

    pub fn status(&self) -> PaginationStatus {
        self.cursor.status()
    }

    /// Fetch the first page if nothing has been loaded yet.
    pub async fn start(&mut self) -> Result<(), RemoteError> {
        if self.cursor.status() != PaginationStatus::LoadingFirstPage {
            return Ok(());
        }
        let snapshot = self.source.fetch_page(self.cursor.first_page_request()).await?;
        self.cursor.apply(snapshot);
        Ok(())
    }

    /// Fetch the next older page. Returns `false` when there was nothing to
    /// load.
    pub async fn load_more(&mut self) -> Result<bool, RemoteError> {
        let Some(request) = self.cursor.load_more() else {
            return Ok(false);
        };
        match self.source.fetch_page(request).await {
            Ok(snapshot) => Ok(self.cursor.apply(snapshot)),
            Err(e) => {
                warn!(index = request.index, error = %e, "failed to load older messages");
                self.cursor.fail(request.index);
                Err(e)
            }
        }
    }

    /// Re-read every loaded page and fold the fresh snapshots in, keeping
    /// the pagination position.
    pub async fn refresh(&mut self) -> Result<(), RemoteError> {
        let requests = self.cursor.refresh_requests();
        let source = &self.source;
        let snapshots = try_join_all(requests.into_iter().map(|r| source.fetch_page(r))).await?;
        for snapshot in snapshots {
            self.cursor.apply(snapshot);
        }
        Ok(())
    }
}
