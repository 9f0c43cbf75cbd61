//! Client-side core of the huddle team chat: the mutation lifecycle, the
//! paginated message cursor, feed composition and the small pieces of UI
//! state that sit around them.

pub mod backend;
pub mod config;
pub mod error;
pub mod feed;
pub mod modal;
pub mod mutation;
pub mod naming;
pub mod notice;
pub mod pagination;
pub mod panel;
pub mod reactions;
pub mod send;
pub mod session;
pub mod upload;

#[cfg(test)]
mod testing;

pub use backend::{MessageSource, MutationExecutor};
pub use config::FeedConfig;
pub use error::{RemoteError, RemoteErrorKind};
pub use feed::{FeedComposer, FeedEntry, FeedPlan};
pub use mutation::{MutateOptions, MutationController, MutationOutcome, MutationState};
pub use pagination::{PaginatedCursor, PaginatedQuery, PaginationStatus};
pub use panel::{PanelNavigator, PanelState};
pub use session::Session;
