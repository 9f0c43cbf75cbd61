//! Seams to the hosted backend.
//!
//! The core never talks to a store directly: writes go through a
//! [`MutationExecutor`] and paged reads through a [`MessageSource`].

use std::future::Future;

use serde_json::Value;
use tracing::trace;

use huddle_types::Message;
use huddle_types::api::Operation;
use huddle_types::query::{PageRequest, PageSnapshot};

use crate::error::RemoteError;

/// Executes a named remote write with a JSON payload.
pub trait MutationExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        operation: &str,
        payload: Value,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;
}

/// Serves the content of one page of a message stream.
pub trait MessageSource: Send + Sync + 'static {
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<PageSnapshot<Message>, RemoteError>> + Send;
}

/// Run `O` once against `executor`, encoding the request and decoding the
/// response.
pub async fn call<O, E>(executor: &E, request: &O::Request) -> Result<O::Response, RemoteError>
where
    O: Operation,
    E: MutationExecutor,
{
    let payload = serde_json::to_value(request)?;
    trace!(operation = O::NAME, %payload, "executing remote operation");
    let value = executor.execute(O::NAME, payload).await?;
    Ok(serde_json::from_value(value)?)
}
