//! Uniform lifecycle for remote writes.
//!
//! Every call moves the controller through pending, then success or error,
//! and finally marks it settled. Settled is tracked separately from the
//! status so both stay observable once a call completes.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use huddle_types::api::Operation;

use crate::backend::{self, MutationExecutor};
use crate::error::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Success,
    Error,
}

/// Observable state of one controller instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<T> {
    /// `None` until the first call starts.
    pub status: Option<MutationStatus>,
    pub settled: bool,
    pub data: Option<T>,
    pub error: Option<RemoteError>,
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self {
            status: None,
            settled: false,
            data: None,
            error: None,
        }
    }
}

impl<T> MutationState<T> {
    pub fn is_idle(&self) -> bool {
        self.status.is_none()
    }

    pub fn is_pending(&self) -> bool {
        self.status == Some(MutationStatus::Pending)
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(MutationStatus::Success)
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(MutationStatus::Error)
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

/// Result of a single call, independent of the shared controller state.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<T> {
    Success(T),
    Failure(RemoteError),
}

impl<T> MutationOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, RemoteError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(e) => Err(e),
        }
    }
}

type SuccessHook<'a, T> = Box<dyn FnOnce(&T) + Send + 'a>;
type ErrorHook<'a> = Box<dyn FnOnce(&RemoteError) + Send + 'a>;
type SettledHook<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Callbacks and error policy for [`MutationController::mutate`].
pub struct MutateOptions<'a, T> {
    on_success: Option<SuccessHook<'a, T>>,
    on_error: Option<ErrorHook<'a>>,
    on_settled: Option<SettledHook<'a>>,
    throw_error: bool,
}

impl<T> Default for MutateOptions<'_, T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            on_settled: None,
            throw_error: false,
        }
    }
}

impl<'a, T> MutateOptions<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'a) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&RemoteError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_settled(mut self, f: impl FnOnce() + Send + 'a) -> Self {
        self.on_settled = Some(Box::new(f));
        self
    }

    /// Return failures to the caller instead of only recording them.
    pub fn throw_error(mut self) -> Self {
        self.throw_error = true;
        self
    }
}

impl<T> fmt::Debug for MutateOptions<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutateOptions")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_settled", &self.on_settled.is_some())
            .field("throw_error", &self.throw_error)
            .finish()
    }
}

/// Wraps one remote operation for one call site.
///
/// Overlapping calls on the same instance are not coordinated: whichever
/// call transitions last owns the shared state. Use the value returned from
/// [`run`](Self::run) or [`mutate`](Self::mutate) for per-call results.
pub struct MutationController<O: Operation, E> {
    executor: Arc<E>,
    state: Arc<watch::Sender<MutationState<O::Response>>>,
    _operation: PhantomData<fn() -> O>,
}

impl<O: Operation, E> Clone for MutationController<O, E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            state: self.state.clone(),
            _operation: PhantomData,
        }
    }
}

impl<O, E> MutationController<O, E>
where
    O: Operation,
    E: MutationExecutor,
{
    pub fn new(executor: Arc<E>) -> Self {
        let (state, _) = watch::channel(MutationState::default());
        Self {
            executor,
            state: Arc::new(state),
            _operation: PhantomData,
        }
    }

    pub fn state(&self) -> MutationState<O::Response> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<MutationState<O::Response>> {
        self.state.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    pub fn is_success(&self) -> bool {
        self.state.borrow().is_success()
    }

    pub fn is_error(&self) -> bool {
        self.state.borrow().is_error()
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().is_settled()
    }

    pub fn data(&self) -> Option<O::Response> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<RemoteError> {
        self.state.borrow().error.clone()
    }

    /// Invoke the operation once and report the outcome.
    pub async fn run(&self, request: O::Request) -> MutationOutcome<O::Response> {
        self.run_with(request, |_| {}).await
    }

    /// Invoke the operation once, firing the callbacks in `options`.
    ///
    /// Exactly one of `on_success`/`on_error` fires, then `on_settled`.
    /// Failures come back as `Err` only when `throw_error` was requested;
    /// otherwise they are recorded and `Ok(None)` is returned.
    pub async fn mutate(
        &self,
        request: O::Request,
        options: MutateOptions<'_, O::Response>,
    ) -> Result<Option<O::Response>, RemoteError> {
        let MutateOptions {
            on_success,
            on_error,
            on_settled,
            throw_error,
        } = options;

        let outcome = self
            .run_with(request, move |outcome| match outcome {
                MutationOutcome::Success(data) => {
                    if let Some(f) = on_success {
                        f(data);
                    }
                }
                MutationOutcome::Failure(e) => {
                    if let Some(f) = on_error {
                        f(e);
                    }
                }
            })
            .await;

        if let Some(f) = on_settled {
            f();
        }

        match outcome {
            MutationOutcome::Success(data) => Ok(Some(data)),
            MutationOutcome::Failure(e) if throw_error => Err(e),
            MutationOutcome::Failure(_) => Ok(None),
        }
    }

    async fn run_with<F>(&self, request: O::Request, before_settle: F) -> MutationOutcome<O::Response>
    where
        F: FnOnce(&MutationOutcome<O::Response>) + Send,
    {
        self.state.send_modify(|s| {
            s.status = Some(MutationStatus::Pending);
            s.settled = false;
            s.data = None;
            s.error = None;
        });
        debug!(operation = O::NAME, "mutation pending");

        let outcome = match backend::call::<O, E>(&*self.executor, &request).await {
            Ok(data) => {
                self.state.send_modify(|s| {
                    s.status = Some(MutationStatus::Success);
                    s.data = Some(data.clone());
                });
                debug!(operation = O::NAME, "mutation succeeded");
                MutationOutcome::Success(data)
            }
            Err(e) => {
                self.state.send_modify(|s| {
                    s.status = Some(MutationStatus::Error);
                    s.error = Some(e.clone());
                });
                warn!(operation = O::NAME, kind = ?e.kind, error = %e, "mutation failed");
                MutationOutcome::Failure(e)
            }
        };

        before_settle(&outcome);
        self.state.send_modify(|s| s.settled = true);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use huddle_types::api::{RemoveMessage, RemoveMessageRequest, UpdateChannel, UpdateChannelRequest};
    use huddle_types::{ChannelId, MessageId};

    use super::*;
    use crate::testing::{GatedExecutor, ScriptedExecutor};

    fn remove_request(id: MessageId) -> RemoveMessageRequest {
        RemoveMessageRequest { id }
    }

    #[tokio::test]
    async fn success_records_data_and_settles() {
        let id = MessageId::new();
        let executor = Arc::new(ScriptedExecutor::replying([Ok(json!(id))]));
        let controller = MutationController::<RemoveMessage, _>::new(executor.clone());
        assert!(controller.state().is_idle());

        let outcome = controller.run(remove_request(id)).await;

        assert_eq!(outcome, MutationOutcome::Success(id));
        assert!(controller.is_success());
        assert!(controller.is_settled());
        assert!(!controller.is_error());
        assert!(!controller.is_pending());
        assert_eq!(controller.data(), Some(id));
        assert_eq!(controller.error(), None);
        assert_eq!(executor.call_names(), vec!["messages:remove"]);
        assert_eq!(executor.calls.lock().unwrap()[0].1, json!({ "id": id }));
    }

    #[tokio::test]
    async fn unauthorized_failure_is_recorded_not_raised() {
        let executor = Arc::new(ScriptedExecutor::replying([Err(RemoteError::unauthorized())]));
        let controller = MutationController::<RemoveMessage, _>::new(executor);

        let result = controller.mutate(remove_request(MessageId::new()), MutateOptions::new()).await;

        assert_eq!(result, Ok(None));
        assert!(controller.is_error());
        assert!(controller.is_settled());
        assert_eq!(controller.error().map(|e| e.message), Some("Unauthorized".to_string()));
        assert_eq!(controller.data(), None);
    }

    #[tokio::test]
    async fn throw_error_returns_the_failure() {
        let executor = Arc::new(ScriptedExecutor::replying([Err(RemoteError::not_found("Message"))]));
        let controller = MutationController::<RemoveMessage, _>::new(executor);

        let result = controller
            .mutate(remove_request(MessageId::new()), MutateOptions::new().throw_error())
            .await;

        let err = result.unwrap_err();
        assert!(err.is_not_found());
        assert!(controller.is_error());
        assert!(controller.is_settled());
    }

    #[tokio::test]
    async fn callbacks_fire_once_in_order() {
        let id = ChannelId::new();
        let executor = Arc::new(ScriptedExecutor::replying([
            Ok(json!(id)),
            Err(RemoteError::validation("Name too short")),
        ]));
        let controller = MutationController::<UpdateChannel, _>::new(executor);
        let log = Mutex::new(Vec::new());

        let request = || UpdateChannelRequest { id, name: "general".into() };
        let options = || {
            MutateOptions::new()
                .on_success(|data: &ChannelId| log.lock().unwrap().push(format!("success {data}")))
                .on_error(|e: &RemoteError| log.lock().unwrap().push(format!("error {e}")))
                .on_settled(|| log.lock().unwrap().push("settled".to_string()))
        };

        controller.mutate(request(), options()).await.unwrap();
        controller.mutate(request(), options()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                format!("success {id}"),
                "settled".to_string(),
                "error Name too short".to_string(),
                "settled".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn settled_hook_sees_final_status() {
        let executor = Arc::new(ScriptedExecutor::replying([Err(RemoteError::unauthorized())]));
        let controller = MutationController::<RemoveMessage, _>::new(executor);
        let observed = Mutex::new(None);

        let probe = controller.clone();
        controller
            .mutate(
                remove_request(MessageId::new()),
                MutateOptions::new().on_settled(|| {
                    *observed.lock().unwrap() = Some((probe.is_error(), probe.is_settled()));
                }),
            )
            .await
            .unwrap();

        assert_eq!(*observed.lock().unwrap(), Some((true, true)));
    }

    #[tokio::test]
    async fn new_call_resets_previous_result() {
        let id = MessageId::new();
        let executor = Arc::new(GatedExecutor::default());
        let controller = MutationController::<RemoveMessage, _>::new(executor.clone());

        let first = executor.gate();
        first.send(Err(RemoteError::unauthorized())).unwrap();
        controller.run(remove_request(id)).await;
        assert!(controller.is_error());

        let second = executor.gate();
        let mut rx = controller.subscribe();
        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run(remove_request(id)).await }
        });

        rx.wait_for(|s| s.is_pending()).await.unwrap();
        assert!(controller.is_pending());
        assert!(!controller.is_settled());
        assert_eq!(controller.error(), None);

        second.send(Ok(json!(id))).unwrap();
        assert_eq!(task.await.unwrap(), MutationOutcome::Success(id));
        assert!(controller.is_success());
        assert!(controller.is_settled());
    }

    #[tokio::test]
    async fn overlapping_calls_last_writer_wins() {
        let id = MessageId::new();
        let executor = Arc::new(GatedExecutor::default());
        let controller = MutationController::<RemoveMessage, _>::new(executor.clone());

        let first_gate = executor.gate();
        let second_gate = executor.gate();
        let mut rx = controller.subscribe();

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run(remove_request(id)).await }
        });
        rx.wait_for(|s| s.is_pending()).await.unwrap();
        let second = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run(remove_request(id)).await }
        });
        tokio::task::yield_now().await;

        second_gate.send(Ok(json!(id))).unwrap();
        let second = second.await.unwrap();
        assert!(controller.is_success());

        first_gate.send(Err(RemoteError::unauthorized())).unwrap();
        let first = first.await.unwrap();

        assert_eq!(second, MutationOutcome::Success(id));
        assert_eq!(first, MutationOutcome::Failure(RemoteError::unauthorized()));
        // The older call finished last, so its failure owns the status while
        // the newer call's data is still present.
        assert!(controller.is_error());
        assert!(controller.is_settled());
        assert_eq!(controller.data(), Some(id));
    }
}
