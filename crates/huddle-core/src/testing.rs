//! In-memory doubles for the backend seams, shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::oneshot;

use huddle_types::query::{PageRequest, PageSnapshot};
use huddle_types::{ChannelId, MemberId, Message, MessageId, MessageTarget, WorkspaceId};

use crate::backend::{MessageSource, MutationExecutor};
use crate::error::RemoteError;

/// Replies to each call with the next scripted result.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<VecDeque<Result<Value, RemoteError>>>,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedExecutor {
    pub fn replying(replies: impl IntoIterator<Item = Result<Value, RemoteError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::default(),
        }
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }
}

impl MutationExecutor for ScriptedExecutor {
    async fn execute(&self, operation: &str, payload: Value) -> Result<Value, RemoteError> {
        self.calls.lock().unwrap().push((operation.to_string(), payload));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::internal("no scripted reply")))
    }
}

/// Holds each call open until the test releases it through the matching
/// sender returned by [`GatedExecutor::gate`].
#[derive(Default)]
pub struct GatedExecutor {
    gates: Mutex<VecDeque<oneshot::Receiver<Result<Value, RemoteError>>>>,
}

impl GatedExecutor {
    pub fn gate(&self) -> oneshot::Sender<Result<Value, RemoteError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }
}

impl MutationExecutor for GatedExecutor {
    async fn execute(&self, _operation: &str, _payload: Value) -> Result<Value, RemoteError> {
        let gate = self.gates.lock().unwrap().pop_front();
        match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| Err(RemoteError::internal("gate dropped"))),
            None => Err(RemoteError::internal("no gate")),
        }
    }
}

/// Serves pages out of a fixed newest-first message list.
#[derive(Default)]
pub struct VecSource {
    pub messages: Mutex<Vec<Message>>,
    pub requests: Mutex<Vec<PageRequest>>,
    pub failures: Mutex<HashMap<usize, RemoteError>>,
}

impl VecSource {
    pub fn new(mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| std::cmp::Reverse(huddle_types::query::PageCursor::of(m)));
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    pub fn push(&self, message: Message) {
        let mut messages = self.messages.lock().unwrap();
        messages.push(message);
        messages.sort_by_key(|m| std::cmp::Reverse(huddle_types::query::PageCursor::of(m)));
    }
}

impl MessageSource for VecSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageSnapshot<Message>, RemoteError> {
        self.requests.lock().unwrap().push(request);
        if let Some(err) = self.failures.lock().unwrap().remove(&request.index) {
            return Err(err);
        }
        let messages = self.messages.lock().unwrap();
        Ok(crate::pagination::slice_page(&messages, request))
    }
}

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
}

pub fn message(author: MemberId, created_at: DateTime<Utc>) -> Message {
    Message {
        id: MessageId::new(),
        workspace_id: WorkspaceId(uuid::Uuid::nil()),
        author_id: author,
        author_name: Some("Ada".into()),
        author_image: None,
        target: MessageTarget::Channel(ChannelId(uuid::Uuid::nil())),
        parent_message_id: None,
        body: r#"{"ops":[{"insert":"hi\n"}]}"#.into(),
        image: None,
        created_at,
        updated_at: None,
        thread: None,
        reactions: Vec::new(),
    }
}
