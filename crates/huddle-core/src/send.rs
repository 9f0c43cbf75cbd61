//! Message composer: upload the attachment if any, then create the message.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use huddle_types::api::{
    CreateMessage, CreateMessageRequest, GenerateUploadUrl, GenerateUploadUrlRequest,
};
use huddle_types::{MessageId, MessageTarget, StorageId, WorkspaceId};

use crate::backend::MutationExecutor;
use crate::error::RemoteError;
use crate::mutation::MutationController;
use crate::notice::Notices;
use crate::upload::{Attachment, BlobUploader, UploadError};

pub const SEND_FAILED: &str = "Failed to send message";

#[derive(Debug, Error)]
pub enum SendError {
    #[error("nothing to send")]
    Empty,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Serialized rich-text document.
    pub body: String,
    pub attachment: Option<Attachment>,
}

impl Draft {
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty() && self.attachment.is_none()
    }
}

/// Where composed messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub workspace_id: WorkspaceId,
    pub target: MessageTarget,
    /// Set when composing a thread reply.
    pub parent_message_id: Option<MessageId>,
}

pub struct MessageComposer<E: MutationExecutor, U: BlobUploader> {
    destination: Destination,
    create: MutationController<CreateMessage, E>,
    upload_url: MutationController<GenerateUploadUrl, E>,
    uploader: Arc<U>,
    notices: Notices,
    draft: Draft,
    pending: bool,
    editor_generation: u64,
}

impl<E: MutationExecutor, U: BlobUploader> MessageComposer<E, U> {
    pub fn new(destination: Destination, executor: Arc<E>, uploader: Arc<U>, notices: Notices) -> Self {
        Self {
            destination,
            create: MutationController::new(executor.clone()),
            upload_url: MutationController::new(executor),
            uploader,
            notices,
            draft: Draft::default(),
            pending: false,
            editor_generation: 0,
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.draft.body = body.into();
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.draft.attachment = Some(attachment);
    }

    pub fn detach(&mut self) {
        self.draft.attachment = None;
    }

    /// Input is disabled while a send is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Bumped after every successful send so the editor remounts empty.
    pub fn editor_generation(&self) -> u64 {
        self.editor_generation
    }

    /// Send the current draft.
    ///
    /// On failure the draft is kept, input is re-enabled and an error notice
    /// is queued. No message is created when the upload fails.
    pub async fn submit(&mut self) -> Result<MessageId, SendError> {
        if self.draft.is_empty() {
            return Err(SendError::Empty);
        }

        self.pending = true;
        let result = self.send(&self.draft).await;
        self.pending = false;

        match result {
            Ok(id) => {
                info!(message_id = %id, "message sent");
                self.draft = Draft::default();
                self.editor_generation += 1;
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "send failed");
                self.notices.error(SEND_FAILED);
                Err(e)
            }
        }
    }

    async fn send(&self, draft: &Draft) -> Result<MessageId, SendError> {
        let image = match &draft.attachment {
            Some(attachment) => Some(self.upload(attachment).await?),
            None => None,
        };

        let (channel_id, conversation_id) = match self.destination.target {
            MessageTarget::Channel(id) => (Some(id), None),
            MessageTarget::Conversation(id) => (None, Some(id)),
        };
        let request = CreateMessageRequest {
            body: draft.body.clone(),
            image,
            workspace_id: self.destination.workspace_id,
            channel_id,
            conversation_id,
            parent_message_id: self.destination.parent_message_id,
        };
        Ok(self.create.run(request).await.into_result()?)
    }

    async fn upload(&self, attachment: &Attachment) -> Result<StorageId, SendError> {
        let url = self
            .upload_url
            .run(GenerateUploadUrlRequest {})
            .await
            .into_result()?;
        Ok(self.uploader.upload(&url, attachment).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use huddle_types::{ChannelId, ConversationId};

    use super::*;
    use crate::notice::Notice;
    use crate::testing::ScriptedExecutor;

    #[derive(Default)]
    struct FakeUploader {
        fail: bool,
        urls: Mutex<Vec<String>>,
    }

    impl BlobUploader for FakeUploader {
        async fn upload(&self, url: &str, _attachment: &Attachment) -> Result<StorageId, UploadError> {
            self.urls.lock().unwrap().push(url.to_string());
            if self.fail {
                Err(UploadError::Status {
                    status: 500,
                    body: String::new(),
                })
            } else {
                Ok(StorageId("blob-1".into()))
            }
        }
    }

    fn channel_destination() -> Destination {
        Destination {
            workspace_id: WorkspaceId::new(),
            target: MessageTarget::Channel(ChannelId::new()),
            parent_message_id: None,
        }
    }

    fn composer(
        destination: Destination,
        replies: Vec<Result<Value, RemoteError>>,
        uploader: FakeUploader,
    ) -> (MessageComposer<ScriptedExecutor, FakeUploader>, Arc<ScriptedExecutor>, Notices) {
        let executor = Arc::new(ScriptedExecutor::replying(replies));
        let notices = Notices::new();
        let composer = MessageComposer::new(destination, executor.clone(), Arc::new(uploader), notices.clone());
        (composer, executor, notices)
    }

    #[tokio::test]
    async fn text_message_clears_draft_on_success() {
        let id = MessageId::new();
        let destination = channel_destination();
        let (mut composer, executor, notices) = composer(destination, vec![Ok(json!(id))], FakeUploader::default());
        composer.set_body("hello");

        assert_eq!(composer.submit().await.unwrap(), id);

        assert!(composer.draft().is_empty());
        assert_eq!(composer.editor_generation(), 1);
        assert!(!composer.is_pending());
        assert!(notices.is_empty());
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls[0].0, "messages:create");
        let MessageTarget::Channel(channel_id) = destination.target else { unreachable!() };
        assert_eq!(calls[0].1["channelId"], json!(channel_id));
        assert_eq!(calls[0].1["conversationId"], Value::Null);
        assert_eq!(calls[0].1["image"], Value::Null);
    }

    #[tokio::test]
    async fn attachment_is_uploaded_before_create() {
        let id = MessageId::new();
        let (mut composer, executor, _) = composer(
            channel_destination(),
            vec![Ok(json!("http://blobs/upload/1")), Ok(json!(id))],
            FakeUploader::default(),
        );
        composer.attach(Attachment::new("image/png", vec![7; 4]));

        composer.submit().await.unwrap();

        assert_eq!(executor.call_names(), vec!["upload:generateUploadUrl", "messages:create"]);
        assert_eq!(executor.calls.lock().unwrap()[1].1["image"], json!("blob-1"));
        assert_eq!(composer.uploader.urls.lock().unwrap().as_slice(), ["http://blobs/upload/1"]);
    }

    #[tokio::test]
    async fn failed_upload_never_creates_the_message() {
        let uploader = FakeUploader {
            fail: true,
            ..Default::default()
        };
        let (mut composer, executor, notices) =
            composer(channel_destination(), vec![Ok(json!("http://blobs/upload/1"))], uploader);
        composer.set_body("look");
        composer.attach(Attachment::new("image/png", vec![1]));
        let before = composer.draft().clone();

        let err = composer.submit().await.unwrap_err();

        assert!(matches!(err, SendError::Upload(_)));
        assert_eq!(executor.call_names(), vec!["upload:generateUploadUrl"]);
        assert_eq!(composer.draft(), &before);
        assert_eq!(composer.editor_generation(), 0);
        assert!(!composer.is_pending());
        assert_eq!(notices.drain(), vec![Notice::error(SEND_FAILED)]);
    }

    #[tokio::test]
    async fn rejected_create_keeps_the_draft() {
        let (mut composer, _, notices) = composer(
            channel_destination(),
            vec![Err(RemoteError::unauthorized())],
            FakeUploader::default(),
        );
        composer.set_body("hello");

        let err = composer.submit().await.unwrap_err();

        assert_eq!(err.to_string(), "Unauthorized");
        assert_eq!(composer.draft().body, "hello");
        assert_eq!(notices.len(), 1);
    }

    #[tokio::test]
    async fn empty_draft_is_not_sent() {
        let (mut composer, executor, notices) = composer(channel_destination(), vec![], FakeUploader::default());
        composer.set_body("   ");

        assert!(matches!(composer.submit().await, Err(SendError::Empty)));
        assert!(executor.call_names().is_empty());
        assert!(notices.is_empty());
    }

    #[tokio::test]
    async fn thread_reply_in_a_conversation() {
        let parent = MessageId::new();
        let conversation = ConversationId::new();
        let destination = Destination {
            workspace_id: WorkspaceId::new(),
            target: MessageTarget::Conversation(conversation),
            parent_message_id: Some(parent),
        };
        let (mut composer, executor, _) =
            composer(destination, vec![Ok(json!(MessageId::new()))], FakeUploader::default());
        composer.set_body("reply");

        composer.submit().await.unwrap();

        let payload = executor.calls.lock().unwrap()[0].1.clone();
        assert_eq!(payload["conversationId"], json!(conversation));
        assert_eq!(payload["parentMessageId"], json!(parent));
        assert_eq!(payload["channelId"], Value::Null);
    }
}
