//! SQLite implementation of the remote backend seams.
//!
//! Every call runs on the blocking pool against the shared [`Database`] and
//! acts on behalf of one user. Authorization follows the rules in
//! [`Session`]; failures come back as [`RemoteError`]s with the matching
//! kind.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info};

use huddle_core::naming;
use huddle_core::session::Session;
use huddle_core::{MessageSource, MutationExecutor, RemoteError};
use huddle_types::api::*;
use huddle_types::query::{MessageFilter, PageCursor, PageRange, PageRequest, PageSnapshot};
use huddle_types::{
    Channel, ChannelId, Conversation, ConversationId, Member, MemberId, Message, MessageId, MessageTarget,
    Reaction, Role, ThreadSummary, UserId, Workspace, WorkspaceId,
};

use crate::Database;
use crate::models::{MessageRow, millis};
use crate::queries::{FeedKey, NewMessage};

/// Acts as one signed-in user against a local [`Database`].
#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Database>,
    user_id: UserId,
    upload_url: Option<String>,
}

impl LocalBackend {
    pub fn new(db: Arc<Database>, user_id: UserId) -> Self {
        Self {
            db,
            user_id,
            upload_url: None,
        }
    }

    /// URL handed out by `upload:generateUploadUrl`.
    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = Some(url.into());
        self
    }

    /// The same store, acting as another user.
    pub fn acting_as(&self, user_id: UserId) -> Self {
        Self {
            user_id,
            ..self.clone()
        }
    }

    // -- Reads --

    pub async fn workspaces(&self) -> Result<Vec<Workspace>, RemoteError> {
        self.blocking(|this| {
            let rows = this.db.list_workspaces_for_user(&this.user_id.to_string()).map_err(internal)?;
            rows.into_iter()
                .map(|row| row.into_workspace().map_err(internal))
                .collect()
        })
        .await
    }

    pub async fn workspace(&self, id: WorkspaceId) -> Result<Workspace, RemoteError> {
        self.blocking(move |this| {
            this.session(id)?;
            this.load_workspace(id)
        })
        .await
    }

    pub async fn channels(&self, workspace_id: WorkspaceId) -> Result<Vec<Channel>, RemoteError> {
        self.blocking(move |this| {
            this.session(workspace_id)?;
            let rows = this.db.list_channels(&workspace_id.to_string()).map_err(internal)?;
            rows.into_iter()
                .map(|row| row.into_channel().map_err(internal))
                .collect()
        })
        .await
    }

    pub async fn members(&self, workspace_id: WorkspaceId) -> Result<Vec<Member>, RemoteError> {
        self.blocking(move |this| {
            this.session(workspace_id)?;
            let rows = this.db.list_members(&workspace_id.to_string()).map_err(internal)?;
            rows.into_iter()
                .map(|row| row.into_member().map_err(internal))
                .collect()
        })
        .await
    }

    /// The caller's own membership in `workspace_id`.
    pub async fn current_member(&self, workspace_id: WorkspaceId) -> Result<Member, RemoteError> {
        self.blocking(move |this| {
            let row = this
                .db
                .get_member_for_user(&workspace_id.to_string(), &this.user_id.to_string())
                .map_err(internal)?
                .ok_or_else(RemoteError::unauthorized)?;
            row.into_member().map_err(internal)
        })
        .await
    }

    /// A single message with its thread summary and reactions.
    pub async fn message(&self, id: MessageId) -> Result<Message, RemoteError> {
        self.blocking(move |this| {
            let row = this.load_message_row(id)?;
            let session = this.session(parse(&row.workspace_id)?)?;
            this.authorize_target(&session, row.target().map_err(internal)?)?;
            let mut messages = this.hydrate(vec![row], true)?;
            messages.pop().ok_or_else(|| RemoteError::not_found("Message"))
        })
        .await
    }

    /// The direct conversation between the caller and `other`, created on
    /// first use.
    pub async fn conversation_with(&self, other: MemberId) -> Result<ConversationId, RemoteError> {
        self.blocking(move |this| {
            let other = this.load_member(other)?;
            let session = this.session(other.workspace_id)?;
            let row = this
                .db
                .get_or_create_conversation(
                    &ConversationId::new().to_string(),
                    &other.workspace_id.to_string(),
                    &session.member_id.to_string(),
                    &other.id.to_string(),
                )
                .map_err(internal)?;
            Ok(row.into_conversation().map_err(internal)?.id)
        })
        .await
    }

    // -- Helpers --

    async fn blocking<T, F>(&self, f: F) -> Result<T, RemoteError>
    where
        T: Send + 'static,
        F: FnOnce(&LocalBackend) -> Result<T, RemoteError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(&this))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                RemoteError::internal("Internal error")
            })?
    }

    /// The caller's session in `workspace_id`, or `Unauthorized` when they
    /// are not a member.
    fn session(&self, workspace_id: WorkspaceId) -> Result<Session, RemoteError> {
        let row = self
            .db
            .get_member_for_user(&workspace_id.to_string(), &self.user_id.to_string())
            .map_err(internal)?
            .ok_or_else(RemoteError::unauthorized)?;
        Ok(Session::of(&row.into_member().map_err(internal)?))
    }

    fn admin_session(&self, workspace_id: WorkspaceId) -> Result<Session, RemoteError> {
        let session = self.session(workspace_id)?;
        if !session.can_manage_workspace() {
            return Err(RemoteError::unauthorized());
        }
        Ok(session)
    }

    fn load_workspace(&self, id: WorkspaceId) -> Result<Workspace, RemoteError> {
        self.db
            .get_workspace(&id.to_string())
            .map_err(internal)?
            .ok_or_else(|| RemoteError::not_found("Workspace"))?
            .into_workspace()
            .map_err(internal)
    }

    fn load_channel(&self, id: ChannelId) -> Result<Channel, RemoteError> {
        self.db
            .get_channel(&id.to_string())
            .map_err(internal)?
            .ok_or_else(|| RemoteError::not_found("Channel"))?
            .into_channel()
            .map_err(internal)
    }

    fn load_member(&self, id: MemberId) -> Result<Member, RemoteError> {
        self.db
            .get_member(&id.to_string())
            .map_err(internal)?
            .ok_or_else(|| RemoteError::not_found("Member"))?
            .into_member()
            .map_err(internal)
    }

    fn load_message_row(&self, id: MessageId) -> Result<MessageRow, RemoteError> {
        self.db
            .get_message(&id.to_string())
            .map_err(internal)?
            .ok_or_else(|| RemoteError::not_found("Message"))
    }

    fn load_message(&self, id: MessageId) -> Result<Message, RemoteError> {
        self.load_message_row(id)?.into_message(None, Vec::new()).map_err(internal)
    }

    fn load_conversation(&self, id: ConversationId) -> Result<Conversation, RemoteError> {
        self.db
            .get_conversation(&id.to_string())
            .map_err(internal)?
            .ok_or_else(|| RemoteError::not_found("Conversation"))?
            .into_conversation()
            .map_err(internal)
    }

    /// Check the caller may post to or read from `target`.
    fn authorize_target(&self, session: &Session, target: MessageTarget) -> Result<(), RemoteError> {
        match target {
            MessageTarget::Channel(id) => {
                if self.load_channel(id)?.workspace_id != session.workspace_id {
                    return Err(RemoteError::not_found("Channel"));
                }
            }
            MessageTarget::Conversation(id) => {
                let conversation = self.load_conversation(id)?;
                if conversation.workspace_id != session.workspace_id {
                    return Err(RemoteError::not_found("Conversation"));
                }
                if session.member_id != conversation.member_one && session.member_id != conversation.member_two {
                    return Err(RemoteError::unauthorized());
                }
            }
        }
        Ok(())
    }

    /// Check the caller may read the stream selected by `filter`.
    fn authorize_read(&self, filter: &MessageFilter) -> Result<(), RemoteError> {
        let (workspace_id, target) = match *filter {
            MessageFilter::Channel(id) => (self.load_channel(id)?.workspace_id, MessageTarget::Channel(id)),
            MessageFilter::Conversation(id) => {
                (self.load_conversation(id)?.workspace_id, MessageTarget::Conversation(id))
            }
            MessageFilter::Thread(id) => {
                let root = self.load_message(id)?;
                (root.workspace_id, root.target)
            }
        };
        let session = self.session(workspace_id)?;
        self.authorize_target(&session, target)
    }

    /// Attach reactions, and thread summaries when `with_threads` is set.
    fn hydrate(&self, rows: Vec<MessageRow>, with_threads: bool) -> Result<Vec<Message>, RemoteError> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        let mut reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
        for row in self.db.get_reactions_for_messages(&ids).map_err(internal)? {
            let key = row.message_id.clone();
            reactions.entry(key).or_default().push(row.into_reaction().map_err(internal)?);
        }

        let mut threads: HashMap<String, ThreadSummary> = HashMap::new();
        if with_threads {
            for reply in self.db.get_replies_for_messages(&ids).map_err(internal)? {
                let last_reply_at = millis(reply.created_at).map_err(internal)?;
                let summary = threads
                    .entry(reply.parent_message_id)
                    .or_insert_with(|| ThreadSummary {
                        reply_count: 0,
                        last_reply_at,
                        last_reply_author_name: None,
                        last_reply_author_image: None,
                    });
                summary.reply_count += 1;
                summary.last_reply_at = last_reply_at;
                summary.last_reply_author_name = reply.author_name;
                summary.last_reply_author_image = reply.author_image;
            }
        }

        rows.into_iter()
            .map(|row| {
                let thread = threads.remove(&row.id);
                let reactions = reactions.remove(&row.id).unwrap_or_default();
                row.into_message(thread, reactions).map_err(internal)
            })
            .collect()
    }

    fn page(&self, request: PageRequest) -> Result<PageSnapshot<Message>, RemoteError> {
        self.authorize_read(&request.filter)?;

        let before = request.range.before.map(feed_key);
        let until = request.range.until.map(feed_key);
        let limit = until.is_none().then_some(request.page_size);
        let rows = self
            .db
            .message_page(&request.filter, before.as_ref(), until.as_ref(), limit)
            .map_err(internal)?;

        let with_threads = !matches!(request.filter, MessageFilter::Thread(_));
        let items = self.hydrate(rows, with_threads)?;

        let until = request.range.until.or_else(|| items.last().map(PageCursor::of));
        let is_done = match until {
            Some(until) => !self
                .db
                .has_messages_before(&request.filter, &feed_key(until))
                .map_err(internal)?,
            None => true,
        };
        debug!(index = request.index, items = items.len(), is_done, "served message page");

        Ok(PageSnapshot {
            index: request.index,
            range: PageRange {
                before: request.range.before,
                until,
            },
            items,
            is_done,
        })
    }

    fn dispatch(&self, operation: &str, payload: Value) -> Result<Value, RemoteError> {
        match operation {
            CreateMessage::NAME => handle::<CreateMessage>(payload, |r| self.create_message(r)),
            UpdateMessage::NAME => handle::<UpdateMessage>(payload, |r| self.update_message(r)),
            RemoveMessage::NAME => handle::<RemoveMessage>(payload, |r| self.remove_message(r)),
            ToggleReaction::NAME => handle::<ToggleReaction>(payload, |r| self.toggle_reaction(r)),
            CreateChannel::NAME => handle::<CreateChannel>(payload, |r| self.create_channel(r)),
            UpdateChannel::NAME => handle::<UpdateChannel>(payload, |r| self.update_channel(r)),
            RemoveChannel::NAME => handle::<RemoveChannel>(payload, |r| self.remove_channel(r)),
            CreateWorkspace::NAME => handle::<CreateWorkspace>(payload, |r| self.create_workspace(r)),
            UpdateWorkspace::NAME => handle::<UpdateWorkspace>(payload, |r| self.update_workspace(r)),
            NewJoinCode::NAME => handle::<NewJoinCode>(payload, |r| self.new_join_code(r)),
            JoinWorkspace::NAME => handle::<JoinWorkspace>(payload, |r| self.join_workspace(r)),
            UpdateMember::NAME => handle::<UpdateMember>(payload, |r| self.update_member(r)),
            RemoveMember::NAME => handle::<RemoveMember>(payload, |r| self.remove_member(r)),
            GenerateUploadUrl::NAME => handle::<GenerateUploadUrl>(payload, |_| self.generate_upload_url()),
            other => Err(RemoteError::validation(format!("Unknown operation: {other}"))),
        }
    }

    // -- Messages --

    fn create_message(&self, req: CreateMessageRequest) -> Result<MessageId, RemoteError> {
        let session = self.session(req.workspace_id)?;

        let parent = req.parent_message_id.map(|id| self.load_message(id)).transpose()?;
        let target = match (req.channel_id, req.conversation_id, &parent) {
            (Some(id), None, _) => MessageTarget::Channel(id),
            (None, Some(id), _) => MessageTarget::Conversation(id),
            // A reply with no explicit target goes where its root lives.
            (None, None, Some(parent)) => parent.target,
            _ => {
                return Err(RemoteError::validation(
                    "A message needs exactly one channel or conversation",
                ));
            }
        };

        self.authorize_target(&session, target)?;

        if let Some(parent) = &parent {
            if parent.is_reply() {
                return Err(RemoteError::validation("Threads are one level deep"));
            }
            if parent.target != target {
                return Err(RemoteError::validation("Reply must stay with its thread"));
            }
        }
        if req.body.trim().is_empty() && req.image.is_none() {
            return Err(RemoteError::validation("Message is empty"));
        }

        let id = MessageId::new();
        let (channel_id, conversation_id) = match target {
            MessageTarget::Channel(c) => (Some(c.to_string()), None),
            MessageTarget::Conversation(c) => (None, Some(c.to_string())),
        };
        let parent_id = req.parent_message_id.map(|p| p.to_string());
        let image = req.image.map(|s| s.0);
        self.db
            .insert_message(&NewMessage {
                id: &id.to_string(),
                workspace_id: &req.workspace_id.to_string(),
                member_id: &session.member_id.to_string(),
                channel_id: channel_id.as_deref(),
                conversation_id: conversation_id.as_deref(),
                parent_message_id: parent_id.as_deref(),
                body: &req.body,
                image: image.as_deref(),
                created_at: Utc::now().timestamp_millis(),
            })
            .map_err(internal)?;

        info!(message_id = %id, member_id = %session.member_id, "message created");
        Ok(id)
    }

    /// Load a message and check the caller wrote it.
    fn authored_message(&self, id: MessageId) -> Result<Message, RemoteError> {
        let message = self.load_message(id)?;
        let session = self.session(message.workspace_id)?;
        if !session.can_modify_message(&message) {
            return Err(RemoteError::unauthorized());
        }
        Ok(message)
    }

    fn update_message(&self, req: UpdateMessageRequest) -> Result<MessageId, RemoteError> {
        self.authored_message(req.id)?;
        self.db
            .update_message_body(&req.id.to_string(), &req.body, Utc::now().timestamp_millis())
            .map_err(internal)?;
        Ok(req.id)
    }

    fn remove_message(&self, req: RemoveMessageRequest) -> Result<MessageId, RemoteError> {
        self.authored_message(req.id)?;
        self.db.remove_message(&req.id.to_string()).map_err(internal)?;
        info!(message_id = %req.id, "message removed");
        Ok(req.id)
    }

    fn toggle_reaction(&self, req: ToggleReactionRequest) -> Result<ReactionChange, RemoteError> {
        let message = self.load_message(req.message_id)?;
        let session = self.session(message.workspace_id)?;
        if req.value.trim().is_empty() {
            return Err(RemoteError::validation("Reaction is empty"));
        }
        let added = self
            .db
            .toggle_reaction(
                &uuid::Uuid::new_v4().to_string(),
                &req.message_id.to_string(),
                &session.member_id.to_string(),
                &req.value,
            )
            .map_err(internal)?;
        Ok(if added {
            ReactionChange::Added
        } else {
            ReactionChange::Removed
        })
    }

    // -- Channels --

    fn create_channel(&self, req: CreateChannelRequest) -> Result<ChannelId, RemoteError> {
        self.admin_session(req.workspace_id)?;
        let name = naming::channel_name(&req.name)?;
        let id = ChannelId::new();
        self.db
            .create_channel(
                &id.to_string(),
                &req.workspace_id.to_string(),
                &name,
                Utc::now().timestamp_millis(),
            )
            .map_err(internal)?;
        info!(channel_id = %id, %name, "channel created");
        Ok(id)
    }

    fn update_channel(&self, req: UpdateChannelRequest) -> Result<ChannelId, RemoteError> {
        let channel = self.load_channel(req.id)?;
        self.admin_session(channel.workspace_id)?;
        let name = naming::channel_name(&req.name)?;
        self.db.rename_channel(&req.id.to_string(), &name).map_err(internal)?;
        Ok(req.id)
    }

    fn remove_channel(&self, req: RemoveChannelRequest) -> Result<ChannelId, RemoteError> {
        let channel = self.load_channel(req.id)?;
        self.admin_session(channel.workspace_id)?;
        self.db.remove_channel(&req.id.to_string()).map_err(internal)?;
        info!(channel_id = %req.id, "channel removed");
        Ok(req.id)
    }

    // -- Workspaces --

    fn create_workspace(&self, req: CreateWorkspaceRequest) -> Result<WorkspaceId, RemoteError> {
        if self.db.get_user(&self.user_id.to_string()).map_err(internal)?.is_none() {
            return Err(RemoteError::unauthorized());
        }
        let name = naming::workspace_name(&req.name)?;
        let id = WorkspaceId::new();
        self.db
            .create_workspace(
                &id.to_string(),
                &name,
                &self.user_id.to_string(),
                &naming::generate_join_code(),
                Utc::now().timestamp_millis(),
                &MemberId::new().to_string(),
                &ChannelId::new().to_string(),
            )
            .map_err(internal)?;
        info!(workspace_id = %id, %name, "workspace created");
        Ok(id)
    }

    fn update_workspace(&self, req: UpdateWorkspaceRequest) -> Result<WorkspaceId, RemoteError> {
        self.load_workspace(req.id)?;
        self.admin_session(req.id)?;
        let name = naming::workspace_name(&req.name)?;
        self.db.rename_workspace(&req.id.to_string(), &name).map_err(internal)?;
        Ok(req.id)
    }

    fn new_join_code(&self, req: NewJoinCodeRequest) -> Result<WorkspaceId, RemoteError> {
        self.load_workspace(req.workspace_id)?;
        self.admin_session(req.workspace_id)?;
        self.db
            .set_join_code(&req.workspace_id.to_string(), &naming::generate_join_code())
            .map_err(internal)?;
        info!(workspace_id = %req.workspace_id, "join code rotated");
        Ok(req.workspace_id)
    }

    fn join_workspace(&self, req: JoinWorkspaceRequest) -> Result<WorkspaceId, RemoteError> {
        let workspace = self.load_workspace(req.workspace_id)?;
        if self.db.get_user(&self.user_id.to_string()).map_err(internal)?.is_none() {
            return Err(RemoteError::unauthorized());
        }
        if !naming::join_code_matches(&workspace.join_code, &req.join_code) {
            return Err(RemoteError::validation("Invalid join code"));
        }
        let existing = self
            .db
            .get_member_for_user(&workspace.id.to_string(), &self.user_id.to_string())
            .map_err(internal)?;
        if existing.is_some() {
            return Err(RemoteError::validation("Already a member of this workspace"));
        }
        self.db
            .insert_member(
                &MemberId::new().to_string(),
                &workspace.id.to_string(),
                &self.user_id.to_string(),
                Role::Member.as_str(),
            )
            .map_err(internal)?;
        info!(workspace_id = %workspace.id, user_id = %self.user_id, "joined workspace");
        Ok(workspace.id)
    }

    // -- Members --

    fn update_member(&self, req: UpdateMemberRequest) -> Result<MemberId, RemoteError> {
        let member = self.load_member(req.id)?;
        let session = self.session(member.workspace_id)?;
        if !session.can_change_role() {
            return Err(RemoteError::unauthorized());
        }
        self.db
            .set_member_role(&req.id.to_string(), req.role.as_str())
            .map_err(internal)?;
        Ok(req.id)
    }

    fn remove_member(&self, req: RemoveMemberRequest) -> Result<MemberId, RemoteError> {
        let member = self.load_member(req.id)?;
        let session = self.session(member.workspace_id)?;
        if !session.can_remove_member(member.id) {
            return Err(RemoteError::unauthorized());
        }
        self.db.remove_member(&req.id.to_string()).map_err(internal)?;
        info!(member_id = %req.id, "member removed");
        Ok(req.id)
    }

    // -- Uploads --

    fn generate_upload_url(&self) -> Result<String, RemoteError> {
        if self.db.get_user(&self.user_id.to_string()).map_err(internal)?.is_none() {
            return Err(RemoteError::unauthorized());
        }
        self.upload_url
            .clone()
            .ok_or_else(|| RemoteError::validation("Uploads are not configured"))
    }
}

impl MutationExecutor for LocalBackend {
    async fn execute(&self, operation: &str, payload: Value) -> Result<Value, RemoteError> {
        let operation = operation.to_string();
        self.blocking(move |this| this.dispatch(&operation, payload)).await
    }
}

impl MessageSource for LocalBackend {
    async fn fetch_page(&self, request: PageRequest) -> Result<PageSnapshot<Message>, RemoteError> {
        self.blocking(move |this| this.page(request)).await
    }
}

/// Decode the request, run `f`, encode the response.
fn handle<O>(
    payload: Value,
    f: impl FnOnce(O::Request) -> Result<O::Response, RemoteError>,
) -> Result<Value, RemoteError>
where
    O: Operation,
    O::Request: DeserializeOwned,
    O::Response: Serialize,
{
    let request: O::Request = serde_json::from_value(payload)
        .map_err(|e| RemoteError::validation(format!("Invalid {} request: {e}", O::NAME)))?;
    Ok(serde_json::to_value(f(request)?)?)
}

fn feed_key(cursor: PageCursor) -> FeedKey {
    (cursor.created_at_ms, cursor.id.to_string())
}

fn parse<T>(raw: &str) -> Result<T, RemoteError>
where
    T: std::str::FromStr<Err = uuid::Error>,
{
    crate::models::parse_id(raw).map_err(internal)
}

fn internal(e: anyhow::Error) -> RemoteError {
    error!("DB error: {:#}", e);
    RemoteError::internal("Internal error")
}
