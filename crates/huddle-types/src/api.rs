use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{
    ChannelId, ConversationId, MemberId, MessageId, Role, StorageId, WorkspaceId,
};

/// A named remote write with a typed request and response.
///
/// The name is what the backend dispatches on; payloads travel as JSON.
pub trait Operation {
    const NAME: &'static str;
    type Request: Serialize + Send + Sync + 'static;
    type Response: DeserializeOwned + Clone + Send + Sync + 'static;
}

macro_rules! operation {
    ($marker:ident, $name:literal, $request:ty => $response:ty) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl Operation for $marker {
            const NAME: &'static str = $name;
            type Request = $request;
            type Response = $response;
        }
    };
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub body: String,
    pub image: Option<StorageId>,
    pub workspace_id: WorkspaceId,
    pub channel_id: Option<ChannelId>,
    pub conversation_id: Option<ConversationId>,
    pub parent_message_id: Option<MessageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMessageRequest {
    pub id: MessageId,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveMessageRequest {
    pub id: MessageId,
}

operation!(CreateMessage, "messages:create", CreateMessageRequest => MessageId);
operation!(UpdateMessage, "messages:update", UpdateMessageRequest => MessageId);
operation!(RemoveMessage, "messages:remove", RemoveMessageRequest => MessageId);

// -- Reactions --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub message_id: MessageId,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReactionChange {
    Added,
    Removed,
}

operation!(ToggleReaction, "reactions:toggle", ToggleReactionRequest => ReactionChange);

/// Reactions on one message collapsed by emoji value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionGroup {
    pub value: String,
    pub count: usize,
    pub member_ids: Vec<MemberId>,
}

impl ReactionGroup {
    pub fn includes(&self, member_id: MemberId) -> bool {
        self.member_ids.contains(&member_id)
    }
}

// -- Channels --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub workspace_id: WorkspaceId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateChannelRequest {
    pub id: ChannelId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveChannelRequest {
    pub id: ChannelId,
}

operation!(CreateChannel, "channels:create", CreateChannelRequest => ChannelId);
operation!(UpdateChannel, "channels:update", UpdateChannelRequest => ChannelId);
operation!(RemoveChannel, "channels:remove", RemoveChannelRequest => ChannelId);

// -- Workspaces --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateWorkspaceRequest {
    pub id: WorkspaceId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewJoinCodeRequest {
    pub workspace_id: WorkspaceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinWorkspaceRequest {
    pub workspace_id: WorkspaceId,
    pub join_code: String,
}

operation!(CreateWorkspace, "workspaces:create", CreateWorkspaceRequest => WorkspaceId);
operation!(UpdateWorkspace, "workspaces:update", UpdateWorkspaceRequest => WorkspaceId);
operation!(NewJoinCode, "workspaces:newJoinCode", NewJoinCodeRequest => WorkspaceId);
operation!(JoinWorkspace, "workspaces:join", JoinWorkspaceRequest => WorkspaceId);

// -- Members --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMemberRequest {
    pub id: MemberId,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveMemberRequest {
    pub id: MemberId,
}

operation!(UpdateMember, "members:update", UpdateMemberRequest => MemberId);
operation!(RemoveMember, "members:remove", RemoveMemberRequest => MemberId);

// -- Uploads --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateUploadUrlRequest {}

operation!(GenerateUploadUrl, "upload:generateUploadUrl", GenerateUploadUrlRequest => String);

/// Body returned by blob storage after a successful POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub storage_id: StorageId,
}
