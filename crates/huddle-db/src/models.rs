/// Database row types. These map directly to SQLite rows and stay distinct
/// from the huddle-types models so the schema can change independently.
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};

use huddle_types::{
    Channel, Conversation, Member, Message, MessageTarget, Reaction, Role, ThreadSummary,
    UserProfile, Workspace,
};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
}

pub struct WorkspaceRow {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub join_code: String,
    pub created_at: i64,
}

/// A member joined with its user profile.
pub struct MemberRow {
    pub id: String,
    pub workspace_id: String,
    pub role: String,
    pub user: UserRow,
}

pub struct ChannelRow {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub created_at: i64,
}

pub struct ConversationRow {
    pub id: String,
    pub workspace_id: String,
    pub member_one_id: String,
    pub member_two_id: String,
}

/// A message joined with its author's name and image.
pub struct MessageRow {
    pub id: String,
    pub workspace_id: String,
    pub member_id: String,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub channel_id: Option<String>,
    pub conversation_id: Option<String>,
    pub parent_message_id: Option<String>,
    pub body: String,
    pub image: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

pub struct ReactionRow {
    pub id: String,
    pub message_id: String,
    pub member_id: String,
    pub value: String,
}

/// One thread reply, reduced to what a thread summary needs.
pub struct ReplyRow {
    pub parent_message_id: String,
    pub created_at: i64,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
}

pub fn parse_id<T>(raw: &str) -> Result<T>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse().with_context(|| format!("invalid id in database: {raw}"))
}

pub fn millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

impl UserRow {
    pub fn into_profile(self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: parse_id(&self.id)?,
            name: self.name,
            email: self.email,
            image: self.image,
        })
    }
}

impl WorkspaceRow {
    pub fn into_workspace(self) -> Result<Workspace> {
        Ok(Workspace {
            id: parse_id(&self.id)?,
            name: self.name,
            owner_id: parse_id(&self.owner_id)?,
            join_code: self.join_code,
            created_at: millis(self.created_at)?,
        })
    }
}

impl MemberRow {
    pub fn into_member(self) -> Result<Member> {
        Ok(Member {
            id: parse_id(&self.id)?,
            workspace_id: parse_id(&self.workspace_id)?,
            role: Role::from_str(&self.role).map_err(|e| anyhow!(e))?,
            user: self.user.into_profile()?,
        })
    }
}

impl ChannelRow {
    pub fn into_channel(self) -> Result<Channel> {
        Ok(Channel {
            id: parse_id(&self.id)?,
            workspace_id: parse_id(&self.workspace_id)?,
            name: self.name,
            created_at: millis(self.created_at)?,
        })
    }
}

impl ConversationRow {
    pub fn into_conversation(self) -> Result<Conversation> {
        Ok(Conversation {
            id: parse_id(&self.id)?,
            workspace_id: parse_id(&self.workspace_id)?,
            member_one: parse_id(&self.member_one_id)?,
            member_two: parse_id(&self.member_two_id)?,
        })
    }
}

impl MessageRow {
    pub fn target(&self) -> Result<MessageTarget> {
        match (&self.channel_id, &self.conversation_id) {
            (Some(id), None) => Ok(MessageTarget::Channel(parse_id(id)?)),
            (None, Some(id)) => Ok(MessageTarget::Conversation(parse_id(id)?)),
            _ => bail!("message {} must belong to exactly one channel or conversation", self.id),
        }
    }

    pub fn into_message(self, thread: Option<ThreadSummary>, reactions: Vec<Reaction>) -> Result<Message> {
        let target = self.target()?;
        Ok(Message {
            id: parse_id(&self.id)?,
            workspace_id: parse_id(&self.workspace_id)?,
            author_id: parse_id(&self.member_id)?,
            author_name: self.author_name,
            author_image: self.author_image,
            target,
            parent_message_id: self.parent_message_id.as_deref().map(parse_id).transpose()?,
            body: self.body,
            image: self.image,
            created_at: millis(self.created_at)?,
            updated_at: self.updated_at.map(millis).transpose()?,
            thread,
            reactions,
        })
    }
}

impl ReactionRow {
    pub fn into_reaction(self) -> Result<Reaction> {
        Ok(Reaction {
            message_id: parse_id(&self.message_id)?,
            member_id: parse_id(&self.member_id)?,
            value: self.value,
        })
    }
}
