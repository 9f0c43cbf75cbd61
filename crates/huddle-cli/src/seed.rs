//! Demo data: three users, one workspace and a few days of history.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use huddle_core::MutationController;
use huddle_db::queries::NewMessage;
use huddle_db::{Database, LocalBackend};
use huddle_types::api::{
    CreateChannel, CreateChannelRequest, CreateWorkspace, CreateWorkspaceRequest, JoinWorkspace,
    JoinWorkspaceRequest,
};
use huddle_types::{ChannelId, MemberId, MessageId, UserId, Workspace, WorkspaceId};

use crate::render::rich_text;

const USERS: [(&str, &str); 3] = [
    ("Ada Lovelace", "ada@example.com"),
    ("Grace Hopper", "grace@example.com"),
    ("Alan Turing", "alan@example.com"),
];

/// (author index, minutes before now, text)
const HISTORY: [(usize, i64, &str); 10] = [
    (0, 2 * 1440 + 90, "Morning! The new loom cards arrived."),
    (0, 2 * 1440 + 88, "I'll start punching the Bernoulli program today."),
    (1, 2 * 1440 + 60, "Nice. Want a second pair of eyes on the loops?"),
    (2, 1440 + 30, "Reading group moved to Thursday."),
    (2, 1440 + 29, "Same room as last time."),
    (2, 1440 + 20, "Bring questions about computable numbers."),
    (1, 45, "Found a moth in relay 70, panel F."),
    (1, 44, "Taped it into the logbook."),
    (0, 12, "First actual case of a bug being found."),
    (1, 3, "Deploying the fix after lunch."),
];

pub struct SeedReport {
    pub workspace: Workspace,
    pub users: Vec<String>,
}

pub async fn run(db: Arc<Database>) -> Result<SeedReport> {
    if db.get_user_by_email(USERS[0].1)?.is_some() {
        bail!("database is already seeded");
    }

    let mut user_ids = Vec::new();
    for (name, email) in USERS {
        let id = UserId::new();
        db.create_user(&id.to_string(), name, Some(email), None)?;
        user_ids.push(id);
    }

    let owner = LocalBackend::new(db.clone(), user_ids[0]);
    let workspace_id = MutationController::<CreateWorkspace, _>::new(Arc::new(owner.clone()))
        .run(CreateWorkspaceRequest {
            name: "Analytical Engines".into(),
        })
        .await
        .into_result()?;
    let workspace = owner.workspace(workspace_id).await?;

    for user_id in &user_ids[1..] {
        let backend = Arc::new(owner.acting_as(*user_id));
        MutationController::<JoinWorkspace, _>::new(backend)
            .run(JoinWorkspaceRequest {
                workspace_id,
                join_code: workspace.join_code.clone(),
            })
            .await
            .into_result()?;
    }

    MutationController::<CreateChannel, _>::new(Arc::new(owner.clone()))
        .run(CreateChannelRequest {
            workspace_id,
            name: "Design Reviews".into(),
        })
        .await
        .into_result()?;

    let general = owner
        .channels(workspace_id)
        .await?
        .into_iter()
        .find(|c| c.name == "general")
        .map(|c| c.id)
        .context("workspace has no general channel")?;

    let mut members: Vec<MemberId> = Vec::new();
    for user_id in &user_ids {
        members.push(owner.acting_as(*user_id).current_member(workspace_id).await?.id);
    }

    let now = Utc::now();
    let mut posted = Vec::new();
    for (author, minutes_ago, text) in HISTORY {
        let created_at = (now - Duration::minutes(minutes_ago)).timestamp_millis();
        let id = insert(&db, workspace_id, general, members[author], None, text, created_at)?;
        posted.push((id, created_at));
    }

    // A short thread under Grace's question, and a few reactions.
    let (root, root_at) = posted[2];
    for (i, (author, text)) in [(0, "Yes please, loop 3 looks off."), (1, "On it.")]
        .into_iter()
        .enumerate()
    {
        let at = root_at + (i as i64 + 1) * 120_000;
        insert(&db, workspace_id, general, members[author], Some(root), text, at)?;
    }
    for (message, member, value) in [(6, 0, "🦋"), (6, 2, "🦋"), (8, 1, "😄"), (9, 0, "🚀")] {
        db.toggle_reaction(
            &Uuid::new_v4().to_string(),
            &posted[message].0.to_string(),
            &members[member].to_string(),
            value,
        )?;
    }

    info!(workspace_id = %workspace_id, messages = posted.len(), "seeded demo workspace");
    Ok(SeedReport {
        workspace,
        users: USERS.iter().map(|(_, email)| email.to_string()).collect(),
    })
}

fn insert(
    db: &Database,
    workspace_id: WorkspaceId,
    channel_id: ChannelId,
    member_id: MemberId,
    parent: Option<MessageId>,
    text: &str,
    created_at: i64,
) -> Result<MessageId> {
    let id = MessageId::new();
    let parent = parent.map(|p| p.to_string());
    db.insert_message(&NewMessage {
        id: &id.to_string(),
        workspace_id: &workspace_id.to_string(),
        member_id: &member_id.to_string(),
        channel_id: Some(&channel_id.to_string()),
        conversation_id: None,
        parent_message_id: parent.as_deref(),
        body: &rich_text(text),
        image: None,
        created_at,
    })?;
    Ok(id)
}
