use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;

use huddle_core::feed::FeedComposer;
use huddle_core::mutation::{MutateOptions, MutationController};
use huddle_core::naming;
use huddle_core::notice::{NoticeLevel, Notices};
use huddle_core::pagination::{PaginatedQuery, PaginationStatus};
use huddle_core::panel::PanelNavigator;
use huddle_core::reactions::{ReactionSet, aggregate};
use huddle_core::send::{Destination, MessageComposer, SendError};
use huddle_core::upload::{Attachment, HttpUploader};
use huddle_db::{Database, LocalBackend};
use huddle_types::api::*;
use huddle_types::query::MessageFilter;
use huddle_types::{Channel, Member, MessageId, MessageTarget, Workspace, WorkspaceId};

use crate::config::Settings;
use crate::render;

/// One invocation acting as the configured user.
pub struct App {
    settings: Settings,
    backend: Arc<LocalBackend>,
    notices: Notices,
}

impl App {
    pub fn open(settings: Settings, db: Arc<Database>) -> Result<Self> {
        let user = db
            .get_user_by_email(&settings.user)?
            .with_context(|| format!("unknown user {}; run `huddle seed` first", settings.user))?;
        let mut backend = LocalBackend::new(db, user.id.parse()?);
        if let Some(url) = &settings.upload_url {
            backend = backend.with_upload_url(url);
        }
        debug!(user = %settings.user, "acting as user");
        Ok(Self {
            settings,
            backend: Arc::new(backend),
            notices: Notices::new(),
        })
    }

    /// Print queued notices. Returns how many were errors.
    pub fn flush_notices(&self) -> usize {
        let mut errors = 0;
        for notice in self.notices.drain() {
            match notice.level {
                NoticeLevel::Success => println!("{}", notice.text),
                NoticeLevel::Error => {
                    errors += 1;
                    eprintln!("error: {}", notice.text);
                }
            }
        }
        errors
    }

    async fn workspace(&self) -> Result<Workspace> {
        let workspaces = self.backend.workspaces().await?;
        let found = match &self.settings.workspace {
            Some(name) => workspaces.into_iter().find(|w| w.name.eq_ignore_ascii_case(name)),
            None => workspaces.into_iter().next(),
        };
        found.context("no workspace found; run `huddle seed` or `huddle join`")
    }

    async fn member(&self, workspace_id: WorkspaceId) -> Result<Member> {
        Ok(self.backend.current_member(workspace_id).await?)
    }

    async fn channel(&self, workspace_id: WorkspaceId, name: &str) -> Result<Channel> {
        let wanted = naming::normalize_channel_name(name.trim_start_matches('#'));
        self.backend
            .channels(workspace_id)
            .await?
            .into_iter()
            .find(|c| c.name == wanted)
            .with_context(|| format!("no channel named #{wanted}"))
    }

    /// Run `O` through a controller, queueing a notice for the outcome.
    async fn perform<O>(
        &self,
        request: O::Request,
        done: impl FnOnce(&O::Response) -> String + Send,
    ) -> Option<O::Response>
    where
        O: Operation,
    {
        let controller = MutationController::<O, _>::new(self.backend.clone());
        let notices = &self.notices;
        let result = controller
            .mutate(
                request,
                MutateOptions::new()
                    .on_success(|data| notices.success(done(data)))
                    .on_error(|e| notices.error(e.to_string())),
            )
            .await;
        // Without throw_error a failure is already recorded as a notice.
        result.ok().flatten()
    }

    pub async fn feed(&self, channel: &str, pages: usize) -> Result<()> {
        let workspace = self.workspace().await?;
        let member = self.member(workspace.id).await?;
        let channel = self.channel(workspace.id, channel).await?;
        let config = self.settings.feed();

        let mut query = PaginatedQuery::new(self.backend.clone(), MessageFilter::Channel(channel.id), config.page_size);
        query.start().await?;
        for _ in 1..pages.max(1) {
            if !query.load_more().await? {
                break;
            }
        }

        let composer = FeedComposer::local(&config);
        let plan = composer.compose(query.results());
        println!("#{} in {}", channel.name, workspace.name);
        if plan.is_empty() {
            println!("No messages yet.");
        }
        print!("{}", render::feed(&plan, &composer, member.id));
        if query.status() == PaginationStatus::CanLoadMore {
            println!("(older messages available: --pages {})", pages.max(1) + 1);
        }
        Ok(())
    }

    pub async fn thread(&self, id: MessageId) -> Result<()> {
        let mut panel = PanelNavigator::new();
        panel.open_thread(id);

        let root = match self.backend.message(id).await {
            Ok(root) => root,
            Err(e) if e.is_not_found() => {
                panel.on_message_removed(id);
                println!("Message not found");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let member = self.member(root.workspace_id).await?;
        let config = self.settings.feed();
        let composer = FeedComposer::local(&config);
        print!("{}", render::thread_root(&root, &composer));

        let mut replies = PaginatedQuery::new(self.backend.clone(), MessageFilter::Thread(id), config.page_size);
        replies.start().await?;
        while replies.load_more().await? {}
        let plan = composer.compose(replies.results());
        print!("{}", render::feed(&plan, &composer, member.id));
        Ok(())
    }

    pub async fn send(
        &self,
        channel: &str,
        body: &str,
        image: Option<&Path>,
        reply_to: Option<MessageId>,
    ) -> Result<()> {
        let workspace = self.workspace().await?;
        let channel = self.channel(workspace.id, channel).await?;
        let destination = Destination {
            workspace_id: workspace.id,
            target: MessageTarget::Channel(channel.id),
            parent_message_id: reply_to,
        };
        let mut composer = MessageComposer::new(
            destination,
            self.backend.clone(),
            Arc::new(HttpUploader::default()),
            self.notices.clone(),
        );
        if !body.trim().is_empty() {
            composer.set_body(render::rich_text(body));
        }
        if let Some(path) = image {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            composer.attach(Attachment::new(content_type(path), bytes));
        }

        match composer.submit().await {
            Ok(id) => self.notices.success(format!("Sent {id} to #{}", channel.name)),
            Err(SendError::Empty) => bail!("nothing to send"),
            // The composer has already queued the failure notice.
            Err(e) => debug!(error = %e, "send failed"),
        }
        Ok(())
    }

    pub async fn edit(&self, id: MessageId, body: &str) -> Result<()> {
        let request = UpdateMessageRequest {
            id,
            body: render::rich_text(body),
        };
        self.perform::<UpdateMessage>(request, |_| "Message updated".to_string())
            .await;
        Ok(())
    }

    pub async fn delete(&self, id: MessageId) -> Result<()> {
        self.perform::<RemoveMessage>(RemoveMessageRequest { id }, |_| "Message deleted".to_string())
            .await;
        Ok(())
    }

    pub async fn react(&self, id: MessageId, value: &str) -> Result<()> {
        let message = self.backend.message(id).await?;
        let member = self.member(message.workspace_id).await?;

        // Predict the outcome locally; the store decides.
        let mut reactions = ReactionSet::from_rows(message.reactions);
        let expected = reactions.toggle(id, member.id, value);

        let request = ToggleReactionRequest {
            message_id: id,
            value: value.to_string(),
        };
        let shown = value.to_string();
        let confirmed = self
            .perform::<ToggleReaction>(request, move |change| match change {
                ReactionChange::Added => format!("Reacted with {shown}"),
                ReactionChange::Removed => format!("Removed {shown}"),
            })
            .await;

        let groups = match confirmed {
            Some(change) if change == expected => reactions.aggregate(id),
            Some(_) => {
                debug!(message_id = %id, "reaction changed underneath us, reloading");
                aggregate(&self.backend.message(id).await?.reactions)
            }
            None => return Ok(()),
        };
        println!("{}", render::reaction_chips(&groups, member.id));
        Ok(())
    }

    pub async fn rename_channel(&self, channel: &str, name: &str) -> Result<()> {
        let workspace = self.workspace().await?;
        let channel = self.channel(workspace.id, channel).await?;
        let shown = naming::normalize_channel_name(name);
        let request = UpdateChannelRequest {
            id: channel.id,
            name: name.to_string(),
        };
        self.perform::<UpdateChannel>(request, move |_| format!("Channel renamed to #{shown}"))
            .await;
        Ok(())
    }

    pub async fn new_join_code(&self) -> Result<()> {
        let workspace = self.workspace().await?;
        let request = NewJoinCodeRequest {
            workspace_id: workspace.id,
        };
        if self
            .perform::<NewJoinCode>(request, |_| "Invite code regenerated".to_string())
            .await
            .is_some()
        {
            let workspace = self.backend.workspace(workspace.id).await?;
            println!("Join code for {}: {}", workspace.name, workspace.join_code);
        }
        Ok(())
    }

    pub async fn join(&self, workspace: &str, join_code: &str) -> Result<()> {
        let workspace_id: WorkspaceId = workspace
            .parse()
            .map_err(|e| anyhow!("invalid workspace id {workspace}: {e}"))?;
        let request = JoinWorkspaceRequest {
            workspace_id,
            join_code: join_code.to_string(),
        };
        self.perform::<JoinWorkspace>(request, |id| format!("Joined workspace {id}"))
            .await;
        Ok(())
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type(Path::new("cat.PNG")), "image/png");
        assert_eq!(content_type(Path::new("a/b.jpeg")), "image/jpeg");
        assert_eq!(content_type(Path::new("notes")), "application/octet-stream");
    }

    #[tokio::test]
    async fn commands_run_against_a_seeded_store() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let report = crate::seed::run(db.clone()).await.unwrap();
        assert_eq!(report.users.len(), 3);

        let settings = Settings {
            db_path: ":memory:".into(),
            user: "grace@example.com".into(),
            workspace: None,
            upload_url: None,
            page_size: 4,
        };
        let app = App::open(settings, db.clone()).unwrap();

        app.send("#general", "hello from the test", None, None).await.unwrap();
        assert_eq!(app.flush_notices(), 0);

        let channels = app.backend.channels(report.workspace.id).await.unwrap();
        assert!(channels.iter().any(|c| c.name == "design-reviews"));

        app.rename_channel("general", "Town Square").await.unwrap();
        assert_eq!(app.flush_notices(), 1, "members may not rename channels");

        app.feed("general", 5).await.unwrap();
        app.new_join_code().await.unwrap();
        assert_eq!(app.flush_notices(), 1);

        let general = app.channel(report.workspace.id, "general").await.unwrap();
        let mut query = PaginatedQuery::new(app.backend.clone(), MessageFilter::Channel(general.id), 4);
        query.start().await.unwrap();
        let newest = query.results()[0].id;
        assert!(app.backend.message(newest).await.unwrap().reactions.is_empty());

        app.react(newest, "👀").await.unwrap();
        let stored = app.backend.message(newest).await.unwrap().reactions;
        assert_eq!(aggregate(&stored)[0].count, 1);
        app.react(newest, "👀").await.unwrap();
        assert!(app.backend.message(newest).await.unwrap().reactions.is_empty());
        assert_eq!(app.flush_notices(), 0);

        app.thread(newest).await.unwrap();
        assert_eq!(app.flush_notices(), 0);
    }
}
