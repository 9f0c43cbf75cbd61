mod commands;
mod config;
mod render;
mod seed;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use huddle_db::Database;
use huddle_types::MessageId;

use commands::App;
use config::Settings;

#[derive(Parser, Debug)]
#[command(name = "huddle", version, about = "Workspace chat from the terminal")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create demo users, a workspace and some history
    Seed,
    /// Show a channel's messages, newest page first
    Feed {
        channel: String,
        /// How many pages of history to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Post a message to a channel
    Send {
        channel: String,
        #[arg(default_value = "")]
        body: String,
        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
        /// Post as a reply in this message's thread
        #[arg(long)]
        reply_to: Option<MessageId>,
    },
    /// Replace the body of one of your messages
    Edit { id: MessageId, body: String },
    /// Delete one of your messages
    Delete { id: MessageId },
    /// Toggle a reaction on a message
    React { id: MessageId, emoji: String },
    /// Show a message and its replies
    Thread { id: MessageId },
    /// Rename a channel (admins only)
    RenameChannel { channel: String, name: String },
    /// Regenerate the workspace invite code (admins only)
    NewJoinCode,
    /// Join a workspace with its invite code
    Join { workspace_id: String, code: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let db = Arc::new(Database::open(&cli.settings.db_path)?);

    if let Command::Seed = cli.command {
        let report = seed::run(db).await?;
        info!(path = %cli.settings.db_path.display(), "seed complete");
        println!(
            "Seeded \"{}\" (join code {}) with users: {}",
            report.workspace.name,
            report.workspace.join_code,
            report.users.join(", ")
        );
        return Ok(ExitCode::SUCCESS);
    }

    let app = App::open(cli.settings, db)?;
    match cli.command {
        Command::Seed => {}
        Command::Feed { channel, pages } => app.feed(&channel, pages).await?,
        Command::Send {
            channel,
            body,
            image,
            reply_to,
        } => app.send(&channel, &body, image.as_deref(), reply_to).await?,
        Command::Edit { id, body } => app.edit(id, &body).await?,
        Command::Delete { id } => app.delete(id).await?,
        Command::React { id, emoji } => app.react(id, &emoji).await?,
        Command::Thread { id } => app.thread(id).await?,
        Command::RenameChannel { channel, name } => app.rename_channel(&channel, &name).await?,
        Command::NewJoinCode => app.new_join_code().await?,
        Command::Join { workspace_id, code } => app.join(&workspace_id, &code).await?,
    }

    if app.flush_notices() > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
