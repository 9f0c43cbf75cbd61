use std::path::PathBuf;

use clap::Args;

use huddle_core::FeedConfig;
use huddle_core::config::DEFAULT_PAGE_SIZE;

/// Settings shared by every command. Each flag can also come from the
/// environment or a `.env` file.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SQLite database file
    #[arg(long = "db", env = "HUDDLE_DB_PATH", default_value = "huddle.db", global = true)]
    pub db_path: PathBuf,

    /// Email of the user to act as
    #[arg(long, env = "HUDDLE_USER", default_value = "ada@example.com", global = true)]
    pub user: String,

    /// Workspace name; defaults to the user's first workspace
    #[arg(long, env = "HUDDLE_WORKSPACE", global = true)]
    pub workspace: Option<String>,

    /// Blob storage endpoint handed out for attachments
    #[arg(long, env = "HUDDLE_UPLOAD_URL", global = true)]
    pub upload_url: Option<String>,

    /// Messages per page
    #[arg(long, env = "HUDDLE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE, global = true)]
    pub page_size: usize,
}

impl Settings {
    pub fn feed(&self) -> FeedConfig {
        FeedConfig::default().with_page_size(self.page_size)
    }
}
