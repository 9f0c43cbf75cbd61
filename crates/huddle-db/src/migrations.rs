use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT UNIQUE,
            image       TEXT
        );

        CREATE TABLE IF NOT EXISTS workspaces (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            join_code   TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS members (
            id            TEXT PRIMARY KEY,
            workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
            user_id       TEXT NOT NULL REFERENCES users(id),
            role          TEXT NOT NULL CHECK (role IN ('admin', 'member')),
            UNIQUE(workspace_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS channels (
            id            TEXT PRIMARY KEY,
            workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
            name          TEXT NOT NULL,
            created_at    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_channels_workspace
            ON channels(workspace_id);

        CREATE TABLE IF NOT EXISTS conversations (
            id             TEXT PRIMARY KEY,
            workspace_id   TEXT NOT NULL REFERENCES workspaces(id),
            member_one_id  TEXT NOT NULL REFERENCES members(id),
            member_two_id  TEXT NOT NULL REFERENCES members(id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                 TEXT PRIMARY KEY,
            workspace_id       TEXT NOT NULL REFERENCES workspaces(id),
            member_id          TEXT NOT NULL REFERENCES members(id),
            channel_id         TEXT REFERENCES channels(id),
            conversation_id    TEXT REFERENCES conversations(id),
            parent_message_id  TEXT REFERENCES messages(id),
            body               TEXT NOT NULL,
            image              TEXT,
            created_at         INTEGER NOT NULL,
            updated_at         INTEGER,
            CHECK ((channel_id IS NULL) <> (conversation_id IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, parent_message_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, parent_message_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_parent
            ON messages(parent_message_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_member
            ON messages(member_id);

        CREATE TABLE IF NOT EXISTS reactions (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES messages(id),
            member_id   TEXT NOT NULL REFERENCES members(id),
            value       TEXT NOT NULL,
            UNIQUE(message_id, member_id, value)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
