use crate::Database;
use crate::models::{
    ChannelRow, ConversationRow, MemberRow, MessageRow, ReactionRow, ReplyRow, UserRow, WorkspaceRow,
};
use anyhow::Result;
use huddle_types::query::MessageFilter;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};

const MEMBER_SELECT: &str = "SELECT mem.id, mem.workspace_id, mem.role, u.id, u.name, u.email, u.image
     FROM members mem
     JOIN users u ON u.id = mem.user_id";

const MESSAGE_SELECT: &str = "SELECT m.id, m.workspace_id, m.member_id, u.name, u.image, m.channel_id,
            m.conversation_id, m.parent_message_id, m.body, m.image, m.created_at, m.updated_at
     FROM messages m
     LEFT JOIN members mem ON mem.id = m.member_id
     LEFT JOIN users u ON u.id = mem.user_id";

/// Position of a message in a feed: `(created_at, id)`.
pub type FeedKey = (i64, String);

/// Everything needed to insert a message row.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub workspace_id: &'a str,
    pub member_id: &'a str,
    pub channel_id: Option<&'a str>,
    pub conversation_id: Option<&'a str>,
    pub parent_message_id: Option<&'a str>,
    pub body: &'a str,
    pub image: Option<&'a str>,
    pub created_at: i64,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, name: &str, email: Option<&str>, image: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, image) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, email, image],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, image FROM users WHERE id = ?1",
                [id],
                user_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, image FROM users WHERE email = ?1",
                [email],
                user_row,
            )
            .optional()
        })
    }

    // -- Workspaces --

    /// Insert a workspace together with its owner's admin membership and a
    /// `general` channel.
    #[allow(clippy::too_many_arguments)]
    pub fn create_workspace(
        &self,
        id: &str,
        name: &str,
        owner_id: &str,
        join_code: &str,
        created_at: i64,
        admin_member_id: &str,
        general_channel_id: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO workspaces (id, name, owner_id, join_code, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, name, owner_id, join_code, created_at],
            )?;
            tx.execute(
                "INSERT INTO members (id, workspace_id, user_id, role) VALUES (?1, ?2, ?3, 'admin')",
                params![admin_member_id, id, owner_id],
            )?;
            tx.execute(
                "INSERT INTO channels (id, workspace_id, name, created_at) VALUES (?1, ?2, 'general', ?3)",
                params![general_channel_id, id, created_at],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_workspace(&self, id: &str) -> Result<Option<WorkspaceRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, owner_id, join_code, created_at FROM workspaces WHERE id = ?1",
                [id],
                workspace_row,
            )
            .optional()
        })
    }

    /// Workspaces the user belongs to, oldest first.
    pub fn list_workspaces_for_user(&self, user_id: &str) -> Result<Vec<WorkspaceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.name, w.owner_id, w.join_code, w.created_at
                 FROM workspaces w
                 JOIN members mem ON mem.workspace_id = w.id
                 WHERE mem.user_id = ?1
                 ORDER BY w.created_at, w.id",
            )?;
            let rows = stmt
                .query_map([user_id], workspace_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn rename_workspace(&self, id: &str, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE workspaces SET name = ?2 WHERE id = ?1", params![id, name])?;
            Ok(n > 0)
        })
    }

    pub fn set_join_code(&self, id: &str, join_code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE workspaces SET join_code = ?2 WHERE id = ?1",
                params![id, join_code],
            )?;
            Ok(n > 0)
        })
    }

    // -- Members --

    pub fn insert_member(&self, id: &str, workspace_id: &str, user_id: &str, role: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO members (id, workspace_id, user_id, role) VALUES (?1, ?2, ?3, ?4)",
                params![id, workspace_id, user_id, role],
            )?;
            Ok(())
        })
    }

    pub fn get_member(&self, id: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{MEMBER_SELECT} WHERE mem.id = ?1"), [id], member_row)
                .optional()
        })
    }

    pub fn get_member_for_user(&self, workspace_id: &str, user_id: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{MEMBER_SELECT} WHERE mem.workspace_id = ?1 AND mem.user_id = ?2"),
                [workspace_id, user_id],
                member_row,
            )
            .optional()
        })
    }

    pub fn list_members(&self, workspace_id: &str) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MEMBER_SELECT} WHERE mem.workspace_id = ?1 ORDER BY u.name, mem.id"
            ))?;
            let rows = stmt
                .query_map([workspace_id], member_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_member_role(&self, id: &str, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE members SET role = ?2 WHERE id = ?1", params![id, role])?;
            Ok(n > 0)
        })
    }

    /// Remove a member along with their reactions, their messages and the
    /// direct conversations they took part in.
    pub fn remove_member(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM reactions WHERE member_id = ?1", [id])?;
            delete_messages_where(&tx, "member_id = ?1", id)?;
            delete_messages_where(
                &tx,
                "conversation_id IN (SELECT id FROM conversations WHERE member_one_id = ?1 OR member_two_id = ?1)",
                id,
            )?;
            tx.execute(
                "DELETE FROM conversations WHERE member_one_id = ?1 OR member_two_id = ?1",
                [id],
            )?;
            tx.execute("DELETE FROM members WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    // -- Channels --

    pub fn create_channel(&self, id: &str, workspace_id: &str, name: &str, created_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, workspace_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, workspace_id, name, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_channel(&self, id: &str) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, workspace_id, name, created_at FROM channels WHERE id = ?1",
                [id],
                channel_row,
            )
            .optional()
        })
    }

    pub fn list_channels(&self, workspace_id: &str) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, workspace_id, name, created_at FROM channels
                 WHERE workspace_id = ?1
                 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([workspace_id], channel_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn rename_channel(&self, id: &str, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE channels SET name = ?2 WHERE id = ?1", params![id, name])?;
            Ok(n > 0)
        })
    }

    /// Remove a channel and every message posted in it.
    pub fn remove_channel(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            delete_messages_where(&tx, "channel_id = ?1", id)?;
            tx.execute("DELETE FROM channels WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    // -- Conversations --

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, workspace_id, member_one_id, member_two_id FROM conversations WHERE id = ?1",
                [id],
                conversation_row,
            )
            .optional()
        })
    }

    /// Find the conversation between two members in either order, creating
    /// it under `new_id` if there is none.
    pub fn get_or_create_conversation(
        &self,
        new_id: &str,
        workspace_id: &str,
        member_one_id: &str,
        member_two_id: &str,
    ) -> Result<ConversationRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(
                    "SELECT id, workspace_id, member_one_id, member_two_id FROM conversations
                     WHERE workspace_id = ?1
                       AND ((member_one_id = ?2 AND member_two_id = ?3)
                         OR (member_one_id = ?3 AND member_two_id = ?2))",
                    [workspace_id, member_one_id, member_two_id],
                    conversation_row,
                )
                .optional()?;
            let row = match existing {
                Some(row) => row,
                None => {
                    tx.execute(
                        "INSERT INTO conversations (id, workspace_id, member_one_id, member_two_id)
                         VALUES (?1, ?2, ?3, ?4)",
                        [new_id, workspace_id, member_one_id, member_two_id],
                    )?;
                    ConversationRow {
                        id: new_id.to_string(),
                        workspace_id: workspace_id.to_string(),
                        member_one_id: member_one_id.to_string(),
                        member_two_id: member_two_id.to_string(),
                    }
                }
            };
            tx.commit()?;
            Ok(row)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &NewMessage<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, workspace_id, member_id, channel_id, conversation_id,
                                       parent_message_id, body, image, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    message.id,
                    message.workspace_id,
                    message.member_id,
                    message.channel_id,
                    message.conversation_id,
                    message.parent_message_id,
                    message.body,
                    message.image,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"), [id], message_row)
                .optional()
        })
    }

    pub fn update_message_body(&self, id: &str, body: &str, updated_at: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET body = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, body, updated_at],
            )?;
            Ok(n > 0)
        })
    }

    /// Remove a message with its reactions and, for a thread root, its
    /// replies.
    pub fn remove_message(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            delete_messages_where(&tx, "id = ?1", id)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// One page of a message stream, newest first.
    ///
    /// `before` is exclusive, `until` inclusive. `limit` caps the row count
    /// when given.
    pub fn message_page(
        &self,
        filter: &MessageFilter,
        before: Option<&FeedKey>,
        until: Option<&FeedKey>,
        limit: Option<usize>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let (clause, key) = filter_clause(filter);
            let mut sql = format!("{MESSAGE_SELECT} WHERE {clause}");
            let mut values = vec![Value::Text(key)];
            if let Some((created_at, id)) = before {
                sql.push_str(" AND (m.created_at, m.id) < (?, ?)");
                values.push(Value::Integer(*created_at));
                values.push(Value::Text(id.clone()));
            }
            if let Some((created_at, id)) = until {
                sql.push_str(" AND (m.created_at, m.id) >= (?, ?)");
                values.push(Value::Integer(*created_at));
                values.push(Value::Text(id.clone()));
            }
            sql.push_str(" ORDER BY m.created_at DESC, m.id DESC");
            if let Some(limit) = limit {
                sql.push_str(" LIMIT ?");
                values.push(Value::Integer(limit as i64));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Whether the stream holds anything older than `key`.
    pub fn has_messages_before(&self, filter: &MessageFilter, key: &FeedKey) -> Result<bool> {
        self.with_conn(|conn| {
            let (clause, value) = filter_clause(filter);
            let sql = format!(
                "SELECT EXISTS (SELECT 1 FROM messages m WHERE {clause} AND (m.created_at, m.id) < (?, ?))"
            );
            let exists = conn.query_row(&sql, params![value, key.0, key.1], |row| row.get(0))?;
            Ok(exists)
        })
    }

    /// Replies to the given thread roots, oldest first.
    pub fn get_replies_for_messages(&self, parent_ids: &[String]) -> Result<Vec<ReplyRow>> {
        if parent_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT m.parent_message_id, m.created_at, u.name, u.image
                 FROM messages m
                 LEFT JOIN members mem ON mem.id = m.member_id
                 LEFT JOIN users u ON u.id = mem.user_id
                 WHERE m.parent_message_id IN ({})
                 ORDER BY m.created_at, m.id",
                placeholders(parent_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(parent_ids), |row| {
                    Ok(ReplyRow {
                        parent_message_id: row.get(0)?,
                        created_at: row.get(1)?,
                        author_name: row.get(2)?,
                        author_image: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    /// Toggle a reaction: removes the exact (message, member, value) row if
    /// it exists, inserts it under `id` if not. Returns whether it was added.
    pub fn toggle_reaction(&self, id: &str, message_id: &str, member_id: &str, value: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM reactions WHERE message_id = ?1 AND member_id = ?2 AND value = ?3",
                    params![message_id, member_id, value],
                    |row| row.get(0),
                )
                .optional()?;

            let added = if let Some(existing_id) = existing {
                tx.execute("DELETE FROM reactions WHERE id = ?1", [&existing_id])?;
                false
            } else {
                tx.execute(
                    "INSERT INTO reactions (id, message_id, member_id, value) VALUES (?1, ?2, ?3, ?4)",
                    params![id, message_id, member_id, value],
                )?;
                true
            };
            tx.commit()?;
            Ok(added)
        })
    }

    /// Batch-fetch reactions for a set of message IDs, in insertion order.
    pub fn get_reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, message_id, member_id, value FROM reactions
                 WHERE message_id IN ({})
                 ORDER BY rowid",
                placeholders(message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(message_ids), |row| {
                    Ok(ReactionRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        member_id: row.get(2)?,
                        value: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Delete the messages matching `condition` (bound to `?1`), their replies,
/// and the reactions on both.
fn delete_messages_where(conn: &Connection, condition: &str, param: &str) -> Result<()> {
    let targets = format!("SELECT id FROM messages WHERE {condition}");
    conn.execute(
        &format!(
            "DELETE FROM reactions WHERE message_id IN ({targets})
                OR message_id IN (SELECT id FROM messages WHERE parent_message_id IN ({targets}))"
        ),
        [param],
    )?;
    conn.execute(
        &format!("DELETE FROM messages WHERE parent_message_id IN ({targets})"),
        [param],
    )?;
    conn.execute(&format!("DELETE FROM messages WHERE {condition}"), [param])?;
    Ok(())
}

fn filter_clause(filter: &MessageFilter) -> (&'static str, String) {
    match filter {
        MessageFilter::Channel(id) => ("m.channel_id = ? AND m.parent_message_id IS NULL", id.to_string()),
        MessageFilter::Conversation(id) => {
            ("m.conversation_id = ? AND m.parent_message_id IS NULL", id.to_string())
        }
        MessageFilter::Thread(id) => ("m.parent_message_id = ?", id.to_string()),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
    })
}

fn workspace_row(row: &Row<'_>) -> rusqlite::Result<WorkspaceRow> {
    Ok(WorkspaceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        join_code: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn member_row(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        role: row.get(2)?,
        user: UserRow {
            id: row.get(3)?,
            name: row.get(4)?,
            email: row.get(5)?,
            image: row.get(6)?,
        },
    })
}

fn channel_row(row: &Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn conversation_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        member_one_id: row.get(2)?,
        member_two_id: row.get(3)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        member_id: row.get(2)?,
        author_name: row.get(3)?,
        author_image: row.get(4)?,
        channel_id: row.get(5)?,
        conversation_id: row.get(6)?,
        parent_message_id: row.get(7)?,
        body: row.get(8)?,
        image: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
