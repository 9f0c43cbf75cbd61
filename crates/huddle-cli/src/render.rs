//! Plain-text rendering of composed feeds.

use std::fmt::{Display, Write};

use chrono::TimeZone;
use serde_json::{Value, json};

use huddle_core::feed::{FeedComposer, FeedEntry, FeedPlan};
use huddle_types::api::ReactionGroup;
use huddle_types::{MemberId, Message};

/// Wrap plain text as a single-insert rich-text document.
pub fn rich_text(text: &str) -> String {
    json!({ "ops": [{ "insert": format!("{text}\n") }] }).to_string()
}

/// Flatten a rich-text document to its text. Bodies that are not rich-text
/// documents are shown as-is.
pub fn plain_text(body: &str) -> String {
    let Ok(doc) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let Some(ops) = doc.get("ops").and_then(Value::as_array) else {
        return body.to_string();
    };
    let text: String = ops
        .iter()
        .filter_map(|op| op.get("insert").and_then(Value::as_str))
        .collect();
    text.trim_end().to_string()
}

pub fn feed<Tz>(plan: &FeedPlan, composer: &FeedComposer<Tz>, viewer: MemberId) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    for day in &plan.days {
        let _ = writeln!(out, "── {} ──", day.label);
        for entry in &day.entries {
            entry_lines(&mut out, entry, composer, viewer);
        }
    }
    out
}

fn entry_lines<Tz>(out: &mut String, entry: &FeedEntry, composer: &FeedComposer<Tz>, viewer: MemberId)
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let message = &entry.message;
    let edited = if message.is_edited() { " (edited)" } else { "" };
    let text = plain_text(&message.body);

    if entry.is_compact {
        let _ = writeln!(out, "  {}  {text}{edited}", composer.compact_time_label(message.created_at));
    } else {
        let author = message.author_name.as_deref().unwrap_or("Member");
        let _ = writeln!(out, "{author}  {}", composer.header_time_label(message.created_at));
        let _ = writeln!(out, "         {text}{edited}");
    }
    let _ = writeln!(out, "         [{}]", message.id);

    if let Some(image) = &message.image {
        let _ = writeln!(out, "         [image {image}]");
    }
    if !entry.reactions.is_empty() {
        let _ = writeln!(out, "         {}", reaction_chips(&entry.reactions, viewer));
    }
    if let Some(thread) = &message.thread {
        let noun = if thread.reply_count == 1 { "reply" } else { "replies" };
        let who = thread.last_reply_author_name.as_deref().unwrap_or("Member");
        let _ = writeln!(
            out,
            "         ↳ {} {noun}, last by {who} {}",
            thread.reply_count,
            composer.header_time_label(thread.last_reply_at)
        );
    }
}

/// One chip per emoji; the viewer's own reactions are starred.
pub fn reaction_chips(groups: &[ReactionGroup], viewer: MemberId) -> String {
    let chips: Vec<String> = groups
        .iter()
        .map(|g| {
            let mine = if g.includes(viewer) { "*" } else { "" };
            format!("{}{} {}", mine, g.value, g.count)
        })
        .collect();
    chips.join("  ")
}

/// Header line for a thread root.
pub fn thread_root<Tz>(message: &Message, composer: &FeedComposer<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let author = message.author_name.as_deref().unwrap_or("Member");
    let today = composer.today();
    format!(
        "{author}  {}\n         {}\n",
        composer.full_time_label(message.created_at, today),
        plain_text(&message.body)
    )
}
