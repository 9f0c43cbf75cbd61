//! Turns a loaded message list into a day-grouped rendering plan.
//!
//! Composition is a pure function of the input list and the current day, so
//! it can be re-run on every snapshot. Messages are bucketed by calendar day
//! in the composer's time zone, ordered oldest to newest, and flagged compact
//! when they closely follow a message from the same author.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use huddle_types::Message;
use huddle_types::api::ReactionGroup;

use crate::config::FeedConfig;
use crate::reactions;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub message: Message,
    /// Rendered without the author header.
    pub is_compact: bool,
    pub reactions: Vec<ReactionGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub label: String,
    /// Oldest first.
    pub entries: Vec<FeedEntry>,
}

impl DayGroup {
    /// Stable bucket key, `YYYY-MM-DD`.
    pub fn key(&self) -> String {
        self.day.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPlan {
    /// Oldest day first.
    pub days: Vec<DayGroup>,
}

impl FeedPlan {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FeedEntry> {
        self.days.iter().flat_map(|day| day.entries.iter())
    }
}

#[derive(Debug, Clone)]
pub struct FeedComposer<Tz: TimeZone> {
    tz: Tz,
    compact_threshold: Duration,
}

impl FeedComposer<Local> {
    pub fn local(config: &FeedConfig) -> Self {
        Self::new(Local, config)
    }
}

impl<Tz: TimeZone> FeedComposer<Tz>
where
    Tz::Offset: Display,
{
    pub fn new(tz: Tz, config: &FeedConfig) -> Self {
        Self {
            tz,
            compact_threshold: config.compact_threshold,
        }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    pub fn compose(&self, messages: &[Message]) -> FeedPlan {
        self.compose_on(messages, self.today())
    }

    /// Compose as seen on `today`, which only affects the day labels.
    pub fn compose_on(&self, messages: &[Message], today: NaiveDate) -> FeedPlan {
        let mut seen = HashSet::new();
        let mut buckets: BTreeMap<NaiveDate, Vec<&Message>> = BTreeMap::new();
        for message in messages {
            if seen.insert(message.id) {
                buckets.entry(self.day_of(message.created_at)).or_default().push(message);
            }
        }

        let days = buckets
            .into_iter()
            .map(|(day, mut bucket)| {
                bucket.sort_by_key(|m| (m.created_at, m.id));
                let entries = bucket
                    .iter()
                    .enumerate()
                    .map(|(i, message)| FeedEntry {
                        message: (*message).clone(),
                        is_compact: i > 0 && self.is_compact(bucket[i - 1], message),
                        reactions: reactions::aggregate(&message.reactions),
                    })
                    .collect();
                DayGroup {
                    day,
                    label: day_label(day, today),
                    entries,
                }
            })
            .collect();

        FeedPlan { days }
    }

    /// Same author and a gap strictly under the threshold.
    pub fn is_compact(&self, previous: &Message, message: &Message) -> bool {
        if previous.author_id != message.author_id {
            return false;
        }
        let gap = message.created_at.signed_duration_since(previous.created_at);
        gap.to_std().is_ok_and(|gap| gap < self.compact_threshold)
    }

    /// Hover label, e.g. `Today at 3:04:05 PM` or `Mar 4, 2024 at 9:00:00 AM`.
    pub fn full_time_label(&self, at: DateTime<Utc>, today: NaiveDate) -> String {
        let local = at.with_timezone(&self.tz);
        let day = local.date_naive();
        let prefix = if day == today {
            "Today".to_string()
        } else if Some(day) == today.pred_opt() {
            "Yesterday".to_string()
        } else {
            local.format("%b %-d, %Y").to_string()
        };
        format!("{prefix} at {}", local.format("%-I:%M:%S %p"))
    }

    /// Time shown next to the author name.
    pub fn header_time_label(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%-I:%M %p").to_string()
    }

    /// Time shown in the gutter of a compact message.
    pub fn compact_time_label(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%I:%M").to_string()
    }
}

/// `Today`, `Yesterday`, or e.g. `Monday, March 4`.
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if Some(day) == today.pred_opt() {
        "Yesterday".to_string()
    } else {
        day.format("%A, %B %-d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeDelta};

    use huddle_types::{MemberId, Reaction};

    use super::*;
    use crate::testing::{at, message};

    fn composer() -> FeedComposer<Utc> {
        FeedComposer::new(Utc, &FeedConfig::default())
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn compact_flags(plan: &FeedPlan) -> Vec<bool> {
        plan.entries().map(|e| e.is_compact).collect()
    }

    #[test]
    fn empty_input_yields_empty_plan() {
        let plan = composer().compose_on(&[], march(4));
        assert!(plan.is_empty());
    }

    #[test]
    fn compacts_close_messages_from_same_author() {
        let a = MemberId::new();
        let messages = vec![message(a, at(9, 10, 0)), message(a, at(9, 2, 0)), message(a, at(9, 0, 0))];

        let plan = composer().compose_on(&messages, march(4));

        assert_eq!(plan.days.len(), 1);
        assert_eq!(compact_flags(&plan), vec![false, true, false]);
        let times: Vec<_> = plan.entries().map(|e| e.message.created_at).collect();
        assert_eq!(times, vec![at(9, 0, 0), at(9, 2, 0), at(9, 10, 0)]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let a = MemberId::new();
        let start = at(9, 0, 0);
        let messages = vec![
            message(a, start),
            message(a, start + TimeDelta::milliseconds(299_999)),
            message(a, start + TimeDelta::milliseconds(299_999 + 300_000)),
        ];

        let plan = composer().compose_on(&messages, march(4));

        assert_eq!(compact_flags(&plan), vec![false, true, false]);
    }

    #[test]
    fn different_author_is_never_compact() {
        let messages = vec![message(MemberId::new(), at(9, 0, 0)), message(MemberId::new(), at(9, 0, 30))];
        let plan = composer().compose_on(&messages, march(4));
        assert_eq!(compact_flags(&plan), vec![false, false]);
    }

    #[test]
    fn first_message_of_a_day_is_not_compact() {
        let a = MemberId::new();
        let late = Utc.with_ymd_and_hms(2024, 3, 3, 23, 58, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 4, 0, 1, 0).unwrap();

        let plan = composer().compose_on(&[message(a, early), message(a, late)], march(4));

        assert_eq!(plan.days.len(), 2);
        assert_eq!(plan.days[0].label, "Yesterday");
        assert_eq!(plan.days[1].label, "Today");
        assert_eq!(compact_flags(&plan), vec![false, false]);
    }

    #[test]
    fn days_are_ordered_oldest_first_regardless_of_input_order() {
        let a = MemberId::new();
        let mut messages: Vec<_> = [1, 4, 2]
            .into_iter()
            .map(|d| message(a, Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()))
            .collect();

        let forward = composer().compose_on(&messages, march(4));
        messages.reverse();
        let backward = composer().compose_on(&messages, march(4));

        assert_eq!(forward, backward);
        let labels: Vec<_> = forward.days.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Friday, March 1", "Saturday, March 2", "Today"]);
        let keys: Vec<_> = forward.days.iter().map(DayGroup::key).collect();
        assert_eq!(keys, vec!["2024-03-01", "2024-03-02", "2024-03-04"]);
    }

    #[test]
    fn buckets_follow_the_composer_time_zone() {
        let a = MemberId::new();
        // 23:30 UTC on the 3rd is already the 4th at UTC+2.
        let msg = message(a, Utc.with_ymd_and_hms(2024, 3, 3, 23, 30, 0).unwrap());
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let utc_plan = composer().compose_on(std::slice::from_ref(&msg), march(4));
        let local_plan = FeedComposer::new(plus_two, &FeedConfig::default()).compose_on(&[msg], march(4));

        assert_eq!(utc_plan.days[0].label, "Yesterday");
        assert_eq!(local_plan.days[0].label, "Today");
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let a = MemberId::new();
        let first = message(a, at(9, 0, 0));
        let second = message(a, at(9, 1, 0));
        let messages = vec![second.clone(), first.clone(), second.clone()];

        let plan = composer().compose_on(&messages, march(4));

        assert_eq!(plan.entries().count(), 2);
        assert_eq!(compact_flags(&plan), vec![false, true]);
    }

    #[test]
    fn entries_carry_aggregated_reactions() {
        let a = MemberId::new();
        let b = MemberId::new();
        let mut msg = message(a, at(9, 0, 0));
        msg.reactions = vec![
            Reaction { message_id: msg.id, member_id: a, value: "👍".into() },
            Reaction { message_id: msg.id, member_id: b, value: "👍".into() },
        ];

        let plan = composer().compose_on(&[msg], march(4));

        let reactions = &plan.days[0].entries[0].reactions;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].count, 2);
    }

    #[test]
    fn time_labels() {
        let c = composer();
        assert_eq!(c.full_time_label(at(15, 4, 5), march(4)), "Today at 3:04:05 PM");
        assert_eq!(c.full_time_label(at(9, 0, 0), march(5)), "Yesterday at 9:00:00 AM");
        assert_eq!(c.full_time_label(at(9, 0, 0), march(9)), "Mar 4, 2024 at 9:00:00 AM");
        assert_eq!(c.header_time_label(at(15, 4, 5)), "3:04 PM");
        assert_eq!(c.compact_time_label(at(15, 4, 5)), "03:04");
    }
}
