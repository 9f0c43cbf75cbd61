//! Reaction rows and their per-emoji aggregate.

use huddle_types::api::{ReactionChange, ReactionGroup};
use huddle_types::{MemberId, MessageId, Reaction};

/// Collapse rows by emoji value, in order of each value's first occurrence.
///
/// `member_ids` is a set: a member appears once per group and `count` is the
/// size of that set.
pub fn aggregate(rows: &[Reaction]) -> Vec<ReactionGroup> {
    let mut groups: Vec<ReactionGroup> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|g| g.value == row.value) {
            Some(group) => {
                if !group.includes(row.member_id) {
                    group.member_ids.push(row.member_id);
                    group.count += 1;
                }
            }
            None => groups.push(ReactionGroup {
                value: row.value.clone(),
                count: 1,
                member_ids: vec![row.member_id],
            }),
        }
    }
    groups
}

/// Reaction rows keyed by exact (message, member, value) triple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionSet {
    rows: Vec<Reaction>,
}

impl ReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows, dropping duplicate triples.
    pub fn from_rows(rows: impl IntoIterator<Item = Reaction>) -> Self {
        let mut set = Self::new();
        for row in rows {
            if !set.rows.contains(&row) {
                set.rows.push(row);
            }
        }
        set
    }

    /// Remove the exact triple if present, otherwise insert it.
    ///
    /// A member may hold several different values on one message.
    pub fn toggle(&mut self, message_id: MessageId, member_id: MemberId, value: &str) -> ReactionChange {
        match self.position(message_id, member_id, value) {
            Some(index) => {
                self.rows.remove(index);
                ReactionChange::Removed
            }
            None => {
                self.rows.push(Reaction {
                    message_id,
                    member_id,
                    value: value.to_string(),
                });
                ReactionChange::Added
            }
        }
    }

    pub fn aggregate(&self, message_id: MessageId) -> Vec<ReactionGroup> {
        let rows: Vec<Reaction> = self
            .rows
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect();
        aggregate(&rows)
    }

    fn position(&self, message_id: MessageId, member_id: MemberId, value: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.message_id == message_id && r.member_id == member_id && r.value == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(message_id: MessageId, member_id: MemberId, value: &str) -> Reaction {
        Reaction {
            message_id,
            member_id,
            value: value.to_string(),
        }
    }

    #[test]
    fn groups_in_first_occurrence_order() {
        let msg = MessageId::new();
        let (a, b) = (MemberId::new(), MemberId::new());
        let rows = vec![row(msg, a, "🎉"), row(msg, b, "👍"), row(msg, b, "🎉")];

        let groups = aggregate(&rows);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].value, "🎉");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].member_ids, vec![a, b]);
        assert_eq!(groups[1].value, "👍");
        assert_eq!(groups[1].count, 1);
        assert!(groups[1].includes(b));
        assert!(!groups[1].includes(a));
    }

    #[test]
    fn duplicate_rows_count_once() {
        let msg = MessageId::new();
        let a = MemberId::new();
        let groups = aggregate(&[row(msg, a, "👍"), row(msg, a, "👍")]);
        assert_eq!(groups[0].count, 1);
    }

    #[test]
    fn toggle_twice_restores_aggregate() {
        let msg = MessageId::new();
        let (a, b) = (MemberId::new(), MemberId::new());
        let mut set = ReactionSet::from_rows([row(msg, b, "👍"), row(msg, a, "🎉")]);
        let before = set.aggregate(msg);

        assert_eq!(set.toggle(msg, a, "👍"), ReactionChange::Added);
        assert_eq!(set.aggregate(msg)[0].count, 2);
        assert_eq!(set.toggle(msg, a, "👍"), ReactionChange::Removed);

        assert_eq!(set.aggregate(msg), before);
    }

    #[test]
    fn member_may_hold_several_values() {
        let msg = MessageId::new();
        let a = MemberId::new();
        let mut set = ReactionSet::new();
        set.toggle(msg, a, "👍");
        set.toggle(msg, a, "🎉");
        set.toggle(msg, a, "🚀");

        assert_eq!(set.aggregate(msg).len(), 3);
        assert_eq!(set.toggle(msg, a, "🎉"), ReactionChange::Removed);
    }

    #[test]
    fn toggle_is_scoped_to_the_message() {
        let (m1, m2) = (MessageId::new(), MessageId::new());
        let a = MemberId::new();
        let mut set = ReactionSet::new();
        set.toggle(m1, a, "👍");
        set.toggle(m2, a, "👍");

        assert_eq!(set.toggle(m1, a, "👍"), ReactionChange::Removed);
        assert!(set.aggregate(m1).is_empty());
        assert_eq!(set.aggregate(m2).len(), 1);
    }
}
