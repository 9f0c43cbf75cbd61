//! Side panel selection: a thread, a member profile, or nothing.

use huddle_types::{MemberId, MessageId};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanelState {
    #[default]
    Closed,
    Thread(MessageId),
    Profile(MemberId),
}

/// Sole owner of the panel state. Opening one panel replaces the other.
#[derive(Debug, Default)]
pub struct PanelNavigator {
    state: PanelState,
}

impl PanelNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != PanelState::Closed
    }

    pub fn thread_target(&self) -> Option<MessageId> {
        match self.state {
            PanelState::Thread(id) => Some(id),
            _ => None,
        }
    }

    pub fn profile_target(&self) -> Option<MemberId> {
        match self.state {
            PanelState::Profile(id) => Some(id),
            _ => None,
        }
    }

    pub fn open_thread(&mut self, message_id: MessageId) {
        debug!(%message_id, "opening thread panel");
        self.state = PanelState::Thread(message_id);
    }

    pub fn open_profile(&mut self, member_id: MemberId) {
        debug!(%member_id, "opening profile panel");
        self.state = PanelState::Profile(member_id);
    }

    pub fn close(&mut self) {
        self.state = PanelState::Closed;
    }

    /// Close the thread panel if it shows `message_id`. Returns whether it did.
    pub fn on_message_removed(&mut self, message_id: MessageId) -> bool {
        if self.thread_target() == Some(message_id) {
            self.close();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_replaces_thread() {
        let mut nav = PanelNavigator::new();
        let (a, b) = (MessageId::new(), MemberId::new());

        nav.open_thread(a);
        assert_eq!(nav.thread_target(), Some(a));
        nav.open_profile(b);

        assert_eq!(nav.thread_target(), None);
        assert_eq!(nav.profile_target(), Some(b));
    }

    #[test]
    fn thread_replaces_profile() {
        let mut nav = PanelNavigator::new();
        nav.open_profile(MemberId::new());
        let id = MessageId::new();
        nav.open_thread(id);
        assert_eq!(nav.state(), PanelState::Thread(id));
        assert_eq!(nav.profile_target(), None);
    }

    #[test]
    fn close_from_any_state() {
        let mut nav = PanelNavigator::new();
        nav.close();
        assert_eq!(nav.state(), PanelState::Closed);

        nav.open_thread(MessageId::new());
        nav.close();
        assert!(!nav.is_open());

        nav.open_profile(MemberId::new());
        nav.close();
        assert_eq!(nav.thread_target(), None);
        assert_eq!(nav.profile_target(), None);
    }

    #[test]
    fn removing_the_thread_root_closes_the_panel() {
        let mut nav = PanelNavigator::new();
        let root = MessageId::new();
        nav.open_thread(root);

        assert!(!nav.on_message_removed(MessageId::new()));
        assert!(nav.is_open());
        assert!(nav.on_message_removed(root));
        assert!(!nav.is_open());
    }

    #[test]
    fn removal_leaves_profile_open() {
        let mut nav = PanelNavigator::new();
        let member = MemberId::new();
        nav.open_profile(member);
        assert!(!nav.on_message_removed(MessageId::new()));
        assert_eq!(nav.profile_target(), Some(member));
    }
}
