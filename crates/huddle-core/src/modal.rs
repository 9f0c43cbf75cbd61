/// Which workspace-level dialog is showing. At most one at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveModal {
    #[default]
    None,
    CreateWorkspace,
    CreateChannel,
}

impl ActiveModal {
    pub fn is_open(&self) -> bool {
        *self != Self::None
    }

    /// Open `modal`, replacing whatever was showing.
    pub fn open(&mut self, modal: ActiveModal) {
        *self = modal;
    }

    /// Close only if `modal` is the one showing.
    pub fn dismiss(&mut self, modal: ActiveModal) {
        if *self == modal {
            *self = Self::None;
        }
    }

    pub fn close(&mut self) {
        *self = Self::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_replaces_the_current_modal() {
        let mut modal = ActiveModal::default();
        assert!(!modal.is_open());

        modal.open(ActiveModal::CreateWorkspace);
        modal.open(ActiveModal::CreateChannel);
        assert_eq!(modal, ActiveModal::CreateChannel);

        modal.dismiss(ActiveModal::CreateWorkspace);
        assert_eq!(modal, ActiveModal::CreateChannel);
        modal.dismiss(ActiveModal::CreateChannel);
        assert!(!modal.is_open());
    }
}
