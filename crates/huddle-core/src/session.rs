//! The signed-in member and what they are allowed to do.

use huddle_types::{Member, MemberId, Message, Role, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub member_id: MemberId,
    pub workspace_id: WorkspaceId,
    pub role: Role,
}

impl Session {
    pub fn of(member: &Member) -> Self {
        Self {
            member_id: member.id,
            workspace_id: member.workspace_id,
            role: member.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Create, rename and delete channels; rename the workspace; rotate the
    /// join code.
    pub fn can_manage_workspace(&self) -> bool {
        self.is_admin()
    }

    pub fn can_change_role(&self) -> bool {
        self.is_admin()
    }

    /// Only the author edits or deletes a message.
    pub fn can_modify_message(&self, message: &Message) -> bool {
        message.author_id == self.member_id
    }

    /// Admins remove others; members may only leave. An admin cannot remove
    /// themself.
    pub fn can_remove_member(&self, target: MemberId) -> bool {
        if target == self.member_id {
            !self.is_admin()
        } else {
            self.is_admin()
        }
    }
}
