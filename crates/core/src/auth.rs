use serde::{Deserialize, Serialize};

use crate::GroupId;

/// Acting member resolved by the command gateway for one inbound command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    actor_id: String,
    group_id: GroupId,
}

impl ActorIdentity {
    /// Creates an actor identity scoped to the group the command was issued in.
    #[must_use]
    pub fn new(actor_id: impl Into<String>, group_id: GroupId) -> Self {
        Self {
            actor_id: actor_id.into(),
            group_id,
        }
    }

    /// Returns the stable platform id of the acting member.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        self.actor_id.as_str()
    }

    /// Returns the group the command was issued in.
    #[must_use]
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }
}
