//! In-memory session state, kept synchronized with the document stores.
//!
//! Holds the working copies of the message and group collections plus the
//! peer directory. All mutation funnels through the dispatch flow or the
//! coordinator's lock, so each check-then-insert cycle here is atomic.

use std::collections::HashSet;

use tracing::{debug, warn};

use confab_shared::{Group, GroupId, Message, MessageId};
use confab_store::{DocumentStore, Query};

use crate::directory::PeerDirectory;

pub struct SessionState {
    pub directory: PeerDirectory,
    messages: Vec<Message>,
    message_ids: HashSet<MessageId>,
    groups: Vec<Group>,
    message_store: DocumentStore<Message>,
    group_store: DocumentStore<Group>,
}

impl SessionState {
    /// Load the working copies from the durable collections.
    pub fn open(message_store: DocumentStore<Message>, group_store: DocumentStore<Group>) -> Self {
        let messages = message_store.find_all();
        let message_ids = messages.iter().map(|m| m.id).collect();
        let groups = group_store.find_all();

        debug!(
            messages = messages.len(),
            groups = groups.len(),
            "session state loaded"
        );

        Self {
            directory: PeerDirectory::new(),
            messages,
            message_ids,
            groups,
            message_store,
            group_store,
        }
    }

    /// Dedup-gate a message into the session: a message whose id is
    /// already held is discarded exactly-once. Accepted messages are
    /// appended to the working copy and persisted.
    pub fn accept_message(&mut self, message: Message) -> bool {
        if !self.message_ids.insert(message.id) {
            debug!(message = %message.id, "duplicate message discarded");
            return false;
        }
        if let Err(e) = self.message_store.insert_one(&message) {
            // The working copy stays authoritative for this session even
            // when the snapshot write fails.
            warn!(message = %message.id, error = %e, "failed to persist message");
        }
        self.messages.push(message);
        true
    }

    /// Insert a group definition if its id is unknown. Returns `true`
    /// iff newly inserted.
    pub fn accept_group(&mut self, group: Group) -> bool {
        if self.groups.iter().any(|g| g.id == group.id) {
            debug!(group = %group.id, "group already known");
            return false;
        }
        if let Err(e) = self.group_store.insert_one(&group) {
            warn!(group = %group.id, error = %e, "failed to persist group");
        }
        debug!(group = %group.id, name = %group.name, "group added");
        self.groups.push(group);
        true
    }

    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| &g.id == id)
    }

    /// Refresh a group's conversation summary in memory and on disk.
    pub fn touch_group_summary(&mut self, group_id: &GroupId, summary: &str) {
        let Some(group) = self.groups.iter_mut().find(|g| &g.id == group_id) else {
            return;
        };
        group.last_message = summary.to_string();

        let result = self.group_store.update_one(
            &Query::new().eq("id", group_id.to_string()),
            serde_json::json!({ "last_message": summary }),
        );
        if let Err(e) = result {
            warn!(group = %group_id, error = %e, "failed to persist group summary");
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_shared::IdentityId;

    fn open_state(dir: &tempfile::TempDir) -> SessionState {
        SessionState::open(
            DocumentStore::open(dir.path().join("messages.json")).unwrap(),
            DocumentStore::open(dir.path().join("groups.json")).unwrap(),
        )
    }

    fn id(s: &str) -> IdentityId {
        IdentityId(s.into())
    }

    #[test]
    fn test_accept_message_dedups_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);

        let msg = Message::direct(id("alice"), id("bob"), "hi".into(), false);
        assert!(state.accept_message(msg.clone()));
        assert!(!state.accept_message(msg));
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let mut state = open_state(&dir);
            state.accept_message(Message::direct(id("alice"), id("bob"), "kept".into(), false));
            state.accept_group(Group::new("tea".into(), id("alice"), vec![id("bob")]));
        }

        let mut state = open_state(&dir);
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].body, "kept");
        assert_eq!(state.groups().len(), 1);

        // The dedup set is rebuilt from the loaded history.
        let duplicate = state.messages()[0].clone();
        assert!(!state.accept_message(duplicate));
    }

    #[test]
    fn test_group_summary_touch() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);

        let group = Group::new("tea".into(), id("alice"), vec![id("bob")]);
        let group_id = group.id;
        state.accept_group(group);
        state.touch_group_summary(&group_id, "see you at five");

        assert_eq!(state.group(&group_id).unwrap().last_message, "see you at five");

        // And the durable copy agrees after a reload.
        drop(state);
        let state = open_state(&dir);
        assert_eq!(state.groups()[0].last_message, "see you at five");
    }

    #[test]
    fn test_accept_group_idempotent_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open_state(&dir);

        let group = Group::new("tea".into(), id("alice"), vec![id("bob")]);
        assert!(state.accept_group(group.clone()));
        assert!(!state.accept_group(group));
        assert_eq!(state.groups().len(), 1);
    }
}
