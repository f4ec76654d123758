use std::collections::HashMap;

use crate::providers::Message;

/// Stable index of a session inside its [`SessionStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(usize);

#[derive(Debug, Clone, Default)]
pub struct Session {
    id: String,
    history: Vec<Message>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// In-memory conversation histories keyed by session id.
///
/// Sessions are created on first use and live as long as the store. There is no
/// removal. The store is owned by the caller and handed around by `&mut`.
#[derive(Debug, Default)]
pub struct SessionStore {
    index: HashMap<String, SessionHandle>,
    sessions: Vec<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, id: &str) -> SessionHandle {
        if let Some(h) = self.index.get(id) {
            return *h;
        }
        let h = SessionHandle(self.sessions.len());
        self.sessions.push(Session {
            id: id.to_string(),
            history: Vec::new(),
        });
        self.index.insert(id.to_string(), h);
        tracing::debug!(session = id, "created session");
        h
    }

    pub fn get_or_create(&mut self, id: &str) -> &mut Vec<Message> {
        let h = self.handle(id);
        &mut self.sessions[h.0].history
    }

    pub fn session(&self, handle: SessionHandle) -> &Session {
        &self.sessions[handle.0]
    }

    pub fn session_mut(&mut self, handle: SessionHandle) -> &mut Session {
        &mut self.sessions[handle.0]
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.index.get(id).map(|h| &self.sessions[h.0])
    }

    /// Session ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_id_gets_an_empty_history() {
        let mut store = SessionStore::new();
        assert!(store.is_empty());
        assert!(store.get_or_create("chat1").is_empty());
        assert_eq!(store.len(), 1);
        assert!(store.get("chat1").is_some());
        assert!(store.get("chat2").is_none());
    }

    #[test]
    fn histories_are_isolated_per_session() {
        let mut store = SessionStore::new();
        store.get_or_create("a").push(Message::human("hi from a"));
        store.get_or_create("b").push(Message::human("hi from b"));
        store.get_or_create("a").push(Message::ai("hello a"));

        let a = store.get("a").unwrap();
        assert_eq!(a.id(), "a");
        assert_eq!(a.len(), 2);
        assert_eq!(store.get("b").unwrap().history(), &[Message::human("hi from b")]);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn handles_are_stable() {
        let mut store = SessionStore::new();
        let first = store.handle("x");
        store.handle("y");
        assert_eq!(store.handle("x"), first);
        store.session_mut(first).push(Message::system("s"));
        assert_eq!(store.session(first).history()[0], Message::system("s"));
        assert_eq!(store.len(), 2);
    }
}
