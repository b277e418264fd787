use std::collections::HashMap;
use std::hash::Hash;

/// Identifies one issued request for a logical query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket<K> {
    key: K,
    generation: u64,
}

impl<K> Ticket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Last-request-wins bookkeeping: a generation counter per query key.
///
/// Every `begin` supersedes the previous ticket for the same key, so a slow response
/// for an old filter can never overwrite the view of a newer one.
#[derive(Debug)]
pub struct RequestTracker<K> {
    generations: HashMap<K, u64>,
}

impl<K: Eq + Hash + Clone> Default for RequestTracker<K> {
    fn default() -> Self {
        Self { generations: HashMap::new() }
    }
}

impl<K: Eq + Hash + Clone> RequestTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, key: K) -> Ticket<K> {
        let generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        Ticket { key, generation: *generation }
    }

    pub fn is_current(&self, ticket: &Ticket<K>) -> bool {
        self.generations.get(&ticket.key) == Some(&ticket.generation)
    }

    /// Hand back `value` only when `ticket` is still the newest for its key.
    pub fn accept<V>(&self, ticket: &Ticket<K>, value: V) -> Option<V> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            tracing::debug!(generation = ticket.generation, "discarding superseded response");
            None
        }
    }

    /// Invalidate whatever is in flight for `key`.
    pub fn cancel(&mut self, key: &K) {
        if let Some(g) = self.generations.get_mut(key) {
            *g += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_wins() {
        let mut t = RequestTracker::new();
        let a = t.begin("users");
        let b = t.begin("users");
        assert_eq!(t.accept(&a, "page 1"), None);
        assert_eq!(t.accept(&b, "page 2"), Some("page 2"));
    }

    #[test]
    fn out_of_order_completion_keeps_latest() {
        let mut t = RequestTracker::new();
        let first = t.begin(1);
        let second = t.begin(1);
        // second resolves before first
        assert!(t.accept(&second, ()).is_some());
        assert!(t.accept(&first, ()).is_none());
        assert!(t.is_current(&second));
    }

    #[test]
    fn keys_are_independent() {
        let mut t = RequestTracker::new();
        let u = t.begin("users");
        let h = t.begin("histogram");
        assert!(t.is_current(&u));
        assert!(t.is_current(&h));
        t.cancel(&"users");
        assert!(!t.is_current(&u));
        assert!(t.is_current(&h));
        assert_eq!(h.key(), &"histogram");
    }
}
