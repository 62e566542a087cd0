//! Keeps the last known or requested value of every usage.

use std::collections::HashMap;

use crate::usage::KnownUsage;

/// Maps known usages to their on/off state.
///
/// Entries are created on first observation or first command. A missing
/// entry means the state is unknown, which is encoded as off.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StateStore {
    states: HashMap<KnownUsage, bool>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored value, [`None`] if the usage was never set.
    pub fn get(&self, usage: KnownUsage) -> Option<bool> {
        self.states.get(&usage).copied()
    }

    /// Whether the usage is known to be on.
    pub fn is_on(&self, usage: KnownUsage) -> bool {
        self.get(usage) == Some(true)
    }

    /// Stores a value and returns the previous one.
    pub fn set(&mut self, usage: KnownUsage, value: bool) -> Option<bool> {
        self.states.insert(usage, value)
    }

    /// Iterates over all stored entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (KnownUsage, bool)> + '_ {
        self.states.iter().map(|(&usage, &value)| (usage, value))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_off() {
        let store = StateStore::new();
        assert_eq!(store.get(KnownUsage::LedMute), None);
        assert!(!store.is_on(KnownUsage::LedMute));
    }

    #[test]
    fn test_set_returns_previous() {
        let mut store = StateStore::new();
        assert_eq!(store.set(KnownUsage::LedRing, true), None);
        assert_eq!(store.set(KnownUsage::LedRing, false), Some(true));
        assert_eq!(store.get(KnownUsage::LedRing), Some(false));
        assert_eq!(store.len(), 1);
    }
}
