//! Peer/device bookkeeping (§3 `NodeList`, §9 "NodeList ownership").
//!
//! Abstractly the controller exclusively owns this map; receive loops only
//! ever call [`NodeList::add`] (idempotent), so a plain `HashMap` behind a
//! single mutex at the call site is sufficient — no internal locking here.

use std::collections::{HashMap, HashSet};

use crate::types::Eoj;

/// Devices observed from a single peer.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub devices: HashSet<Eoj>,
}

/// Peer-IP-string-keyed device table, populated from `Inf` announcements
/// and instance-list notifications (EPC `0xD5`).
#[derive(Debug, Default)]
pub struct NodeList {
    nodes: HashMap<String, Node>,
}

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `eoj` as seen from `peer`, creating the entry on first
    /// contact. Idempotent: re-adding an already-known device is a no-op.
    pub fn add(&mut self, peer: impl Into<String>, eoj: Eoj) {
        self.nodes.entry(peer.into()).or_default().devices.insert(eoj);
    }

    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn devices_of(&self, peer: &str) -> Option<&HashSet<Eoj>> {
        self.nodes.get(peer).map(|node| &node.devices)
    }

    /// Peers that have announced at least one device of `class`.
    pub fn peers_with_class(&self, class: crate::types::ClassCode) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.devices.iter().any(|eoj| eoj.class == class))
            .map(|(peer, _)| peer.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HOME_AIRCON_1;

    #[test]
    fn add_is_idempotent() {
        let mut list = NodeList::new();
        list.add("192.168.1.10", HOME_AIRCON_1);
        list.add("192.168.1.10", HOME_AIRCON_1);
        assert_eq!(list.devices_of("192.168.1.10").unwrap().len(), 1);
    }

    #[test]
    fn peers_with_class_finds_announced_aircons() {
        let mut list = NodeList::new();
        list.add("192.168.1.10", HOME_AIRCON_1);
        list.add("192.168.1.11", crate::types::SMART_METER_1);
        assert_eq!(list.peers_with_class(HOME_AIRCON_1.class), vec!["192.168.1.10"]);
    }
}
