//! Peer table: known node addresses and their election rank

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Election priority. Lower wins.
pub type Rank = i64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerTable(BTreeMap<String, Rank>);

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry table holding only this node.
    pub fn with_self(address: impl Into<String>, rank: Rank) -> Self {
        let mut table = Self::new();
        table.upsert(address, rank);
        table
    }

    pub fn get(&self, address: &str) -> Option<Rank> {
        self.0.get(address).copied()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains_key(address)
    }

    /// Insert or overwrite one entry, returning the previous rank.
    pub fn upsert(&mut self, address: impl Into<String>, rank: Rank) -> Option<Rank> {
        self.0.insert(address.into(), rank)
    }

    /// Union with `incoming`. Addresses already known keep their local rank.
    /// Returns how many entries were added.
    pub fn merge(&mut self, incoming: &PeerTable) -> usize {
        let mut added = 0;
        for (address, &rank) in incoming.iter() {
            if !self.0.contains_key(address) {
                self.0.insert(address.clone(), rank);
                added += 1;
            }
        }
        added
    }

    /// Every entry except `me`.
    pub fn others<'a>(&'a self, me: &'a str) -> impl Iterator<Item = (&'a String, Rank)> + 'a {
        self.0
            .iter()
            .filter(move |(address, _)| address.as_str() != me)
            .map(|(address, &rank)| (address, rank))
    }

    /// Peers that outrank `rank` (numerically lower), excluding `me`.
    pub fn lower_ranked(&self, me: &str, rank: Rank) -> Vec<(String, Rank)> {
        self.others(me)
            .filter(|&(_, r)| r < rank)
            .map(|(address, r)| (address.clone(), r))
            .collect()
    }

    /// Best-ranked entry in the table.
    pub fn lowest(&self) -> Option<(&str, Rank)> {
        self.0
            .iter()
            .min_by_key(|(_, rank)| **rank)
            .map(|(address, &rank)| (address.as_str(), rank))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Rank)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Rank)> for PeerTable {
    fn from_iter<I: IntoIterator<Item = (S, Rank)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(a, r)| (a.into(), r)).collect())
    }
}

impl std::fmt::Display for PeerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (address, rank)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", address, rank)?;
        }
        f.write_str("}")
    }
}
