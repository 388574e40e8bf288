//! Named groups of lines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::line::LineId;

/// A collection of named buses, each an ordered list of lines.
///
/// Circuits keep three of these: input buses, output buses and state
/// signals. Names map to lines in bit order (least significant first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusCollection {
    buses: BTreeMap<String, Vec<LineId>>,
}

impl BusCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a bus.
    pub fn add(&mut self, name: impl Into<String>, lines: Vec<LineId>) {
        self.buses.insert(name.into(), lines);
    }

    /// Get the lines of a bus.
    pub fn get(&self, name: &str) -> Option<&[LineId]> {
        self.buses.get(name).map(Vec::as_slice)
    }

    /// Find the bus containing `line`.
    pub fn find(&self, line: LineId) -> Option<&str> {
        self.buses
            .iter()
            .find(|(_, lines)| lines.contains(&line))
            .map(|(name, _)| name.as_str())
    }

    /// Iterate over all buses in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[LineId])> {
        self.buses
            .iter()
            .map(|(name, lines)| (name.as_str(), lines.as_slice()))
    }

    /// Number of buses.
    pub fn len(&self) -> usize {
        self.buses.len()
    }

    /// Check if the collection has no buses.
    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let mut buses = BusCollection::new();
        buses.add("a", vec![LineId(0), LineId(1)]);
        buses.add("b", vec![LineId(2)]);

        assert_eq!(buses.len(), 2);
        assert_eq!(buses.get("a"), Some(&[LineId(0), LineId(1)][..]));
        assert_eq!(buses.find(LineId(2)), Some("b"));
        assert_eq!(buses.find(LineId(9)), None);
    }
}
