//! # Trixel Identifier
//!
//! HTM (Hierarchical Triangular Mesh) identifiers.
//!
//! The sphere is split into 8 base triangles whose ids are `8..=15`
//! (`S0..S3`, `N0..N3`). Each triangle is subdivided into 4 children,
//! so a child id is `parent << 2 | k` and every level adds two bits:
//!
//! ```text
//! N3   = 0b1111          (level 0)
//! N32  = 0b1111_10       (level 1)
//! N320 = 0b1111_10_00    (level 2)
//! ```
//!
//! The hierarchy is fully derivable from the integer, so no node graph
//! is stored anywhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::DirectoryError;

/// Number of base partitions.
pub const ROOT_COUNT: usize = 8;

/// Children per trixel.
pub const BRANCHING_FACTOR: usize = 4;

/// Deepest supported level.
pub const MAX_LEVEL: u8 = 24;

/// HTM trixel identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct TrixelId(u64);

/// The 8 base partitions in id order.
pub const ROOTS: [TrixelId; ROOT_COUNT] = [
    TrixelId(8),
    TrixelId(9),
    TrixelId(10),
    TrixelId(11),
    TrixelId(12),
    TrixelId(13),
    TrixelId(14),
    TrixelId(15),
];

impl TrixelId {
    /// Validate a raw HTM id.
    pub fn new(raw: u64) -> Result<Self, DirectoryError> {
        match level_of(raw) {
            Some(_) => Ok(Self(raw)),
            None => Err(DirectoryError::InvalidTrixelId(raw)),
        }
    }

    /// The base partitions.
    pub fn roots() -> [TrixelId; ROOT_COUNT] {
        ROOTS
    }

    /// Raw integer value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Level below the base partitions (roots are level 0).
    pub fn depth(self) -> u8 {
        // Valid by construction.
        ((63 - self.0.leading_zeros() - 3) / 2) as u8
    }

    /// Whether this is one of the 8 base partitions.
    pub fn is_root(self) -> bool {
        self.0 < 16
    }

    /// Whether the trixel lies on the northern hemisphere.
    pub fn is_north(self) -> bool {
        self.root().0 >= 12
    }

    /// Parent trixel.
    pub fn parent(self) -> Result<TrixelId, DirectoryError> {
        if self.is_root() {
            return Err(DirectoryError::RootHasNoParent(self));
        }
        Ok(Self(self.0 >> 2))
    }

    /// The 4 children in ascending id order.
    pub fn children(self) -> Result<[TrixelId; BRANCHING_FACTOR], DirectoryError> {
        if self.depth() >= MAX_LEVEL {
            return Err(DirectoryError::MaxDepthExceeded(self));
        }
        let base = self.0 << 2;
        Ok([Self(base), Self(base | 1), Self(base | 2), Self(base | 3)])
    }

    /// Child number `index` (0..4).
    pub fn child(self, index: u8) -> Result<TrixelId, DirectoryError> {
        let children = self.children()?;
        children
            .get(index as usize)
            .copied()
            .ok_or(DirectoryError::InvalidTrixelId((self.0 << 2) | index as u64))
    }

    /// Position of this trixel among its siblings, `None` for roots.
    pub fn child_index(self) -> Option<u8> {
        if self.is_root() {
            None
        } else {
            Some((self.0 & 0b11) as u8)
        }
    }

    /// Strict ancestry: `self` is above `other` in the hierarchy.
    pub fn is_ancestor_of(self, other: TrixelId) -> bool {
        let (mine, theirs) = (self.depth(), other.depth());
        mine < theirs && other.0 >> (2 * (theirs - mine) as u32) == self.0
    }

    /// `self` equals `other` or is one of its ancestors.
    pub fn contains(self, other: TrixelId) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// Either subtree contains the other.
    pub fn overlaps(self, other: TrixelId) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Base partition this trixel descends from.
    pub fn root(self) -> TrixelId {
        Self(self.0 >> (2 * self.depth() as u32))
    }

    /// Strict ancestors, nearest first, ending at the root.
    pub fn ancestors(self) -> Ancestors {
        Ancestors {
            next: self.parent().ok(),
        }
    }

    /// `self` followed by its ancestors.
    pub fn lineage(self) -> impl Iterator<Item = TrixelId> {
        std::iter::once(self).chain(self.ancestors())
    }

    /// HTM name such as `N320`.
    pub fn name(self) -> String {
        let depth = self.depth() as usize;
        let mut name = String::with_capacity(depth + 2);
        let root = self.root().0;
        name.push(if self.is_north() { 'N' } else { 'S' });
        name.push(char::from(b'0' + (root & 0b11) as u8));
        for level in (0..depth).rev() {
            let digit = (self.0 >> (2 * level)) & 0b11;
            name.push(char::from(b'0' + digit as u8));
        }
        name
    }

    /// Parse an HTM name such as `S01`.
    pub fn from_name(name: &str) -> Result<Self, DirectoryError> {
        let invalid = || DirectoryError::InvalidTrixelName(name.to_string());
        let bytes = name.as_bytes();
        if bytes.len() < 2 || bytes.len() > MAX_LEVEL as usize + 2 {
            return Err(invalid());
        }
        let mut raw: u64 = match bytes[0] {
            b'N' | b'n' => 3,
            b'S' | b's' => 2,
            _ => return Err(invalid()),
        };
        for &b in &bytes[1..] {
            if !(b'0'..=b'3').contains(&b) {
                return Err(invalid());
            }
            raw = (raw << 2) | u64::from(b - b'0');
        }
        Ok(Self(raw))
    }
}

/// Level of a raw id, `None` if the id is not valid HTM.
fn level_of(raw: u64) -> Option<u8> {
    if raw < 8 {
        return None;
    }
    let bits = 64 - raw.leading_zeros();
    if bits % 2 != 0 {
        return None;
    }
    let level = (bits - 4) / 2;
    if level > MAX_LEVEL as u32 {
        return None;
    }
    Some(level as u8)
}

/// Iterator over strict ancestors of a trixel.
#[derive(Clone, Debug)]
pub struct Ancestors {
    next: Option<TrixelId>,
}

impl Iterator for Ancestors {
    type Item = TrixelId;

    fn next(&mut self) -> Option<TrixelId> {
        let current = self.next?;
        self.next = current.parent().ok();
        Some(current)
    }
}

impl fmt::Display for TrixelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for TrixelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrixelId({}={})", self.name(), self.0)
    }
}

impl TryFrom<u64> for TrixelId {
    type Error = DirectoryError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<TrixelId> for u64 {
    fn from(id: TrixelId) -> u64 {
        id.0
    }
}

/// Accepts either an HTM name (`N32`) or a decimal id (`62`).
impl FromStr for TrixelId {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes().first() {
            Some(b'N' | b'n' | b'S' | b's') => Self::from_name(s),
            _ => {
                let raw = s
                    .parse::<u64>()
                    .map_err(|_| DirectoryError::InvalidTrixelName(s.to_string()))?;
                Self::new(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: u64) -> TrixelId {
        TrixelId::new(raw).unwrap()
    }

    #[test]
    fn test_roots_are_eight_to_fifteen() {
        let raws: Vec<u64> = TrixelId::roots().iter().map(|r| r.raw()).collect();
        assert_eq!(raws, (8..16).collect::<Vec<_>>());
        assert!(ROOTS.iter().all(|r| r.is_root() && r.depth() == 0));
    }

    #[test]
    fn test_invalid_ids_rejected() {
        for raw in [0, 1, 7, 16, 31, 64, 127] {
            assert_eq!(TrixelId::new(raw), Err(DirectoryError::InvalidTrixelId(raw)));
        }
    }

    #[test]
    fn test_max_level_bound() {
        let mut id = t(15);
        for _ in 0..MAX_LEVEL {
            id = id.child(3).unwrap();
        }
        assert_eq!(id.depth(), MAX_LEVEL);
        assert!(matches!(id.children(), Err(DirectoryError::MaxDepthExceeded(_))));
        assert!(TrixelId::new(id.raw() << 2).is_err());
    }

    #[test]
    fn test_parent_of_root_fails() {
        assert_eq!(t(12).parent(), Err(DirectoryError::RootHasNoParent(t(12))));
    }

    #[test]
    fn test_children_ordering_and_depth() {
        let parent = t(13);
        let children = parent.children().unwrap();
        assert_eq!(children.map(|c| c.raw()), [52, 53, 54, 55]);
        for child in children {
            assert_eq!(child.depth(), parent.depth() + 1);
            assert_eq!(child.parent().unwrap(), parent);
        }
    }

    #[test]
    fn test_ancestors_strictly_decreasing_to_root() {
        let leaf = t(15).child(2).unwrap().child(0).unwrap().child(3).unwrap();
        let ancestors: Vec<_> = leaf.ancestors().collect();
        assert_eq!(ancestors.len(), 3);
        assert!(ancestors.windows(2).all(|w| w[0].raw() > w[1].raw()));
        assert_eq!(*ancestors.last().unwrap(), t(15));
        assert_eq!(leaf.root(), t(15));
    }

    #[test]
    fn test_is_ancestor_of_is_strict() {
        let root = t(9);
        let child = root.child(1).unwrap();
        let grandchild = child.child(0).unwrap();
        assert!(root.is_ancestor_of(grandchild));
        assert!(child.is_ancestor_of(grandchild));
        assert!(!root.is_ancestor_of(root));
        assert!(!grandchild.is_ancestor_of(root));
        assert!(!t(10).is_ancestor_of(grandchild));
        assert!(root.contains(root));
        assert!(grandchild.overlaps(root));
    }

    #[test]
    fn test_sibling_subtrees_do_not_overlap() {
        let [a, b, _, _] = t(8).children().unwrap();
        assert!(!a.overlaps(b));
        assert!(!a.child(0).unwrap().overlaps(b));
    }

    #[test]
    fn test_names() {
        assert_eq!(t(8).name(), "S0");
        assert_eq!(t(15).name(), "N3");
        let n32 = t(15).child(2).unwrap();
        assert_eq!(n32.name(), "N32");
        assert_eq!(n32.child(0).unwrap().to_string(), "N320");
    }

    #[test]
    fn test_parse_name_and_decimal() {
        let n320 = t(15).child(2).unwrap().child(0).unwrap();
        assert_eq!("N320".parse::<TrixelId>().unwrap(), n320);
        assert_eq!(n320.raw().to_string().parse::<TrixelId>().unwrap(), n320);
        assert!("X1".parse::<TrixelId>().is_err());
        assert!("N4".parse::<TrixelId>().is_err());
        assert!("N".parse::<TrixelId>().is_err());
        assert!("16".parse::<TrixelId>().is_err());
    }

    #[test]
    fn test_child_index() {
        assert_eq!(t(8).child_index(), None);
        assert_eq!(t(8).child(3).unwrap().child_index(), Some(3));
    }

    #[test]
    fn test_serde_uses_raw_integer() {
        let json = serde_json::to_string(&t(14)).unwrap();
        assert_eq!(json, "14");
        assert!(serde_json::from_str::<TrixelId>("17").is_err());
    }

    #[test]
    fn test_hemisphere() {
        assert!(t(12).child(0).unwrap().is_north());
        assert!(!t(11).is_north());
    }
}
