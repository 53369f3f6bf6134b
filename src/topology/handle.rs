//! Strong, zero-cost handles for topology entities.
//!
//! Subdomains and interfaces live in arenas owned by
//! [`TopologyGraph`](crate::topology::graph::TopologyGraph); the handles here
//! are plain indices into those arenas. `SubdomainId` and `InterfaceId` are
//! `repr(transparent)` over `u32` so they stay as cheap as the integer they wrap,
//! while [`EntityId`] lets the registry and the DOF manager address either kind
//! uniformly.

use std::fmt;

/// Handle of a subdomain (graph node).
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct SubdomainId(u32);

/// Handle of an interface (graph edge).
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct InterfaceId(u32);

impl SubdomainId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        SubdomainId(arena_slot(index))
    }

    /// Arena index of this subdomain (creation order).
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl InterfaceId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        InterfaceId(arena_slot(index))
    }

    /// Arena index of this interface (creation order).
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena index as a `u32` handle; indices past `u32::MAX` saturate in release builds.
#[inline]
fn arena_slot(index: usize) -> u32 {
    debug_assert!(
        u32::try_from(index).is_ok(),
        "entity index {index} does not fit a u32 handle"
    );
    u32::try_from(index).unwrap_or(u32::MAX)
}

impl fmt::Debug for SubdomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubdomainId").field(&self.0).finish()
    }
}

impl fmt::Display for SubdomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subdomain {}", self.0)
    }
}

impl fmt::Debug for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterfaceId").field(&self.0).finish()
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interface {}", self.0)
    }
}

/// Either kind of topology entity.
///
/// The derived ordering sorts every subdomain before every interface and
/// each kind by creation order, which is exactly the traversal order used
/// for block numbering.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum EntityId {
    Subdomain(SubdomainId),
    Interface(InterfaceId),
}

impl EntityId {
    /// The subdomain handle, if this entity is a subdomain.
    #[inline]
    pub fn as_subdomain(self) -> Option<SubdomainId> {
        match self {
            EntityId::Subdomain(s) => Some(s),
            EntityId::Interface(_) => None,
        }
    }

    /// The interface handle, if this entity is an interface.
    #[inline]
    pub fn as_interface(self) -> Option<InterfaceId> {
        match self {
            EntityId::Interface(e) => Some(e),
            EntityId::Subdomain(_) => None,
        }
    }
}

impl From<SubdomainId> for EntityId {
    #[inline]
    fn from(id: SubdomainId) -> Self {
        EntityId::Subdomain(id)
    }
}

impl From<InterfaceId> for EntityId {
    #[inline]
    fn from(id: InterfaceId) -> Self {
        EntityId::Interface(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Subdomain(s) => s.fmt(f),
            EntityId::Interface(e) => e.fmt(f),
        }
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    assert_eq_size!(SubdomainId, u32);
    assert_eq_size!(InterfaceId, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomains_order_before_interfaces() {
        let s = EntityId::from(SubdomainId::from_index(7));
        let e = EntityId::from(InterfaceId::from_index(0));
        assert!(s < e);
        assert!(EntityId::from(SubdomainId::from_index(1)) < s);
    }

    #[test]
    fn display_names_kind() {
        assert_eq!(SubdomainId::from_index(3).to_string(), "subdomain 3");
        assert_eq!(
            EntityId::from(InterfaceId::from_index(2)).to_string(),
            "interface 2"
        );
        assert_eq!(format!("{:?}", SubdomainId::from_index(4)), "SubdomainId(4)");
    }

    #[test]
    fn largest_index_round_trips() {
        let last = u32::MAX as usize;
        assert_eq!(SubdomainId::from_index(last).index(), last);
        assert_eq!(InterfaceId::from_index(last).index(), last);
    }

    #[test]
    #[cfg(all(debug_assertions, target_pointer_width = "64"))]
    #[should_panic(expected = "does not fit a u32 handle")]
    fn oversized_index_is_caught() {
        let _ = SubdomainId::from_index(u32::MAX as usize + 1);
    }

    #[test]
    fn kind_accessors() {
        let s = SubdomainId::from_index(0);
        assert_eq!(EntityId::from(s).as_subdomain(), Some(s));
        assert_eq!(EntityId::from(s).as_interface(), None);
    }
}
