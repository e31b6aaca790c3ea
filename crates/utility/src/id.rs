use std::{fmt, hash, marker::PhantomData};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Associates a Rust type with the shape of its stable identifier.
///
/// All entities in this system (§3) are keyed by a deterministic UUID, so
/// `IdType` is always `Uuid` here -- but keeping the association generic lets
/// [`Id<T>`] stay a distinct type per entity kind instead of everyone passing
/// bare `Uuid`s around.
pub trait HasId {
    type IdType;
}

pub struct Id<T: HasId>(T::IdType, PhantomData<T>);

impl<T: HasId> Id<T> {
    pub fn new(inner: T::IdType) -> Self {
        Self(inner, PhantomData)
    }
}

impl<T: HasId<IdType = Uuid>> Id<T> {
    pub fn raw(&self) -> Uuid {
        self.0
    }

    /// Derives a stable id from a fixed namespace and a canonical string built
    /// from the entity's natural key. Callers fix the namespace once per
    /// entity kind and never change it (spec §9 "Deterministic UUIDs").
    pub fn from_namespace(namespace: Uuid, canonical: &str) -> Self {
        Self::new(Uuid::new_v5(&namespace, canonical.as_bytes()))
    }
}

impl<T: HasId> fmt::Debug for Id<T>
where
    T::IdType: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Id").field(&self.0).finish()
    }
}

impl<T: HasId> fmt::Display for Id<T>
where
    T::IdType: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: HasId> Clone for Id<T>
where
    T::IdType: Clone,
{
    fn clone(&self) -> Self {
        Self(self.0.clone(), PhantomData)
    }
}

impl<T: HasId> Copy for Id<T> where T::IdType: Copy {}

impl<T: HasId> hash::Hash for Id<T>
where
    T::IdType: hash::Hash,
{
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl<T: HasId> PartialEq for Id<T>
where
    T::IdType: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl<T: HasId> Eq for Id<T> where T::IdType: Eq {}

impl<'de, T: HasId> Deserialize<'de> for Id<T>
where
    T::IdType: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        T::IdType::deserialize(deserializer).map(Id::new)
    }
}

impl<T: HasId> Serialize for Id<T>
where
    T::IdType: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing;
    impl HasId for Thing {
        type IdType = Uuid;
    }

    #[test]
    fn same_canonical_string_yields_same_id() {
        let ns = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"thing");
        let a: Id<Thing> = Id::from_namespace(ns, "server-1/run-42");
        let b: Id<Thing> = Id::from_namespace(ns, "server-1/run-42");
        let c: Id<Thing> = Id::from_namespace(ns, "server-1/run-43");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
