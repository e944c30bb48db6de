//! Traits and helpers for objects that can be loaded from and deleted in the
//! database by their id.

use crate::{Database, error::Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::sqlite::SqliteQueryResult;

/// A trait for database-backed objects that can be loaded or deleted given
/// their unique id.
#[async_trait]
pub trait Loadable: Sized + Send {
    type Id: Clone + PartialEq + Send + Sync + std::fmt::Debug;

    /// An id value that is guaranteed not to refer to any stored object
    fn invalid_id() -> Self::Id;

    fn id(&self) -> Self::Id;

    fn set_id(&mut self, id: Self::Id);

    /// Load the object with the given id from the database
    async fn load(id: Self::Id, db: &Database) -> Result<Self>;

    /// Delete the object with the given id from the database. The delete is
    /// unconditional; authorization must happen at the caller before invoking
    /// this.
    async fn delete_id(id: &Self::Id, db: &Database) -> Result<SqliteQueryResult>;

    /// Delete this object from the database and mark it as no longer loadable
    async fn delete(&mut self, db: &Database) -> Result<SqliteQueryResult> {
        let res = Self::delete_id(&self.id(), db).await?;
        self.set_id(Self::invalid_id());
        Ok(res)
    }
}

/// A non-owning reference to an object that belongs to another component.
///
/// Only the id is stored; the referenced object can be loaded on demand.
/// Deleting the referenced object elsewhere does not cascade into holders of
/// an `ExternalRef`, so a ref may dangle.
#[derive(Debug, Clone)]
pub enum ExternalRef<T: Loadable> {
    Stub(T::Id),
    Object(T),
}

impl<T: Loadable> ExternalRef<T> {
    /// The id of the referenced object, whether or not it has been loaded
    pub fn id(&self) -> T::Id {
        match self {
            ExternalRef::Stub(id) => id.clone(),
            ExternalRef::Object(obj) => obj.id(),
        }
    }

    /// Fetch the referenced object from the database if it hasn't been loaded yet
    pub async fn load(&mut self, db: &Database) -> Result<()> {
        if let ExternalRef::Stub(id) = self {
            let obj = T::load(id.clone(), db).await?;
            *self = ExternalRef::Object(obj);
        }
        Ok(())
    }

    /// The referenced object, if it has been loaded
    pub fn object(&self) -> Option<&T> {
        match self {
            ExternalRef::Stub(_) => None,
            ExternalRef::Object(obj) => Some(obj),
        }
    }
}

// Two refs are equal when they refer to the same object.
impl<T: Loadable> PartialEq for ExternalRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

// On the wire and inside JSON document columns a ref is just the bare id.
impl<T: Loadable<Id = i64>> Serialize for ExternalRef<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.id())
    }
}

impl<'de, T: Loadable<Id = i64>> Deserialize<'de> for ExternalRef<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(ExternalRef::Stub)
    }
}

impl<T: Loadable<Id = i64>> sqlx::Type<sqlx::Sqlite> for ExternalRef<T> {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'r, T: Loadable<Id = i64>> sqlx::Decode<'r, sqlx::Sqlite> for ExternalRef<T> {
    fn decode(
        value: sqlx::sqlite::SqliteValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        <i64 as sqlx::Decode<'r, sqlx::Sqlite>>::decode(value).map(ExternalRef::Stub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::User;

    #[test]
    fn refs_serialize_as_bare_ids() {
        let refs: Vec<ExternalRef<User>> =
            vec![ExternalRef::Stub(3), ExternalRef::Stub(1), ExternalRef::Stub(3)];
        let encoded = serde_json::to_string(&refs).expect("failed to serialize refs");
        assert_eq!(encoded, "[3,1,3]");
        let decoded: Vec<ExternalRef<User>> =
            serde_json::from_str(&encoded).expect("failed to deserialize refs");
        assert_eq!(decoded, refs);
    }
}
