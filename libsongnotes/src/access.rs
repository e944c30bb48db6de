//! A generic ownership gate that can be instantiated for any resource kind
//! that records an owner.

use crate::{
    Database,
    error::{Error, Result},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use strum_macros::{Display, EnumString};
use tracing::warn;

/// The kinds of resources whose ownership can be checked. The label is used in
/// error messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Collection,
    Note,
    User,
}

/// A capability implemented by every resource type that records an owner.
///
/// Implementing this trait is what makes a resource checkable by
/// [AccessControl]; each implementation queries its own store, so a checker
/// cannot be pointed at the wrong table.
#[async_trait]
pub trait Owned {
    const KIND: ResourceKind;

    /// Look up the recorded owner of the resource with the given id. Fails
    /// with [Error::NotFound] when the id does not resolve to a stored object.
    async fn owner_of(id: i64, db: &Database) -> Result<i64>;
}

/// An ownership check service for a single resource kind.
///
/// Construct one per resource kind during process initialization and hand it
/// to the request-handling layer. The check reports success by *not*
/// returning an error; callers can distinguish a missing resource
/// ([Error::NotFound]) from one owned by somebody else ([Error::NotOwner]).
pub struct AccessControl<R: Owned> {
    db: Database,
    resource: PhantomData<fn() -> R>,
}

impl<R: Owned> AccessControl<R> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            resource: PhantomData,
        }
    }

    /// Verify that `user` is the recorded owner of the resource with the
    /// given id.
    pub async fn assert_owner(&self, user: i64, id: i64) -> Result<()> {
        let owner = R::owner_of(id, &self.db).await?;
        if owner != user {
            warn!("user {user} is not the owner of {} {id} (owner {owner})", R::KIND);
            return Err(Error::NotOwner {
                kind: R::KIND,
                id,
                user,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{collection::Collection, note::Note};
    use sqlx::{Pool, Sqlite};
    use test_log::test;

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../db/fixtures", scripts("users", "notes", "collections"))
    ))]
    async fn enforce_collection_ownership(pool: Pool<Sqlite>) {
        let db = Database::new(pool);
        let collections = AccessControl::<Collection>::new(db.clone());

        collections
            .assert_owner(1, 1)
            .await
            .expect("owner check should pass for the recorded owner");

        let err = collections
            .assert_owner(2, 1)
            .await
            .expect_err("owner check should fail for another user");
        assert!(matches!(
            err,
            Error::NotOwner {
                kind: ResourceKind::Collection,
                id: 1,
                user: 2,
            }
        ));

        // a missing collection is reported as NotFound, not as an ownership failure
        let err = collections
            .assert_owner(1, 999)
            .await
            .expect_err("owner check should fail for a missing collection");
        assert!(matches!(err, Error::NotFound(ResourceKind::Collection, 999)));
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../db/fixtures", scripts("users", "notes"))
    ))]
    async fn enforce_note_ownership(pool: Pool<Sqlite>) {
        let db = Database::new(pool);
        let notes = AccessControl::<Note>::new(db.clone());

        notes
            .assert_owner(1, 1)
            .await
            .expect("owner check should pass for the recorded owner");

        let err = notes
            .assert_owner(2, 1)
            .await
            .expect_err("owner check should fail for another user");
        assert!(matches!(
            err,
            Error::NotOwner {
                kind: ResourceKind::Note,
                id: 1,
                user: 2,
            }
        ));

        let err = notes
            .assert_owner(1, 42)
            .await
            .expect_err("owner check should fail for a missing note");
        assert!(matches!(err, Error::NotFound(ResourceKind::Note, 42)));
    }
}
