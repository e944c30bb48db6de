//! Objects relating to songified notes. A songified note is a study note that
//! has been turned into song lyrics so that it is easier to memorize. Notes
//! are owned by a single user and can be referenced from any number of
//! collections.

use crate::{
    Database,
    access::{Owned, ResourceKind},
    error::{Error, Result},
    loadable::{ExternalRef, Loadable},
    query::{Cmp, DynFilterPart, FilterPart, SortOrder, SortSpec, SortSpecs, ToSql},
    user::User,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, sqlite::SqliteQueryResult};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    #[sqlx(rename = "noteid")]
    pub id: i64,
    #[sqlx(rename = "userid")]
    pub owner: ExternalRef<User>,
    /// The original note text
    pub content: String,
    /// The songified rendition of the note
    pub lyrics: String,
    #[sqlx(rename = "datecreated")]
    pub created: OffsetDateTime,
    #[sqlx(rename = "datemodified")]
    pub modified: OffsetDateTime,
}

#[derive(Clone)]
pub enum Filter {
    Id(i64),
    Owner(i64),
    Content(Cmp, String),
}

impl From<Filter> for DynFilterPart {
    fn from(value: Filter) -> Self {
        Arc::new(value)
    }
}

impl FilterPart for Filter {
    fn add_to_query(&self, builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>) {
        match self {
            Self::Id(id) => _ = builder.push(" N.noteid = ").push_bind(*id),
            Self::Owner(id) => _ = builder.push(" N.userid = ").push_bind(*id),
            Self::Content(cmp, frag) => {
                let s = match cmp {
                    Cmp::Like => format!("%{frag}%"),
                    _ => frag.to_string(),
                };
                builder.push(" N.content ").push(cmp).push_bind(s);
            }
        }
    }
}

/// A Type to specify a field that will be used to sort note queries
#[derive(Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Modified,
    Created,
}

impl ToSql for SortField {
    fn to_sql(&self) -> String {
        match self {
            SortField::Modified => "julianday(N.datemodified)",
            SortField::Created => "julianday(N.datecreated)",
        }
        .into()
    }
}

#[async_trait]
impl Loadable for Note {
    type Id = i64;

    fn invalid_id() -> Self::Id {
        -1
    }

    fn id(&self) -> Self::Id {
        self.id
    }

    fn set_id(&mut self, id: Self::Id) {
        self.id = id
    }

    async fn load(id: Self::Id, db: &Database) -> Result<Self> {
        Note::fetch(id, db).await
    }

    async fn delete_id(id: &Self::Id, db: &Database) -> Result<SqliteQueryResult> {
        sqlx::query("DELETE FROM sn_notes WHERE noteid=?")
            .bind(id)
            .execute(db.pool())
            .await
            .map_err(|e| e.into())
    }
}

#[async_trait]
impl Owned for Note {
    const KIND: ResourceKind = ResourceKind::Note;

    async fn owner_of(id: i64, db: &Database) -> Result<i64> {
        sqlx::query_scalar("SELECT userid FROM sn_notes WHERE noteid=?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or(Error::NotFound(Self::KIND, id))
    }
}

impl Note {
    pub fn new(owner: i64, content: String, lyrics: String) -> Self {
        Self {
            id: -1,
            owner: ExternalRef::Stub(owner),
            content,
            lyrics,
            created: OffsetDateTime::UNIX_EPOCH,
            modified: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn build_query(
        filter: Option<DynFilterPart>,
        sort: Option<SortSpecs<SortField>>,
    ) -> QueryBuilder<'static, Sqlite> {
        let sort = sort.unwrap_or(SortSpec::new(SortField::Modified, SortOrder::Descending).into());
        let mut builder = QueryBuilder::new(
            r#"SELECT N.noteid, N.userid, N.content, N.lyrics, N.datecreated, N.datemodified
            FROM sn_notes N"#,
        );
        if let Some(f) = filter {
            builder.push(" WHERE ");
            f.add_to_query(&mut builder);
        }
        builder.push(" ORDER BY ");
        builder.push(sort.to_sql());
        tracing::debug!("GENERATED SQL: {}", builder.sql());
        builder
    }

    pub async fn fetch(id: i64, db: &Database) -> Result<Self> {
        Self::fetch_optional(id, db)
            .await?
            .ok_or(Error::NotFound(ResourceKind::Note, id))
    }

    pub async fn fetch_optional(id: i64, db: &Database) -> Result<Option<Self>> {
        Ok(Self::build_query(Some(Filter::Id(id).into()), None)
            .build_query_as()
            .fetch_optional(db.pool())
            .await?)
    }

    /// Load all matching notes, most recently modified first
    pub async fn fetch_all(
        filter: Option<DynFilterPart>,
        sort: Option<SortSpecs<SortField>>,
        db: &Database,
    ) -> Result<Vec<Self>> {
        Ok(Self::build_query(filter, sort)
            .build_query_as()
            .fetch_all(db.pool())
            .await?)
    }

    pub async fn fetch_by_owner(owner: i64, db: &Database) -> Result<Vec<Self>> {
        Self::fetch_all(Some(Filter::Owner(owner).into()), None, db).await
    }

    pub async fn insert(&mut self, db: &Database) -> Result<()> {
        if self.content.is_empty() {
            return Err(Error::InvalidData("No content specified".to_string()));
        }
        let now = OffsetDateTime::now_utc();
        let inserted: Note = sqlx::query_as(
            r#"INSERT INTO sn_notes (userid, content, lyrics, datecreated, datemodified)
            VALUES (?, ?, ?, ?, ?) RETURNING *"#,
        )
        .bind(self.owner.id())
        .bind(&self.content)
        .bind(&self.lyrics)
        .bind(now)
        .bind(now)
        .fetch_one(db.pool())
        .await?;
        *self = inserted;
        Ok(())
    }

    /// Persist the current content and lyrics. The owner is never written
    /// back; ownership is fixed at creation.
    pub async fn update(&self, db: &Database) -> Result<Note> {
        if self.id < 0 {
            return Err(Error::InvalidUpdateObjectNotFound);
        }
        sqlx::query_as(
            r#"UPDATE sn_notes SET content=?, lyrics=?, datemodified=?
            WHERE noteid=? RETURNING *"#,
        )
        .bind(&self.content)
        .bind(&self.lyrics)
        .bind(OffsetDateTime::now_utc())
        .bind(self.id)
        .fetch_one(db.pool())
        .await
        .map_err(|e| e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Pool;
    use test_log::test;

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../db/fixtures", scripts("users"))
    ))]
    async fn insert_and_update_notes(pool: Pool<Sqlite>) {
        let db = Database::new(pool);
        let mut note = Note::new(
            1,
            "the mitochondria is the powerhouse of the cell".to_string(),
            "oh the mito, mito, mitochondria".to_string(),
        );
        note.insert(&db).await.expect("failed to insert note");
        assert!(note.id > 0);
        assert_eq!(note.owner.id(), 1);

        let loaded = Note::load(note.id, &db).await.expect("failed to load note");
        assert_eq!(note, loaded);

        note.lyrics = "power, power, powerhouse".to_string();
        let updated = note.update(&db).await.expect("failed to update note");
        assert_eq!(updated.lyrics, note.lyrics);
        assert!(updated.modified > loaded.modified);

        let unsaved = Note::new(1, "x".to_string(), "y".to_string());
        assert!(matches!(
            unsaved.update(&db).await,
            Err(Error::InvalidUpdateObjectNotFound)
        ));

        let mut empty = Note::new(1, String::new(), String::new());
        assert!(matches!(
            empty.insert(&db).await,
            Err(Error::InvalidData(_))
        ));
    }

    #[test(sqlx::test(
        migrations = "../db/migrations/",
        fixtures(path = "../../db/fixtures", scripts("users", "notes"))
    ))]
    async fn query_notes(pool: Pool<Sqlite>) {
        let db = Database::new(pool);

        // most recently modified first
        let notes = Note::fetch_by_owner(1, &db).await.expect("failed to query notes");
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, 2);
        assert_eq!(notes[1].id, 1);
        assert!(notes[0].modified > notes[1].modified);

        let matched = Note::fetch_all(
            Some(Filter::Content(Cmp::Like, "quadratic".to_string()).into()),
            None,
            &db,
        )
        .await
        .expect("failed to query notes by content");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);

        assert!(matches!(
            Note::fetch(42, &db).await,
            Err(Error::NotFound(ResourceKind::Note, 42))
        ));

        // a note ref can load its owner on demand
        let mut note = Note::fetch(3, &db).await.expect("failed to load note");
        note.owner.load(&db).await.expect("failed to load note owner");
        let owner = note.owner.object().expect("owner should be loaded");
        assert_eq!(owner.username, "benny");
    }
}
