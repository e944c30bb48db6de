//! Objects relating to collections. A collection is a group of songified
//! notes that a user has gathered for a specific purpose, e.g. all the songs
//! covering one course before an exam. The collection only holds references
//! to its notes; the notes themselves belong to their own authors.

use crate::{
    Database,
    access::{Owned, ResourceKind},
    error::{Error, Result},
    loadable::{ExternalRef, Loadable},
    note::Note,
    query::{Cmp, CompoundFilter, DynFilterPart, FilterPart, Op, SortOrder, SortSpec, SortSpecs, ToSql},
    user::User,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, sqlite::SqliteQueryResult, types::Json};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    #[sqlx(rename = "collectionid")]
    pub id: i64,
    pub title: String,
    pub description: String,
    /// The user that created the collection. Fixed for the lifetime of the
    /// collection; no update path writes this column.
    #[sqlx(rename = "userid")]
    pub owner: ExternalRef<User>,
    pub upvotes: i64,
    /// The notes in this collection, in display order. The same note may
    /// appear more than once; membership is a list, not a set.
    #[sqlx(json)]
    pub notes: Vec<ExternalRef<Note>>,
    #[sqlx(rename = "datecreated")]
    pub created: OffsetDateTime,
    #[sqlx(rename = "datemodified")]
    pub modified: OffsetDateTime,
}

#[derive(Clone)]
pub enum Filter {
    Id(i64),
    Owner(i64),
    Title(Cmp, String),
    Description(Cmp, String),
}

impl From<Filter> for DynFilterPart {
    fn from(value: Filter) -> Self {
        Arc::new(value)
    }
}

impl FilterPart for Filter {
    fn add_to_query(&self, builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>) {
        match self {
            Self::Id(id) => _ = builder.push(" C.collectionid = ").push_bind(*id),
            Self::Owner(id) => _ = builder.push(" C.userid = ").push_bind(*id),
            Self::Title(cmp, frag) => {
                let s = match cmp {
                    Cmp::Like => format!("%{frag}%"),
                    _ => frag.to_string(),
                };
                builder.push(" C.title ").push(cmp).push_bind(s);
            }
            Self::Description(cmp, frag) => {
                let s = match cmp {
                    Cmp::Like => format!("%{frag}%"),
                    _ => frag.to_string(),
                };
                builder.push(" C.description ").push(cmp).push_bind(s);
            }
        }
    }
}

/// A Type to specify a field that will be used to sort collection queries
#[derive(Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Modified,
    Created,
    Title,
}

impl ToSql for SortField {
    fn to_sql(&self) -> String {
        match self {
            SortField::Modified => "julianday(C.datemodified)",
            SortField::Created => "julianday(C.datecreated)",
            SortField::Title => "C.title",
        }
        .into()
    }
}

/// A single permitted change to a stored collection.
///
/// This is a closed set: fields that must not change after creation (the
/// owner in particular) simply have no variant here, so they cannot be
/// smuggled through an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Title(String),
    Description(String),
    /// Replace the member list wholesale, keeping the given order
    Notes(Vec<ExternalRef<Note>>),
}

impl Update {
    /// Translate one entry of a string-keyed patch, as it arrives from a
    /// boundary layer, into a typed update. Field names outside the permitted
    /// set are rejected here, before anything is written.
    pub fn parse(field: &str, value: &serde_json::Value) -> Result<Self> {
        fn text(field: &str, value: &serde_json::Value) -> Result<String> {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidData(format!("'{field}' must be a string")))
        }
        match field {
            "title" => Ok(Self::Title(text(field, value)?)),
            "description" => Ok(Self::Description(text(field, value)?)),
            "notes" => {
                let ids: Vec<i64> = serde_json::from_value(value.clone()).map_err(|_| {
                    Error::InvalidData("'notes' must be a list of note ids".to_string())
                })?;
                Ok(Self::Notes(ids.into_iter().map(ExternalRef::Stub).collect()))
            }
            other => Err(Error::UpdateFieldNotAllowed(other.to_string())),
        }
    }
}

#[async_trait]
impl Loadable for Collection {
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
        Collection::fetch(id, db).await
    }

    async fn delete_id(id: &Self::Id, db: &Database) -> Result<SqliteQueryResult> {
        sqlx::query("DELETE FROM sn_collections WHERE collectionid=?")
            .bind(id)
            .execute(db.pool())
            .await
            .map_err(|e| e.into())
    }
}

#[async_trait]
impl Owned for Collection {
    const KIND: ResourceKind = ResourceKind::Collection;

    async fn owner_of(id: i64, db: &Database) -> Result<i64> {
        sqlx::query_scalar("SELECT userid FROM sn_collections WHERE collectionid=?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or(Error::NotFound(Self::KIND, id))
    }
}

impl Collection {
    pub fn new(owner: i64, title: String, description: String) -> Self {
        Self {
            id: -1,
            title,
            description,
            owner: ExternalRef::Stub(owner),
            upvotes: 0,
            notes: Vec::new(),
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
            r#"SELECT C.collectionid, C.title, C.description, C.userid, C.upvotes, C.notes,
            C.datecreated, C.datemodified
            FROM sn_collections C"#,
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
            .ok_or(Error::NotFound(ResourceKind::Collection, id))
    }

    pub async fn fetch_optional(id: i64, db: &Database) -> Result<Option<Self>> {
        Ok(Self::build_query(Some(Filter::Id(id).into()), None)
            .build_query_as()
            .fetch_optional(db.pool())
            .await?)
    }

    /// Load all matching collections, most recently modified first
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

    /// Load all collections created by the given user, most recently modified
    /// first
    pub async fn fetch_by_owner(
        owner: i64,
        filter: Option<DynFilterPart>,
        db: &Database,
    ) -> Result<Vec<Self>> {
        let mut fbuilder = CompoundFilter::builder(Op::And).push(Filter::Owner(owner));
        if let Some(f) = filter {
            fbuilder = fbuilder.push(f);
        }
        Self::fetch_all(Some(fbuilder.build()), None, db).await
    }

    /// The notes in the given collection, in display order. Fails with
    /// [Error::NotFound] when the collection does not exist.
    pub async fn fetch_notes(id: i64, db: &Database) -> Result<Vec<ExternalRef<Note>>> {
        Ok(Self::fetch(id, db).await?.notes)
    }

    pub async fn insert(&mut self, db: &Database) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let inserted: Collection = sqlx::query_as(
            r#"INSERT INTO sn_collections
            (title, description, userid, upvotes, notes, datecreated, datemodified)
            VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *"#,
        )
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.owner.id())
        .bind(self.upvotes)
        .bind(Json(&self.notes))
        .bind(now)
        .bind(now)
        .fetch_one(db.pool())
        .await?;
        *self = inserted;
        Ok(())
    }

    /// Apply the given updates to the stored collection. All updates are
    /// applied in a single statement and the modification time is bumped.
    /// Updating an id that doesn't exist is a no-op.
    pub async fn update(id: i64, updates: &[Update], db: &Database) -> Result<()> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE sn_collections SET ");
        let mut fields = builder.separated(", ");
        for update in updates {
            match update {
                Update::Title(title) => {
                    fields.push("title=");
                    fields.push_bind_unseparated(title.clone());
                }
                Update::Description(description) => {
                    fields.push("description=");
                    fields.push_bind_unseparated(description.clone());
                }
                Update::Notes(notes) => {
                    fields.push("notes=");
                    fields.push_bind_unseparated(Json(notes.clone()));
                }
            }
        }
        fields.push("datemodified=");
        fields.push_bind_unseparated(OffsetDateTime::now_utc());
        builder.push(" WHERE collectionid=");
        builder.push_bind(id);
        builder.build().execute(db.pool()).await?;
        Ok(())
    }

    /// Append a note to the collection's member list. The same note can be
    /// added any number of times; no deduplication happens here.
    pub async fn add_note(collection: i64, note: i64, db: &Database) -> Result<()> {
        let mut notes = Self::fetch(collection, db).await?.notes;
        notes.push(ExternalRef::Stub(note));
        Self::store_notes(collection, &notes, db).await
    }

    /// Remove every occurrence of the given note from the collection's member
    /// list. Does nothing when the collection does not exist or the note was
    /// never a member.
    pub async fn remove_note(collection: i64, note: i64, db: &Database) -> Result<()> {
        let Some(existing) = Self::fetch_optional(collection, db).await? else {
            return Ok(());
        };
        let mut notes = existing.notes;
        notes.retain(|n| n.id() != note);
        Self::store_notes(collection, &notes, db).await
    }

    async fn store_notes(id: i64, notes: &Vec<ExternalRef<Note>>, db: &Database) -> Result<()> {
        sqlx::query("UPDATE sn_collections SET notes=?, datemodified=? WHERE collectionid=?")
            .bind(Json(notes))
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(db.pool())
            .await?;
        Ok(())
    }

    /// Add one upvote to the collection and return the new count
    pub async fn upvote(id: i64, db: &Database) -> Result<i64> {
        sqlx::query_scalar(
            r#"UPDATE sn_collections SET upvotes = upvotes + 1, datemodified=?
            WHERE collectionid=? RETURNING upvotes"#,
        )
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or(Error::NotFound(ResourceKind::Collection, id))
    }
}
