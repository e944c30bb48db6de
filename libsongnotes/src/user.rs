//! Objects related to user accounts. Users own notes and collections; the
//! rest of the library refers to them by id.

use crate::{
    Database,
    access::ResourceKind,
    error::{Error, Result},
    loadable::Loadable,
};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteQueryResult;
use time::OffsetDateTime;

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[sqlx(rename = "userid")]
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub pwhash: String,
    #[sqlx(rename = "datecreated")]
    pub created: OffsetDateTime,
}

#[async_trait]
impl Loadable for User {
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
        User::fetch(id, db).await
    }

    async fn delete_id(id: &Self::Id, db: &Database) -> Result<SqliteQueryResult> {
        sqlx::query("DELETE FROM sn_users WHERE userid=?")
            .bind(id)
            .execute(db.pool())
            .await
            .map_err(|e| e.into())
    }
}

impl User {
    pub fn new(username: String, pwhash: String) -> Self {
        Self {
            id: -1,
            username,
            pwhash,
            created: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Usernames must be at least three characters, start with a letter, and
    /// contain only letters, digits, '-' or '_'.
    pub fn validate_username(username: &str) -> Result<()> {
        if username.len() < 3 {
            return Err(Error::AuthInvalidUsernameTooShort);
        }
        let mut chars = username.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Err(Error::AuthInvalidUsernameFirstCharacter);
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::AuthInvalidUsernameInvalidCharacters(
                username.to_string(),
            ));
        }
        Ok(())
    }

    pub async fn fetch(id: i64, db: &Database) -> Result<User> {
        sqlx::query_as("SELECT userid, username, pwhash, datecreated FROM sn_users WHERE userid=?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or(Error::NotFound(ResourceKind::User, id))
    }

    pub async fn fetch_by_username(username: &str, db: &Database) -> Result<Option<User>> {
        Ok(sqlx::query_as(
            "SELECT userid, username, pwhash, datecreated FROM sn_users WHERE username=?",
        )
        .bind(username)
        .fetch_optional(db.pool())
        .await?)
    }

    pub async fn fetch_all(db: &Database) -> Result<Vec<User>> {
        Ok(sqlx::query_as(
            "SELECT userid, username, pwhash, datecreated FROM sn_users ORDER BY username ASC",
        )
        .fetch_all(db.pool())
        .await?)
    }

    pub async fn insert(&mut self, db: &Database) -> Result<()> {
        Self::validate_username(&self.username)?;
        let inserted: User = sqlx::query_as(
            "INSERT INTO sn_users (username, pwhash, datecreated) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(&self.username)
        .bind(&self.pwhash)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db.pool())
        .await?;
        *self = inserted;
        Ok(())
    }

    pub fn hash_password(pw: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hasher = Argon2::default();
        Ok(hasher.hash_password(pw.as_bytes(), &salt)?.to_string())
    }

    pub fn verify_password(&self, pw: &str) -> Result<()> {
        let hasher = Argon2::default();
        let expected_hash = PasswordHash::new(&self.pwhash)?;
        hasher
            .verify_password(pw.as_bytes(), &expected_hash)
            .map_err(|e| match e {
                password_hash::Error::Password => Error::AuthPasswordMismatch,
                other => Error::AuthHashFailure(other),
            })
    }

    pub fn change_password(&mut self, pw: &str) -> Result<()> {
        self.pwhash = Self::hash_password(pw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Pool, Sqlite};
    use test_log::test;

    #[test]
    fn username_rules() {
        User::validate_username("wanda").expect("plain username should validate");
        User::validate_username("wanda-s_2nd").expect("separators should be allowed");
        assert!(matches!(
            User::validate_username("wa"),
            Err(Error::AuthInvalidUsernameTooShort)
        ));
        assert!(matches!(
            User::validate_username("2wanda"),
            Err(Error::AuthInvalidUsernameFirstCharacter)
        ));
        assert!(matches!(
            User::validate_username("wanda!"),
            Err(Error::AuthInvalidUsernameInvalidCharacters(_))
        ));
    }

    #[test]
    fn password_roundtrip() {
        let pwhash = User::hash_password("correct horse").expect("failed to hash password");
        let mut user = User::new("wanda".to_string(), pwhash);
        user.verify_password("correct horse")
            .expect("correct password should verify");
        assert!(matches!(
            user.verify_password("wrong horse"),
            Err(Error::AuthPasswordMismatch)
        ));

        user.change_password("new phrase").expect("failed to change password");
        user.verify_password("new phrase")
            .expect("new password should verify");
        assert!(matches!(
            user.verify_password("correct horse"),
            Err(Error::AuthPasswordMismatch)
        ));
    }

    #[test(sqlx::test(migrations = "../db/migrations/"))]
    async fn insert_and_fetch_users(pool: Pool<Sqlite>) {
        let db = Database::new(pool);
        let pwhash = User::hash_password("s3kr1t").expect("failed to hash password");
        let mut user = User::new("wanda".to_string(), pwhash);
        user.insert(&db).await.expect("failed to insert user");
        assert!(user.id > 0);

        let loaded = User::load(user.id, &db).await.expect("failed to load user");
        assert_eq!(user, loaded);

        let byname = User::fetch_by_username("wanda", &db)
            .await
            .expect("failed to query by username")
            .expect("inserted user should be found by name");
        assert_eq!(byname, user);
        assert!(
            User::fetch_by_username("nobody", &db)
                .await
                .expect("failed to query by username")
                .is_none()
        );

        let mut invalid = User::new("!".to_string(), "x".to_string());
        assert!(invalid.insert(&db).await.is_err());
    }
}
