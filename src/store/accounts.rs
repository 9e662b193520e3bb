//! Users and API tokens

use crate::auth::{self, AuthError};
use crate::conversation::{timestamp, User};

use super::{Store, StoreError};

type UserRow = (i64, String, String, bool);

fn user_from_row((id, username, email, is_staff): UserRow) -> User {
    User {
        id,
        username,
        email,
        is_staff,
    }
}

impl Store {
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        is_staff: bool,
    ) -> Result<User, StoreError> {
        let password_hash = auth::hash_password(password)?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, is_staff, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(is_staff)
        .bind(timestamp::encode(timestamp::now()))
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            is_staff,
        })
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, username, email, is_staff FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(user_from_row))
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, username, email, is_staff FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(user_from_row))
    }

    /// Check a username/password pair. `None` when either is wrong.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<(i64, String, String, bool, String)> = sqlx::query_as(
            r#"
            SELECT id, username, email, is_staff, password_hash
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, username, email, is_staff, password_hash)) = row else {
            return Ok(None);
        };

        match auth::verify_password(&password_hash, password) {
            Ok(()) => Ok(Some(user_from_row((id, username, email, is_staff)))),
            Err(AuthError::InvalidCredentials) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the user's token, creating one on first use.
    ///
    /// Concurrent callers for the same user all get the same key.
    pub async fn get_or_create_token(&self, user_id: i64) -> Result<String, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (key, user_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(auth::new_token())
        .bind(user_id)
        .bind(timestamp::encode(timestamp::now()))
        .execute(&self.pool)
        .await?;

        let (key,): (String,) = sqlx::query_as("SELECT key FROM tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(key)
    }

    pub async fn user_for_token(&self, key: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT users.id, users.username, users.email, users.is_staff
            FROM tokens
            JOIN users ON users.id = tokens.user_id
            WHERE tokens.key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }
}
