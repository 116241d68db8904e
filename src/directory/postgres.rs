use super::{DirectoryError, NewUser, User, UserDirectory};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::Query,
    Connection, PgPool, Postgres, Row,
};
use tracing::{info_span, Instrument};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    username VARCHAR(50) NOT NULL,
    login_id VARCHAR(50) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const USER_COLUMNS: &str = "id, username, login_id, password_hash, created_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().is_some_and(|code| code.as_ref() == "23505")
        }
        _ => false,
    }
}

fn insert_error(err: sqlx::Error) -> DirectoryError {
    if is_unique_violation(&err) {
        DirectoryError::DuplicateLogin
    } else {
        DirectoryError::Database(err)
    }
}

fn require_updated(rows_affected: u64) -> Result<(), DirectoryError> {
    if rows_affected == 0 {
        return Err(DirectoryError::NotFound);
    }

    Ok(())
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        login_id: row.try_get("login_id")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `users` table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "CREATE",
            db.statement = SCHEMA
        );
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }

    async fn fetch_user(
        &self,
        query: Query<'_, Postgres, PgArguments>,
        statement: &str,
    ) -> Result<Option<User>, DirectoryError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = statement
        );
        let row = query.fetch_optional(&self.pool).instrument(span).await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DirectoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_user(sqlx::query(&query).bind(id), &query).await
    }

    async fn find_by_login(&self, login_id: &str) -> Result<Option<User>, DirectoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE login_id = $1");
        self.fetch_user(sqlx::query(&query).bind(login_id), &query).await
    }

    async fn exists_by_login(&self, login_id: &str) -> Result<bool, DirectoryError> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE login_id = $1) AS exists";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(login_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.try_get("exists")?)
    }

    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError> {
        let query = format!(
            "INSERT INTO users (username, login_id, password_hash) \
             VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(&user.username)
            .bind(&user.login_id)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(insert_error)?;

        Ok(user_from_row(&row)?)
    }

    async fn save(&self, user: &User) -> Result<(), DirectoryError> {
        let query = "UPDATE users SET username = $1, password_hash = $2 WHERE id = $3";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        require_updated(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;

        Ok(())
    }
}
