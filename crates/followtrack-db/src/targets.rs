//! Database operations for the `targets` table.

use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

/// A row from the `targets` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TargetRow {
    pub id: i64,
    pub username: String,
}

/// Returns the target with the given username, creating it if absent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn get_or_create_target(pool: &SqlitePool, username: &str) -> Result<TargetRow, DbError> {
    let mut conn = pool.acquire().await?;
    get_or_create_target_on(&mut conn, username).await
}

pub(crate) async fn get_or_create_target_on(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<TargetRow, DbError> {
    sqlx::query("INSERT INTO targets (username) VALUES (?) ON CONFLICT (username) DO NOTHING")
        .bind(username)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query_as::<_, TargetRow>("SELECT id, username FROM targets WHERE username = ?")
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;

    Ok(row)
}

/// Fetches a target by username.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no target has that username, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_target_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<TargetRow, DbError> {
    sqlx::query_as::<_, TargetRow>("SELECT id, username FROM targets WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns every target ordered by username.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_targets(pool: &SqlitePool) -> Result<Vec<TargetRow>, DbError> {
    let rows =
        sqlx::query_as::<_, TargetRow>("SELECT id, username FROM targets ORDER BY username, id")
            .fetch_all(pool)
            .await?;

    Ok(rows)
}
