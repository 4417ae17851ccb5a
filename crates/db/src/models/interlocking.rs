use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum InterlockingError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Interlocking not found")]
    NotFound,
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: InterlockingState,
        to: InterlockingState,
    },
}

/// Lifecycle of a generated interlocking instance.
///
/// `Generating -> Running -> Stopped`, and `Failed` from either live state.
/// `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum InterlockingState {
    Generating = 0,
    Running = 1,
    Stopped = 2,
    Failed = 3,
}

impl InterlockingState {
    pub fn allowed_predecessors(self) -> &'static [InterlockingState] {
        match self {
            InterlockingState::Generating => &[],
            InterlockingState::Running => &[InterlockingState::Generating],
            InterlockingState::Stopped => &[InterlockingState::Running],
            InterlockingState::Failed => {
                &[InterlockingState::Generating, InterlockingState::Running]
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InterlockingState::Stopped | InterlockingState::Failed)
    }
}

impl std::fmt::Display for InterlockingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterlockingState::Generating => write!(f, "generating"),
            InterlockingState::Running => write!(f, "running"),
            InterlockingState::Stopped => write!(f, "stopped"),
            InterlockingState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Interlocking {
    pub id: i64,
    pub title: String,
    pub port: Option<i64>,
    pub state: InterlockingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateInterlocking {
    pub title: String,
}

impl Interlocking {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateInterlocking,
    ) -> Result<Self, InterlockingError> {
        let record = sqlx::query_as::<_, Interlocking>(
            r#"
            INSERT INTO interlockings (title, state)
            VALUES (?1, ?2)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(InterlockingState::Generating)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Interlocking>(r#"SELECT * FROM interlockings WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_state(
        pool: &SqlitePool,
        state: InterlockingState,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Interlocking>(
            r#"SELECT * FROM interlockings WHERE state = ?1 ORDER BY id ASC"#,
        )
        .bind(state)
        .fetch_all(pool)
        .await
    }

    pub async fn find_running(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Self::find_by_state(pool, InterlockingState::Running).await
    }

    /// Generating -> Running, recording the port the instance listens on
    pub async fn mark_running(
        pool: &SqlitePool,
        id: i64,
        port: u16,
    ) -> Result<Self, InterlockingError> {
        Self::apply_transition(pool, id, InterlockingState::Running, Some(port)).await
    }

    /// Move the record to `to`. Only succeeds if the stored state is one of
    /// `to`'s predecessors at the moment of the write.
    pub async fn transition(
        pool: &SqlitePool,
        id: i64,
        to: InterlockingState,
    ) -> Result<Self, InterlockingError> {
        Self::apply_transition(pool, id, to, None).await
    }

    async fn apply_transition(
        pool: &SqlitePool,
        id: i64,
        to: InterlockingState,
        port: Option<u16>,
    ) -> Result<Self, InterlockingError> {
        let predecessors = to
            .allowed_predecessors()
            .iter()
            .map(|s| (*s as i32).to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let query = format!(
            r#"
            UPDATE interlockings
            SET state = ?2,
                port = COALESCE(?3, port),
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1 AND state IN ({predecessors})
            RETURNING *
            "#
        );

        let updated = sqlx::query_as::<_, Interlocking>(&query)
            .bind(id)
            .bind(to)
            .bind(port.map(i64::from))
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(record) => Ok(record),
            None => {
                let current = Self::find_by_id(pool, id)
                    .await?
                    .ok_or(InterlockingError::NotFound)?;
                Err(InterlockingError::InvalidTransition {
                    from: current.state,
                    to,
                })
            }
        }
    }

    /// Fail every record still marked Generating or Running. Used at startup,
    /// when no process handle from a previous run can still be alive.
    pub async fn fail_orphans(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Interlocking>(
            r#"
            UPDATE interlockings
            SET state = ?1, updated_at = datetime('now', 'subsec')
            WHERE state IN (?2, ?3)
            RETURNING *
            "#,
        )
        .bind(InterlockingState::Failed)
        .bind(InterlockingState::Generating)
        .bind(InterlockingState::Running)
        .fetch_all(pool)
        .await
    }

    pub fn port(&self) -> Option<u16> {
        self.port.and_then(|p| u16::try_from(p).ok())
    }
}
