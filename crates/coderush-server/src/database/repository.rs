//! Postgres-backed implementation of the registration store and the vector
//! index. Uniqueness among completed registrations lives in partial unique
//! indexes; a 23505 at commit time is translated back into the typed
//! duplicate error by constraint name.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use tracing::{debug, warn};

use crate::chat::machine::{DuplicateField, RegistrationStore, StoreError};
use crate::chat::state::{RegistrationSession, RegistrationState};
use crate::database::models::{pending_member_json, MemberRow, RegistrationRow};
use crate::database::pool::DbPool;
use crate::services::retrieval::{VectorIndex, VectorMatch};

#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn store_err(e: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23505") {
                let field = match db_err.constraint() {
                    Some("uq_registrations_team_name") => Some(DuplicateField::TeamName),
                    Some("uq_members_index_number") => Some(DuplicateField::IndexNumber),
                    Some("uq_members_email") => Some(DuplicateField::Email),
                    _ => None,
                };
                if let Some(field) = field {
                    return StoreError::Duplicate(field);
                }
            }
        }
        StoreError::Database(anyhow!(e).context("database query failed"))
    }
}

#[async_trait]
impl RegistrationStore for Repository {
    async fn load(&self, session_id: &str) -> Result<Option<RegistrationSession>, StoreError> {
        let row: Option<RegistrationRow> = sqlx::query_as(
            "SELECT session_id, state, team_name, team_batch, current_member, \
                    pending_member, created_at, updated_at \
             FROM registrations WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::store_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let members: Vec<MemberRow> = sqlx::query_as(
            "SELECT position, full_name, index_number, batch, email \
             FROM members WHERE session_id = $1 ORDER BY position",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_err)?;

        Ok(Some(row.into_session(members)?))
    }

    async fn save(&self, session: &RegistrationSession) -> Result<(), StoreError> {
        let pending = pending_member_json(session)?;
        let completed = session.state == RegistrationState::Done;

        let mut tx = self.pool.begin().await.map_err(Self::store_err)?;

        sqlx::query(
            "INSERT INTO registrations \
                 (session_id, state, team_name, team_batch, current_member, pending_member, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (session_id) DO UPDATE SET \
                 state = EXCLUDED.state, \
                 team_name = EXCLUDED.team_name, \
                 team_batch = EXCLUDED.team_batch, \
                 current_member = EXCLUDED.current_member, \
                 pending_member = EXCLUDED.pending_member, \
                 updated_at = now()",
        )
        .bind(&session.session_id)
        .bind(session.state.as_str())
        .bind(&session.team_name)
        .bind(&session.team_batch)
        .bind(session.current_member as i32)
        .bind(&pending)
        .execute(&mut *tx)
        .await
        .map_err(Self::store_err)?;

        sqlx::query("DELETE FROM members WHERE session_id = $1")
            .bind(&session.session_id)
            .execute(&mut *tx)
            .await
            .map_err(Self::store_err)?;

        for (i, member) in session.members.iter().enumerate() {
            sqlx::query(
                "INSERT INTO members \
                     (session_id, position, full_name, index_number, batch, email, completed) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&session.session_id)
            .bind((i + 1) as i32)
            .bind(&member.full_name)
            .bind(&member.index_number)
            .bind(&member.batch)
            .bind(&member.email)
            .bind(completed)
            .execute(&mut *tx)
            .await
            .map_err(Self::store_err)?;
        }

        tx.commit().await.map_err(Self::store_err)?;
        debug!(session_id = %session.session_id, state = session.state.as_str(), "session saved");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM registrations WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn team_name_taken(&self, name: &str, exclude_session: &str) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                 SELECT 1 FROM registrations \
                 WHERE lower(team_name) = lower($1) AND state = 'done' AND session_id <> $2)",
        )
        .bind(name)
        .bind(exclude_session)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(taken)
    }

    async fn index_number_taken(
        &self,
        index_number: &str,
        exclude_session: &str,
    ) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                 SELECT 1 FROM members \
                 WHERE index_number = $1 AND completed AND session_id <> $2)",
        )
        .bind(index_number)
        .bind(exclude_session)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(taken)
    }

    async fn email_taken(&self, email: &str, exclude_session: &str) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                 SELECT 1 FROM members \
                 WHERE lower(email) = lower($1) AND completed AND session_id <> $2)",
        )
        .bind(email)
        .bind(exclude_session)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(taken)
    }

    async fn completed_count(&self) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE state = 'done'")
                .fetch_one(&self.pool)
                .await
                .map_err(Self::store_err)?;
        Ok(count)
    }
}

#[async_trait]
impl VectorIndex for Repository {
    /// The index only counts as available once the embeddings have been
    /// synced; an empty table means the startup sync never ran.
    async fn available(&self) -> bool {
        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM knowledge_embeddings")
            .fetch_one(&self.pool)
            .await
        {
            Ok(count) => count > 0,
            Err(e) => {
                warn!(error = %e, "knowledge_embeddings probe failed");
                false
            }
        }
    }

    async fn upsert(&self, doc_id: &str, vector: Vec<f32>, category: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO knowledge_embeddings (doc_id, category, embedding, updated_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (doc_id) DO UPDATE SET \
                 category = EXCLUDED.category, \
                 embedding = EXCLUDED.embedding, \
                 updated_at = now()",
        )
        .bind(doc_id)
        .bind(category)
        .bind(Vector::from(vector))
        .execute(&self.pool)
        .await
        .context("failed to upsert knowledge embedding")?;
        Ok(())
    }

    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<VectorMatch>> {
        let rows = sqlx::query(
            "SELECT doc_id, (1 - (embedding <=> $1))::float4 AS similarity \
             FROM knowledge_embeddings \
             ORDER BY embedding <=> $1 \
             LIMIT $2",
        )
        .bind(Vector::from(vector))
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .context("vector similarity query failed")?;

        Ok(rows
            .into_iter()
            .map(|row| VectorMatch {
                doc_id: row.get("doc_id"),
                similarity: row.get("similarity"),
            })
            .collect())
    }
}
