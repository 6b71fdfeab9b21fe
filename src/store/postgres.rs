//! Production Store backed by Postgres + pgvector.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector as PgVector;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{ConsiliumError, Result};
use crate::store::{ChatIngestOutcome, Store};
use crate::types::*;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        super::migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_meeting(row: &sqlx::postgres::PgRow) -> Result<Meeting> {
        let meeting_type: Option<String> = row.try_get("meeting_type")?;
        Ok(Meeting {
            id: row.try_get("id")?,
            provider_id: row.try_get("provider_id")?,
            title: row.try_get("title")?,
            date: row.try_get("date")?,
            transcript: row.try_get("transcript")?,
            client_id: row.try_get("client_id")?,
            meeting_type: meeting_type.and_then(|s| s.parse().ok()),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_client(row: &sqlx::postgres::PgRow) -> Result<Client> {
        Ok(Client {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            telegram_chat_id: row.try_get("telegram_chat_id")?,
            external_ids: row.try_get("external_ids")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_chat_room(row: &sqlx::postgres::PgRow) -> Result<ChatRoom> {
        Ok(ChatRoom {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            client_id: row.try_get("client_id")?,
            client_name: row.try_get("client_name")?,
            last_synced_message_id: row.try_get("last_synced_message_id")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Builds the `WHERE` clause and bind list shared by both the
    /// meeting and chat diversified-search queries. Every dynamic
    /// value is a bound parameter — never interpolated into the SQL
    /// text (§9, Open question — suspected bug: the query vector must
    /// be bound, not formatted in).
    fn meeting_filter_sql(params: &DiversifiedSearchParams) -> (String, usize) {
        let mut clauses = Vec::new();
        let mut idx = 1; // $1 is the query vector
        if params.client_id.is_some() {
            idx += 1;
            clauses.push(format!("m.client_id = ${idx}"));
        }
        if params.title_filter.is_some() {
            idx += 1;
            clauses.push(format!("LOWER(m.title) LIKE ${idx}"));
        }
        if params.date_range.is_some() {
            idx += 1;
            clauses.push(format!("m.date >= ${idx}"));
            idx += 1;
            clauses.push(format!("m.date <= ${idx}"));
        }
        if clauses.is_empty() {
            (String::new(), idx)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), idx)
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn create_client(&self, name: &str, telegram_chat_id: Option<i64>) -> Result<Client> {
        let row = sqlx::query(
            "INSERT INTO clients (name, telegram_chat_id) VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING *",
        )
        .bind(name)
        .bind(telegram_chat_id)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_client(&row)
    }

    async fn get_meeting(&self, id: MeetingId) -> Result<Option<Meeting>> {
        let row = sqlx::query("SELECT * FROM meetings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_meeting).transpose()
    }

    async fn get_meeting_by_provider_id(&self, provider_id: &str) -> Result<Option<Meeting>> {
        let row = sqlx::query("SELECT * FROM meetings WHERE provider_id = $1")
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_meeting).transpose()
    }

    async fn create_meeting(
        &self,
        provider_id: Option<String>,
        title: String,
        date: Option<DateTime<Utc>>,
        transcript: Option<String>,
        client_id: Option<ClientId>,
        meeting_type: Option<MeetingType>,
    ) -> Result<Meeting> {
        let row = sqlx::query(
            "INSERT INTO meetings (provider_id, title, date, transcript, client_id, meeting_type)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(provider_id)
        .bind(title)
        .bind(date)
        .bind(transcript)
        .bind(client_id)
        .bind(meeting_type.map(|t| t.to_string()))
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_meeting(&row)
    }

    async fn list_distinct_meeting_titles(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar("SELECT DISTINCT title FROM meetings WHERE title IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_summary(
        &self,
        meeting_id: MeetingId,
        meeting_type: MeetingType,
        content_text: String,
        content_json: Option<serde_json::Value>,
    ) -> Result<Summary> {
        let row = sqlx::query(
            "INSERT INTO summaries (meeting_id, meeting_type, content_text, content_json)
             VALUES ($1, $2, $3, $4)
             RETURNING id, meeting_id, meeting_type, content_text, content_json, created_at",
        )
        .bind(meeting_id)
        .bind(meeting_type.to_string())
        .bind(content_text)
        .bind(content_json)
        .fetch_one(&self.pool)
        .await?;

        let meeting_type_str: String = row.try_get("meeting_type")?;
        Ok(Summary {
            id: row.try_get("id")?,
            meeting_id: row.try_get("meeting_id")?,
            meeting_type: meeting_type_str
                .parse()
                .map_err(ConsiliumError::DataContract)?,
            content_text: row.try_get("content_text")?,
            content_json: row.try_get("content_json")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn meeting_embedding_count(&self, meeting_id: MeetingId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meeting_embeddings WHERE meeting_id = $1")
            .bind(meeting_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn replace_meeting_embeddings(
        &self,
        meeting_id: MeetingId,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM meeting_embeddings WHERE meeting_id = $1")
            .bind(meeting_id)
            .execute(&mut *tx)
            .await?;

        for (index, (chunk_text, vector)) in chunks.iter().enumerate() {
            if vector.len() != VECTOR_DIM {
                return Err(ConsiliumError::DataContract(format!(
                    "embedding dimension {} != {VECTOR_DIM}",
                    vector.len()
                )));
            }
            sqlx::query(
                "INSERT INTO meeting_embeddings (meeting_id, chunk_text, chunk_index, embedding)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(meeting_id)
            .bind(chunk_text)
            .bind(index as i32)
            .bind(PgVector::from(vector.clone()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    async fn delete_meeting_embeddings(&self, meeting_id: MeetingId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM meeting_embeddings WHERE meeting_id = $1")
            .bind(meeting_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_meeting_chunks(&self, meeting_id: MeetingId, limit: i64) -> Result<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT chunk_text FROM meeting_embeddings WHERE meeting_id = $1
             ORDER BY chunk_index ASC LIMIT $2",
        )
        .bind(meeting_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_chat_room(&self, chat_id: ChatId) -> Result<Option<ChatRoom>> {
        let row = sqlx::query("SELECT * FROM chat_rooms WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_chat_room).transpose()
    }

    async fn list_active_chat_rooms(&self) -> Result<Vec<ChatRoom>> {
        let rows = sqlx::query("SELECT * FROM chat_rooms WHERE is_active = true")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_chat_room).collect()
    }

    async fn upsert_chat_room(
        &self,
        chat_id: ChatId,
        title: String,
        client_name: Option<String>,
    ) -> Result<ChatRoom> {
        let row = sqlx::query(
            "INSERT INTO chat_rooms (id, title, client_name) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, client_name = COALESCE(EXCLUDED.client_name, chat_rooms.client_name)
             RETURNING *",
        )
        .bind(chat_id)
        .bind(title)
        .bind(client_name)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_chat_room(&row)
    }

    async fn list_distinct_chat_client_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar(
            "SELECT DISTINCT client_name FROM chat_rooms WHERE client_name IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn chat_message_exists(&self, chat_id: ChatId, external_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chat_messages WHERE chat_id = $1 AND external_id = $2)",
        )
        .bind(chat_id)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn save_and_index_chat_message(
        &self,
        chat_id: ChatId,
        external_id: i64,
        event_time: DateTime<Utc>,
        sender_name: Option<String>,
        text: String,
        embedding: Vec<f32>,
    ) -> Result<ChatIngestOutcome> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chat_messages WHERE chat_id = $1 AND external_id = $2)",
        )
        .bind(chat_id)
        .bind(external_id)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            tx.rollback().await?;
            return Ok(ChatIngestOutcome::Skipped);
        }

        let message_id: Uuid = sqlx::query_scalar(
            "INSERT INTO chat_messages (chat_id, external_id, event_time, sender_name, text, has_media)
             VALUES ($1, $2, $3, $4, $5, false)
             RETURNING id",
        )
        .bind(chat_id)
        .bind(external_id)
        .bind(event_time)
        .bind(sender_name)
        .bind(&text)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO chat_embeddings (message_id, chunk_text, chunk_index, embedding)
             VALUES ($1, $2, 0, $3)",
        )
        .bind(message_id)
        .bind(&text)
        .bind(PgVector::from(embedding))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE chat_rooms SET last_synced_message_id = GREATEST(COALESCE(last_synced_message_id, 0), $2)
             WHERE id = $1",
        )
        .bind(chat_id)
        .bind(external_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ChatIngestOutcome::Inserted(message_id))
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str, description: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, description, updated_at) VALUES ($1, $2, $3, now())
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value,
                description = COALESCE(EXCLUDED.description, settings.description), updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_meetings_diversified(
        &self,
        query_vector: &[f32],
        params: &DiversifiedSearchParams,
    ) -> Result<Vec<MeetingSearchResult>> {
        let (where_clause, last_idx) = Self::meeting_filter_sql(params);
        let sql = format!(
            "WITH ranked_chunks AS (
                SELECT
                    e.chunk_text,
                    e.meeting_id,
                    m.title AS meeting_title,
                    m.date AS meeting_date,
                    1 - (e.embedding <=> $1) AS similarity,
                    ROW_NUMBER() OVER (PARTITION BY e.meeting_id ORDER BY e.embedding <=> $1) AS chunk_rank
                FROM meeting_embeddings e
                JOIN meetings m ON e.meeting_id = m.id
                {where_clause}
            )
            SELECT chunk_text, meeting_id, meeting_title, meeting_date, similarity
            FROM ranked_chunks
            WHERE chunk_rank <= ${a} AND similarity > ${b}
            ORDER BY similarity DESC
            LIMIT ${c}",
            a = last_idx + 1,
            b = last_idx + 2,
            c = last_idx + 3,
        );

        let mut q = sqlx::query(&sql).bind(PgVector::from(query_vector.to_vec()));
        if let Some(client_id) = params.client_id {
            q = q.bind(client_id);
        }
        if let Some(TitleFilter(ref t)) = params.title_filter {
            q = q.bind(format!("%{}%", t.to_lowercase()));
        }
        if let Some(ref range) = params.date_range {
            q = q.bind(range.start).bind(range.end);
        }
        let rows = q
            .bind(params.max_per_group as i64)
            .bind(params.min_similarity)
            .bind(params.max_total as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(MeetingSearchResult {
                    chunk_text: row.try_get("chunk_text")?,
                    meeting_id: row.try_get("meeting_id")?,
                    meeting_title: row.try_get("meeting_title")?,
                    meeting_date: row.try_get("meeting_date")?,
                    similarity: row.try_get::<f64, _>("similarity")? as f32,
                })
            })
            .collect()
    }

    async fn search_chats_diversified(
        &self,
        query_vector: &[f32],
        params: &DiversifiedSearchParams,
    ) -> Result<Vec<ChatSearchResult>> {
        let mut clauses = Vec::new();
        let mut idx = 1;
        if params.client_name_filter.is_some() {
            idx += 1;
            clauses.push(format!("tc.client_name = ${idx}"));
        }
        if params.date_range.is_some() {
            idx += 1;
            clauses.push(format!("tm.event_time >= ${idx}"));
            idx += 1;
            clauses.push(format!("tm.event_time <= ${idx}"));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "WITH ranked_chunks AS (
                SELECT
                    te.chunk_text,
                    te.message_id,
                    tm.chat_id,
                    tc.title AS chat_title,
                    tc.client_name,
                    tm.event_time AS message_date,
                    tm.sender_name,
                    1 - (te.embedding <=> $1) AS similarity,
                    ROW_NUMBER() OVER (PARTITION BY tm.chat_id ORDER BY te.embedding <=> $1) AS chunk_rank
                FROM chat_embeddings te
                JOIN chat_messages tm ON te.message_id = tm.id
                JOIN chat_rooms tc ON tm.chat_id = tc.id
                {where_clause}
            )
            SELECT chunk_text, message_id, chat_id, chat_title, client_name, message_date, sender_name, similarity
            FROM ranked_chunks
            WHERE chunk_rank <= ${a} AND similarity > ${b}
            ORDER BY similarity DESC
            LIMIT ${c}",
            a = idx + 1,
            b = idx + 2,
            c = idx + 3,
        );

        let mut q = sqlx::query(&sql).bind(PgVector::from(query_vector.to_vec()));
        if let Some(ClientNameFilter(ref name)) = params.client_name_filter {
            q = q.bind(name);
        }
        if let Some(ref range) = params.date_range {
            q = q.bind(range.start).bind(range.end);
        }
        let rows = q
            .bind(params.max_per_group as i64)
            .bind(params.min_similarity)
            .bind(params.max_total as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ChatSearchResult {
                    chunk_text: row.try_get("chunk_text")?,
                    message_id: row.try_get("message_id")?,
                    chat_id: row.try_get("chat_id")?,
                    chat_title: row.try_get("chat_title")?,
                    client_name: row.try_get("client_name")?,
                    message_date: row.try_get("message_date")?,
                    sender_name: row.try_get("sender_name")?,
                    similarity: row.try_get::<f64, _>("similarity")? as f32,
                })
            })
            .collect()
    }

    async fn rag_stats(&self) -> Result<(i64, i64)> {
        let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meeting_embeddings")
            .fetch_one(&self.pool)
            .await?;
        let indexed_meetings: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT meeting_id) FROM meeting_embeddings")
                .fetch_one(&self.pool)
                .await?;
        Ok((total_chunks, indexed_meetings))
    }
}
