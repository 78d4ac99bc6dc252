use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::quiz::{PairKey, QuizBatch, QuizResponse};

fn db_error(action: &str, e: sqlx::Error) -> AppError {
    AppError::InternalServerError(anyhow!("Failed to {}: {}", action, e))
}

pub async fn get_active_batch(
    conn: &mut PgConnection,
    pair: PairKey,
    now: DateTime<Utc>,
) -> AppResult<Option<QuizBatch>> {
    sqlx::query_as::<_, QuizBatch>(
        "SELECT * FROM quiz_batches WHERE user1_id = $1 AND user2_id = $2 AND completed = FALSE AND expires_at > $3",
    )
    .bind(pair.user1_id)
    .bind(pair.user2_id)
    .bind(now)
    .fetch_optional(conn)
    .await
    .map_err(|e| db_error("fetch quiz batch", e))
}

pub async fn get_open_batch(conn: &mut PgConnection, pair: PairKey) -> AppResult<Option<QuizBatch>> {
    sqlx::query_as::<_, QuizBatch>(
        "SELECT * FROM quiz_batches WHERE user1_id = $1 AND user2_id = $2 AND completed = FALSE",
    )
    .bind(pair.user1_id)
    .bind(pair.user2_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| db_error("fetch quiz batch", e))
}

pub async fn get_batch(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<Option<QuizBatch>> {
    sqlx::query_as::<_, QuizBatch>("SELECT * FROM quiz_batches WHERE id = $1")
        .bind(batch_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_error("fetch quiz batch", e))
}

pub async fn get_latest_batch_with_question(
    conn: &mut PgConnection,
    pair: PairKey,
    question_id: i32,
) -> AppResult<Option<QuizBatch>> {
    sqlx::query_as::<_, QuizBatch>(
        r#"
        SELECT * FROM quiz_batches
        WHERE user1_id = $1 AND user2_id = $2
          AND questions @> jsonb_build_array(jsonb_build_object('id', $3::int))
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(pair.user1_id)
    .bind(pair.user2_id)
    .bind(question_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| db_error("fetch quiz batch", e))
}

pub async fn insert_batch(conn: &mut PgConnection, batch: &QuizBatch) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO quiz_batches (id, user1_id, user2_id, questions, current_index, completed, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user1_id, user2_id) WHERE NOT completed DO NOTHING
        "#,
    )
    .bind(batch.id)
    .bind(batch.user1_id)
    .bind(batch.user2_id)
    .bind(Json(&batch.questions))
    .bind(batch.current_index)
    .bind(batch.completed)
    .bind(batch.created_at)
    .bind(batch.expires_at)
    .execute(conn)
    .await
    .map_err(|e| db_error("create quiz batch", e))?;

    Ok(result.rows_affected() == 1)
}

pub async fn advance_batch(
    conn: &mut PgConnection,
    batch_id: Uuid,
    expected_index: i32,
) -> AppResult<Option<QuizBatch>> {
    // SET expressions see the pre-update row
    sqlx::query_as::<_, QuizBatch>(
        r#"
        UPDATE quiz_batches
        SET current_index = current_index + 1,
            completed = (current_index + 1 >= jsonb_array_length(questions))
        WHERE id = $1 AND current_index = $2 AND completed = FALSE
        RETURNING *
        "#,
    )
    .bind(batch_id)
    .bind(expected_index)
    .fetch_optional(conn)
    .await
    .map_err(|e| db_error("advance quiz batch", e))
}

/// Row-locks the batch for the rest of the transaction.
pub async fn lock_batch(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<Option<QuizBatch>> {
    sqlx::query_as::<_, QuizBatch>("SELECT * FROM quiz_batches WHERE id = $1 FOR UPDATE")
        .bind(batch_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_error("lock quiz batch", e))
}

pub async fn set_batch_cursor(
    conn: &mut PgConnection,
    batch_id: Uuid,
    current_index: i32,
    completed: bool,
) -> AppResult<QuizBatch> {
    sqlx::query_as::<_, QuizBatch>(
        "UPDATE quiz_batches SET current_index = $2, completed = $3 WHERE id = $1 RETURNING *",
    )
    .bind(batch_id)
    .bind(current_index)
    .bind(completed)
    .fetch_one(conn)
    .await
    .map_err(|e| db_error("move quiz batch cursor", e))
}

pub async fn complete_batch(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE quiz_batches SET completed = TRUE WHERE id = $1")
        .bind(batch_id)
        .execute(conn)
        .await
        .map_err(|e| db_error("complete quiz batch", e))?;
    Ok(())
}

pub async fn complete_open_batches(conn: &mut PgConnection, pair: PairKey) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE quiz_batches SET completed = TRUE WHERE user1_id = $1 AND user2_id = $2 AND completed = FALSE",
    )
    .bind(pair.user1_id)
    .bind(pair.user2_id)
    .execute(conn)
    .await
    .map_err(|e| db_error("complete quiz batches", e))?;
    Ok(result.rows_affected())
}

pub async fn complete_expired_batches(
    conn: &mut PgConnection,
    pair: PairKey,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE quiz_batches SET completed = TRUE WHERE user1_id = $1 AND user2_id = $2 AND completed = FALSE AND expires_at <= $3",
    )
    .bind(pair.user1_id)
    .bind(pair.user2_id)
    .bind(now)
    .execute(conn)
    .await
    .map_err(|e| db_error("expire quiz batches", e))?;
    Ok(result.rows_affected())
}

pub async fn insert_response(conn: &mut PgConnection, response: &QuizResponse) -> AppResult<()> {
    let insert_result = sqlx::query(
        "INSERT INTO quiz_responses (id, user_id, question_id, answer, batch_id, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(response.id)
    .bind(response.user_id)
    .bind(response.question_id)
    .bind(&response.answer)
    .bind(response.batch_id)
    .bind(response.created_at)
    .execute(conn)
    .await;

    if let Err(e) = insert_result {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() && db_err.constraint() == Some("quiz_responses_once_key") {
                return Err(AppError::BadRequest(anyhow!("Question already answered")));
            }
        }
        return Err(db_error("save quiz answer", e));
    }
    Ok(())
}

pub async fn delete_response(
    conn: &mut PgConnection,
    batch_id: Uuid,
    user_id: Uuid,
    question_id: i32,
) -> AppResult<()> {
    sqlx::query("DELETE FROM quiz_responses WHERE batch_id = $1 AND user_id = $2 AND question_id = $3")
        .bind(batch_id)
        .bind(user_id)
        .bind(question_id)
        .execute(conn)
        .await
        .map_err(|e| db_error("withdraw quiz answer", e))?;
    Ok(())
}

pub async fn get_response(
    conn: &mut PgConnection,
    batch_id: Uuid,
    user_id: Uuid,
    question_id: i32,
) -> AppResult<Option<QuizResponse>> {
    sqlx::query_as::<_, QuizResponse>(
        "SELECT * FROM quiz_responses WHERE batch_id = $1 AND user_id = $2 AND question_id = $3",
    )
    .bind(batch_id)
    .bind(user_id)
    .bind(question_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| db_error("fetch quiz answer", e))
}

pub async fn get_responses(
    conn: &mut PgConnection,
    user_id: Uuid,
    batch_id: Option<Uuid>,
) -> AppResult<Vec<QuizResponse>> {
    sqlx::query_as::<_, QuizResponse>(
        "SELECT * FROM quiz_responses WHERE user_id = $1 AND ($2::uuid IS NULL OR batch_id = $2) ORDER BY created_at ASC",
    )
    .bind(user_id)
    .bind(batch_id)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("fetch quiz answers", e))
}

pub async fn insert_scoring_marker(
    conn: &mut PgConnection,
    batch_id: Uuid,
    question_id: i32,
) -> AppResult<bool> {
    let result = sqlx::query(
        "INSERT INTO quiz_scored_questions (batch_id, question_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(batch_id)
    .bind(question_id)
    .execute(conn)
    .await
    .map_err(|e| db_error("record quiz scoring", e))?;
    Ok(result.rows_affected() == 1)
}

pub async fn get_scored_question_ids(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<Vec<i32>> {
    let rows: Vec<(i32,)> =
        sqlx::query_as("SELECT question_id FROM quiz_scored_questions WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_all(conn)
            .await
            .map_err(|e| db_error("fetch scored questions", e))?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn get_score(conn: &mut PgConnection, pair: PairKey) -> AppResult<Option<i32>> {
    let score: Option<(i32,)> =
        sqlx::query_as("SELECT score FROM quiz_scores WHERE user1_id = $1 AND user2_id = $2")
            .bind(pair.user1_id)
            .bind(pair.user2_id)
            .fetch_optional(conn)
            .await
            .map_err(|e| db_error("fetch quiz score", e))?;
    Ok(score.map(|(score,)| score))
}

pub async fn add_to_score(conn: &mut PgConnection, pair: PairKey, delta: i32) -> AppResult<i32> {
    let (score,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO quiz_scores (user1_id, user2_id, score)
        VALUES ($1, $2, GREATEST(0, $3))
        ON CONFLICT (user1_id, user2_id)
        DO UPDATE SET score = GREATEST(0, quiz_scores.score + $3)
        RETURNING score
        "#,
    )
    .bind(pair.user1_id)
    .bind(pair.user2_id)
    .bind(delta)
    .fetch_one(conn)
    .await
    .map_err(|e| db_error("update quiz score", e))?;
    Ok(score)
}
