use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use super::{load_couple, load_user};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::middlewares::auth::current_user_id;
use crate::quiz::CurrentQuestion;

pub async fn get_batch(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let (user, partner_id) = load_couple(&state, current_user_id(&session).await?).await?;
    let batch = state
        .quiz
        .get_or_create_batch(user.id, partner_id, Utc::now())
        .await?;

    Ok(Json(serde_json::json!({
        "batch_id": batch.id,
        "total_questions": batch.total_questions(),
        "current_index": batch.current_index,
        "completed": batch.completed,
        "expires_at": batch.expires_at,
    })))
}

pub async fn create_new_batch(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let (user, partner_id) = load_couple(&state, current_user_id(&session).await?).await?;
    let batch = state
        .quiz
        .start_new_batch(user.id, partner_id, Utc::now())
        .await?;

    Ok(Json(serde_json::json!({
        "message": "New batch created",
        "batch_id": batch.id,
        "total_questions": batch.total_questions(),
    })))
}

pub async fn get_question(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let (user, partner_id) = load_couple(&state, current_user_id(&session).await?).await?;
    let current = state
        .quiz
        .current_question(user.id, partner_id, Utc::now())
        .await?;

    let body = match current {
        CurrentQuestion::Question {
            question,
            position,
            total,
        } => serde_json::json!({
            "id": question.id,
            "question": question.text,
            "options": question.options,
            "tag": question.tag,
            "batch_progress": {
                "current": position,
                "total": total,
            },
        }),
        CurrentQuestion::Completed => serde_json::json!({
            "message": "Batch completed",
            "completed": true,
        }),
    };
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct SubmitAnswer {
    question_id: Option<i32>,
    answer: Option<String>,
}

pub async fn submit_answer(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<SubmitAnswer>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&session).await?;

    let answer = payload.answer.map(|a| a.trim().to_string());
    let (question_id, answer) = match (payload.question_id, answer) {
        (Some(question_id), Some(answer)) if question_id > 0 && !answer.is_empty() => {
            (question_id, answer)
        }
        _ => {
            return Err(AppError::BadRequest(anyhow!(
                "question_id and answer required"
            )))
        }
    };

    let (user, partner_id) = load_couple(&state, user_id).await?;
    let outcome = state
        .quiz
        .submit_answer(user.id, partner_id, question_id, answer, Utc::now())
        .await?;

    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct PartnerResponseQuery {
    question_id: Option<String>,
}

pub async fn check_partner_response(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PartnerResponseQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&session).await?;

    let raw = query
        .question_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow!("question_id is required")))?;
    let question_id = raw
        .trim()
        .parse::<i32>()
        .map_err(|_| AppError::BadRequest(anyhow!("question_id must be an integer")))?;

    let (user, partner_id) = load_couple(&state, user_id).await?;
    let check = state
        .quiz
        .check_partner_response(user.id, partner_id, question_id)
        .await?;

    Ok(Json(check))
}

pub async fn get_score(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user = load_user(&state, current_user_id(&session).await?).await?;
    let Some(partner_id) = user.connected_partner() else {
        return Ok(Json(serde_json::json!({
            "score": 0,
            "message": "No partner connected",
        })));
    };

    let summary = state.quiz.score_summary(user.id, partner_id).await?;
    Ok(Json(serde_json::json!(summary)))
}

pub async fn get_status(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let user = load_user(&state, current_user_id(&session).await?).await?;
    let Some(partner_id) = user.connected_partner() else {
        return Ok(Json(serde_json::json!({
            "has_partner": false,
            "message": "No partner connected",
        })));
    };

    let partner_name = state
        .users
        .find_user_by_id(partner_id)
        .await?
        .map_or_else(|| "Partner".to_string(), |partner| partner.name);
    let status = state.quiz.status(user.id, partner_id).await?;

    Ok(Json(serde_json::json!({
        "has_partner": true,
        "partner_name": partner_name,
        "current_score": status.current_score,
        "has_active_batch": status.has_active_batch,
        "pending_questions": status.pending_questions,
        "batch_info": status.batch_info,
    })))
}

pub async fn get_batch_results(
    State(state): State<AppState>,
    session: Session,
    Path(batch_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&session).await?;
    let batch_id = Uuid::parse_str(batch_id.trim())
        .map_err(|_| AppError::BadRequest(anyhow!("Invalid batch ID format")))?;

    let (user, partner_id) = load_couple(&state, user_id).await?;
    let questions = state
        .quiz
        .batch_results(user.id, partner_id, batch_id)
        .await?;

    Ok(Json(serde_json::json!({ "questions": questions })))
}
