use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::dto::MessageResponse, auth::jwt::VerifiedUser, error::ApiError, posts::repo,
    state::AppState,
};

use super::dto::{
    CommentResponse, CreateCommentRequest, CreatePostRequest, Pagination, PostDetails,
    PostListItem, PostResponse, UpdateCommentRequest, UpdatePostRequest,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", get(get_post).put(update_post).delete(delete_post))
        .route("/posts/:id/comments", post(create_comment))
}

pub fn comment_routes() -> Router<AppState> {
    Router::new().route("/comments/:id", put(update_comment).delete(delete_comment))
}

fn require_body(body: &str) -> Result<&str, ApiError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("body must not be empty".into()));
    }
    Ok(trimmed)
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<PostListItem>>, ApiError> {
    let posts = repo::list_by_author(&state.db, claims.sub, p.limit, p.offset).await?;
    let items = posts
        .into_iter()
        .map(|p| PostListItem {
            id: p.id,
            body: p.body,
            created_at: p.created_at,
            comment_count: p.comment_count,
        })
        .collect();
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    VerifiedUser(_claims): VerifiedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostDetails>, ApiError> {
    let post = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;
    let comments = repo::comments_for_post(&state.db, id).await?;
    Ok(Json(PostDetails {
        id: post.id,
        author_id: post.author_id,
        body: post.body,
        created_at: post.created_at,
        comments,
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let body = require_body(&payload.body)?;
    let post = repo::create(&state.db, claims.sub, body).await?;
    info!(post_id = post.id, author_id = post.author_id, "post created");
    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: post.id,
            author_id: post.author_id,
            body: post.body,
            created_at: post.created_at,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let body = require_body(&payload.body)?;
    let post = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    // Ownership is checked against the stored author id, never the payload.
    if post.author_id != claims.sub {
        warn!(post_id = id, subject = claims.sub, "post edit by non-owner");
        return Err(ApiError::Authorization("not the author of this post".into()));
    }

    repo::update_body(&state.db, id, body).await?;
    Ok(Json(MessageResponse {
        message: "post updated".into(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let post = repo::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    if post.author_id != claims.sub {
        warn!(post_id = id, subject = claims.sub, "post delete by non-owner");
        return Err(ApiError::Authorization("not the author of this post".into()));
    }

    repo::delete(&state.db, id).await?;
    info!(post_id = id, "post deleted");
    Ok(Json(MessageResponse {
        message: "post deleted".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let body = require_body(&payload.body)?;
    repo::find(&state.db, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    let comment = repo::create_comment(&state.db, post_id, claims.sub, body).await?;
    info!(comment_id = comment.id, post_id, "comment created");
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: comment.created_at,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_comment(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let body = require_body(&payload.body)?;
    let comment = repo::find_comment(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("comment not found".into()))?;

    if comment.author_id != claims.sub {
        warn!(comment_id = id, subject = claims.sub, "comment edit by non-owner");
        return Err(ApiError::Authorization(
            "not the author of this comment".into(),
        ));
    }

    repo::update_comment(&state.db, id, body).await?;
    Ok(Json(MessageResponse {
        message: "comment updated".into(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let comment = repo::find_comment(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("comment not found".into()))?;

    if comment.author_id != claims.sub {
        warn!(comment_id = id, subject = claims.sub, "comment delete by non-owner");
        return Err(ApiError::Authorization(
            "not the author of this comment".into(),
        ));
    }

    repo::delete_comment(&state.db, id).await?;
    info!(comment_id = id, "comment deleted");
    Ok(Json(MessageResponse {
        message: "comment deleted".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_body_rejects_blank() {
        assert!(require_body("").is_err());
        assert!(require_body("   \n\t").is_err());
        assert_eq!(require_body("  hello  ").unwrap(), "hello");
    }
}
