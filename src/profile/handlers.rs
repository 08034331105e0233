use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{jwt::VerifiedUser, repo_types::User},
    error::ApiError,
    state::AppState,
};

use super::dto::{AvatarResponse, ProfileResponse, UpdateProfileRequest};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/perfil", get(get_profile).put(update_profile))
        .route(
            "/perfil/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(16 * 1024 * 1024)),
        )
}

fn avatar_url(key: &str) -> String {
    format!("/uploads/{key}")
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email,
        description: user.description,
        avatar_url: user.avatar_key.as_deref().map(avatar_url),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    payload.username = payload.username.trim().to_string();
    if payload.username.is_empty() {
        return Err(ApiError::Validation("username is required".into()));
    }

    // The unique constraint still backs this up under a race.
    if User::username_taken(&state.db, &payload.username, claims.sub).await? {
        return Err(ApiError::Conflict("username already taken".into()));
    }

    let user = User::update_profile(&state.db, claims.sub, &payload.username, &payload.description)
        .await?;

    info!(user_id = user.id, "profile updated");
    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email,
        description: user.description,
        avatar_url: user.avatar_key.as_deref().map(avatar_url),
    }))
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[instrument(skip(state, multipart))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, ApiError> {
    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("avatar") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("invalid upload: {e}")))?;
            upload = Some((content_type, data));
        }
    }

    let (content_type, data) =
        upload.ok_or_else(|| ApiError::Validation("avatar field is required".into()))?;
    if data.is_empty() {
        return Err(ApiError::Validation("avatar file is empty".into()));
    }
    let ext = extension_for(&content_type)
        .ok_or_else(|| ApiError::Validation("unsupported image type".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let key = format!("{}/{}.{}", user.id, Uuid::new_v4(), ext);
    state.storage.put_object(&key, data, &content_type).await?;
    User::set_avatar_key(&state.db, user.id, &key).await?;

    // Best-effort cleanup of the replaced file.
    if let Some(old_key) = user.avatar_key {
        if let Err(e) = state.storage.delete_object(&old_key).await {
            warn!(error = %e, %old_key, "failed to delete old avatar");
        }
    }

    info!(user_id = user.id, %key, "avatar uploaded");
    Ok(Json(AvatarResponse {
        avatar_url: avatar_url(&key),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/gif"), Some("gif"));
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn avatar_url_is_served_from_uploads() {
        assert_eq!(avatar_url("7/abc.png"), "/uploads/7/abc.png");
    }
}
