use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        codes,
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RefreshResponse, RegisterRequest, RegisterResponse, ResendVerificationRequest,
            ResetPasswordRequest, VerifyRequest, WhoamiResponse,
        },
        jwt::{bearer_token, AuthUser, JwtKeys},
        password::{hash_password, is_valid_email, validate_password, verify_password},
        repo_types::User,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify", post(verify))
        .route("/resend_verification_code", post(resend_verification_code))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logeado", get(logeado))
        .route("/forgot_password", post(forgot_password))
        .route("/reset_password", post(reset_password))
}

fn verification_email(code: &str, ttl_minutes: i64) -> (String, String) {
    (
        "Your verification code".into(),
        format!(
            "This is your verification code. Do not share it with anyone: {code}\n\
             It expires in {ttl_minutes} minutes."
        ),
    )
}

fn reset_email(code: &str, ttl_minutes: i64) -> (String, String) {
    (
        "Password reset".into(),
        format!(
            "Use this code to reset your password: {code}\n\
             It expires in {ttl_minutes} minutes. If you did not request this, ignore this email."
        ),
    )
}

fn welcome_email(username: &str) -> (String, String) {
    (
        "Welcome to Eternia!".into(),
        format!("Hi {username}, your account has been verified. Welcome to Eternia!"),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if payload.username.is_empty() {
        return Err(ApiError::Validation("username is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }
    validate_password(&payload.password).map_err(|e| ApiError::Validation(e.to_string()))?;

    let hash = hash_password(&payload.password)?;
    let code = codes::verification_code();
    let ttl_minutes = state.config.verification_code_ttl_minutes;
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes);

    // A duplicate email or username trips the unique constraint and maps to
    // a 409; concurrent attempts are serialized by the store, not by us.
    let user = User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &hash,
        &payload.description,
        &code,
        expires_at,
    )
    .await?;

    // The row is kept even when the mail bounces; the resend endpoint
    // covers recovery.
    let (subject, body) = verification_email(&code, ttl_minutes);
    let email_sent = match state.mailer.send(&user.email, &subject, &body).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, user_id = user.id, "verification email failed");
            false
        }
    };

    info!(user_id = user.id, username = %user.username, "user registered");
    let message = if email_sent {
        "registered; check your email for the verification code".into()
    } else {
        "registered, but the verification email could not be sent; request a new code".into()
    };
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            email_sent,
            message,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("unknown email".into()))?;

    if user.verified {
        // Idempotent up to first success: report it, send nothing again.
        return Ok(Json(MessageResponse {
            message: "account already verified".into(),
        }));
    }

    let (code, expires_at) = match (user.verification_code.as_deref(), user.verification_expires_at)
    {
        (Some(c), Some(e)) => (c, e),
        _ => {
            return Err(ApiError::Validation(
                "no pending verification; request a new code".into(),
            ))
        }
    };

    if OffsetDateTime::now_utc() >= expires_at {
        // Single use: an expired code must never validate on a later call.
        User::clear_verification_code(&state.db, user.id).await?;
        return Err(ApiError::Validation(
            "verification code expired; request a new code".into(),
        ));
    }
    if payload.code != code {
        return Err(ApiError::Validation("incorrect verification code".into()));
    }

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = user.id, "account verified");

    let (subject, body) = welcome_email(&user.username);
    if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
        warn!(error = %e, user_id = user.id, "welcome email failed");
    }

    Ok(Json(MessageResponse {
        message: "account verified".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification_code(
    State(state): State<AppState>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("unknown email".into()))?;

    if user.verified {
        return Err(ApiError::Validation("account already verified".into()));
    }

    let code = codes::verification_code();
    let ttl_minutes = state.config.verification_code_ttl_minutes;
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes);
    User::set_verification_code(&state.db, user.id, &code, expires_at).await?;

    let (subject, body) = verification_email(&code, ttl_minutes);
    state.mailer.send(&user.email, &subject, &body).await?;

    info!(user_id = user.id, "verification code resent");
    Ok(Json(MessageResponse {
        message: "verification code sent; check your email".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password are indistinguishable to the caller.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Authentication("invalid email or password".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::Authentication("invalid email or password".into()));
    }

    if !user.verified {
        warn!(user_id = user.id, "login on unverified account");
        return Err(ApiError::Authorization("account not verified".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
            verified: user.verified,
        },
    }))
}

#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Authentication("missing bearer token".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        ApiError::Authentication("invalid or expired refresh token".into())
    })?;

    // Re-read the row so the new access token reflects the current verified
    // flag and username/email, not what they were at login time.
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Authentication("unknown subject".into()))?;

    let access_token = keys.sign_access(&user)?;
    Ok(Json(RefreshResponse { access_token }))
}

#[instrument(skip_all)]
pub async fn logeado(AuthUser(claims): AuthUser) -> Json<WhoamiResponse> {
    Json(WhoamiResponse {
        user_id: claims.sub,
        username: claims.username.unwrap_or_default(),
        email: claims.email.unwrap_or_default(),
    })
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    // The response is identical whether or not the account exists.
    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        let code = codes::reset_code();
        let ttl_minutes = state.config.reset_code_ttl_minutes;
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes);
        User::set_reset_code(&state.db, user.id, &code, expires_at).await?;

        let (subject, body) = reset_email(&code, ttl_minutes);
        if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
            error!(error = %e, user_id = user.id, "reset email failed");
        } else {
            info!(user_id = user.id, "reset code sent");
        }
    }

    Ok(Json(MessageResponse {
        message: "if the email exists, a reset code has been sent".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_password(&payload.new_password).map_err(|e| ApiError::Validation(e.to_string()))?;

    let user = User::find_by_reset_code(&state.db, &payload.code)
        .await?
        .ok_or_else(|| ApiError::Validation("invalid or unknown reset code".into()))?;

    let expires_at = user
        .reset_expires_at
        .ok_or_else(|| ApiError::Validation("invalid or unknown reset code".into()))?;
    if OffsetDateTime::now_utc() >= expires_at {
        User::clear_reset_code(&state.db, user.id).await?;
        return Err(ApiError::Validation(
            "reset code expired; request a new one".into(),
        ));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "password reset successfully".into(),
    }))
}

#[cfg(test)]
mod email_tests {
    use super::*;

    #[test]
    fn verification_email_contains_code_and_ttl() {
        let (subject, body) = verification_email("123456", 15);
        assert!(!subject.is_empty());
        assert!(body.contains("123456"));
        assert!(body.contains("15 minutes"));
    }

    #[test]
    fn reset_email_contains_code() {
        let (_, body) = reset_email("abcDEF123", 15);
        assert!(body.contains("abcDEF123"));
    }

    #[test]
    fn welcome_email_greets_by_username() {
        let (_, body) = welcome_email("alice");
        assert!(body.contains("alice"));
    }
}
