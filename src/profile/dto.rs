use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub description: String,
    pub avatar_url: Option<String>,
}

/// Request body for profile updates; email is immutable and absent here.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub avatar_url: String,
}
