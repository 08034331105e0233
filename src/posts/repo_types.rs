use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: OffsetDateTime,
}

/// One row of the post listing, with its comment count aggregated in.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostSummary {
    pub id: i64,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: OffsetDateTime,
}

/// Comment joined with its author's username for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}
