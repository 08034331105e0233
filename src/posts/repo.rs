use sqlx::PgPool;

use super::repo_types::{Comment, CommentView, Post, PostSummary};

pub async fn list_by_author(
    db: &PgPool,
    author_id: i64,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<PostSummary>> {
    sqlx::query_as::<_, PostSummary>(
        r#"
        SELECT p.id, p.body, p.created_at, COUNT(c.id) AS comment_count
        FROM posts p
        LEFT JOIN comments c ON c.post_id = p.id
        WHERE p.author_id = $1
        GROUP BY p.id
        ORDER BY p.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(author_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn find(db: &PgPool, id: i64) -> sqlx::Result<Option<Post>> {
    sqlx::query_as::<_, Post>(
        r#"SELECT id, author_id, body, created_at FROM posts WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn create(db: &PgPool, author_id: i64, body: &str) -> sqlx::Result<Post> {
    sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (author_id, body)
        VALUES ($1, $2)
        RETURNING id, author_id, body, created_at
        "#,
    )
    .bind(author_id)
    .bind(body)
    .fetch_one(db)
    .await
}

pub async fn update_body(db: &PgPool, id: i64, body: &str) -> sqlx::Result<()> {
    sqlx::query(r#"UPDATE posts SET body = $2 WHERE id = $1"#)
        .bind(id)
        .bind(body)
        .execute(db)
        .await?;
    Ok(())
}

/// Comments go with the post via ON DELETE CASCADE.
pub async fn delete(db: &PgPool, id: i64) -> sqlx::Result<()> {
    sqlx::query(r#"DELETE FROM posts WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn comments_for_post(db: &PgPool, post_id: i64) -> sqlx::Result<Vec<CommentView>> {
    sqlx::query_as::<_, CommentView>(
        r#"
        SELECT c.id, c.post_id, c.author_id, u.username AS author, c.body, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.post_id = $1
        ORDER BY c.created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(db)
    .await
}

pub async fn find_comment(db: &PgPool, id: i64) -> sqlx::Result<Option<Comment>> {
    sqlx::query_as::<_, Comment>(
        r#"SELECT id, post_id, author_id, body, created_at FROM comments WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn create_comment(
    db: &PgPool,
    post_id: i64,
    author_id: i64,
    body: &str,
) -> sqlx::Result<Comment> {
    sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, author_id, body)
        VALUES ($1, $2, $3)
        RETURNING id, post_id, author_id, body, created_at
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(body)
    .fetch_one(db)
    .await
}

pub async fn update_comment(db: &PgPool, id: i64, body: &str) -> sqlx::Result<()> {
    sqlx::query(r#"UPDATE comments SET body = $2 WHERE id = $1"#)
        .bind(id)
        .bind(body)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_comment(db: &PgPool, id: i64) -> sqlx::Result<()> {
    sqlx::query(r#"DELETE FROM comments WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
