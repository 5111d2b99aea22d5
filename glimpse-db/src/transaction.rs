use crate::{
    client::{DbError, IdGenerator},
    record::{
        COMMENT_COLUMNS, CommentRecord, LikeRecord, POST_COLUMNS, PostRecord, UserRecord,
        convert_all,
    },
};
use glimpse_common::model::{
    Id,
    comment::{Comment, CommentMarker, CreateComment},
    post::{Caption, CreatePost, Like, Post, PostMarker},
    user::{User, UserMarker},
};
use glimpse_core::store::{Result, Transaction};
use sqlx::{Postgres, query, query_as, query_scalar};

fn db_ids<Marker>(ids: &[Id<Marker>]) -> Vec<i64> {
    ids.iter().map(|id| id.to_db()).collect()
}

/// A Postgres transaction. Dropping it without [`Transaction::commit`] rolls it back.
#[derive(Debug)]
pub struct DbTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    ids: IdGenerator,
}

impl DbTransaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Postgres>, ids: IdGenerator) -> Self {
        Self { tx, ids }
    }
}

impl Transaction for DbTransaction {
    async fn fetch_posts(&mut self) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(&format!(
            "
            SELECT {POST_COLUMNS}
            FROM posts.posts
            ORDER BY created_at DESC, post_snowflake DESC
            "
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(convert_all(records)?)
    }

    async fn fetch_post(&mut self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            SELECT {POST_COLUMNS}
            FROM posts.posts
            WHERE post_snowflake = $1
            "
        ))
        .bind(post_id.to_db())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(record.map(Post::try_from).transpose()?)
    }

    async fn fetch_users(&mut self, user_ids: &[Id<UserMarker>]) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.email
            FROM
                users.users
            WHERE
                users.user_snowflake = ANY($1)
            ",
        )
        .bind(db_ids(user_ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(convert_all(records)?)
    }

    async fn fetch_comments(&mut self, post_ids: &[Id<PostMarker>]) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(&format!(
            "
            SELECT {COMMENT_COLUMNS}
            FROM posts.comments
            WHERE post_snowflake = ANY($1)
            ORDER BY created_at, comment_snowflake
            "
        ))
        .bind(db_ids(post_ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(convert_all(records)?)
    }

    async fn fetch_likes(&mut self, post_ids: &[Id<PostMarker>]) -> Result<Vec<Like>> {
        let records = query_as::<_, LikeRecord>(
            "
            SELECT post_snowflake, user_snowflake
            FROM posts.likes
            WHERE post_snowflake = ANY($1)
            ",
        )
        .bind(db_ids(post_ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(records.into_iter().map(Like::from).collect())
    }

    async fn insert_post(&mut self, post: &CreatePost) -> Result<Post> {
        let post_id = self.ids.next::<PostMarker>()?;

        let record = query_as::<_, PostRecord>(&format!(
            "
            INSERT INTO posts.posts ({POST_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(post_id.to_db())
        .bind(post.author_id.to_db())
        .bind(post.caption.as_ref().map(Caption::get))
        .bind(&post.media_url)
        .bind(post.media_kind.as_str())
        .bind(&post.media_file_name)
        .bind(post.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(Post::try_from(record)?)
    }

    async fn delete_post(&mut self, post_id: Id<PostMarker>) -> Result<()> {
        // Comments and likes go with it through ON DELETE CASCADE.
        query("DELETE FROM posts.posts WHERE post_snowflake = $1")
            .bind(post_id.to_db())
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn update_caption(
        &mut self,
        post_id: Id<PostMarker>,
        caption: Option<&Caption>,
    ) -> Result<Post> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            UPDATE posts.posts
            SET caption = $2
            WHERE post_snowflake = $1
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(post_id.to_db())
        .bind(caption.map(Caption::get))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(Post::try_from(record)?)
    }

    async fn insert_like(&mut self, like: Like) -> Result<()> {
        query(
            "
            INSERT INTO posts.likes (post_snowflake, user_snowflake)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(like.post_id.to_db())
        .bind(like.user_id.to_db())
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }

    async fn delete_like(&mut self, like: Like) -> Result<()> {
        query("DELETE FROM posts.likes WHERE post_snowflake = $1 AND user_snowflake = $2")
            .bind(like.post_id.to_db())
            .bind(like.user_id.to_db())
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn count_likes(&mut self, post_id: Id<PostMarker>) -> Result<u64> {
        let count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts.likes WHERE post_snowflake = $1",
        )
        .bind(post_id.to_db())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(count.cast_unsigned())
    }

    async fn insert_comment(&mut self, comment: &CreateComment) -> Result<Comment> {
        let comment_id = self.ids.next::<CommentMarker>()?;

        let record = query_as::<_, CommentRecord>(&format!(
            "
            INSERT INTO posts.comments ({COMMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COMMENT_COLUMNS}
            "
        ))
        .bind(comment_id.to_db())
        .bind(comment.post_id.to_db())
        .bind(comment.author_id.to_db())
        .bind(comment.text.get())
        .bind(comment.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(Comment::try_from(record)?)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}
