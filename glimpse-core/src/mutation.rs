//! Writes against a single post. Each public function is one store transaction.

use crate::{
    error::MutationError,
    media::{MediaHost, MediaUpload},
    store::{Store, Transaction},
};
use glimpse_common::model::{
    Id,
    comment::{Comment, CommentText, CreateComment},
    post::{Caption, CreatePost, Like, LikeAction, MediaKind, Post, PostMarker, PostUpdate},
    user::UserMarker,
};
use time::OffsetDateTime;
use tracing::{debug, warn};

pub type Result<T, E = MutationError> = std::result::Result<T, E>;

/// What a combined [`update_post`] left behind.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostUpdateOutcome {
    pub post: Post,
    pub likes_count: u64,
    pub comment: Option<Comment>,
}

async fn fetch_post<T: Transaction>(tx: &mut T, post_id: Id<PostMarker>) -> Result<Post> {
    tx.fetch_post(post_id)
        .await?
        .ok_or(MutationError::NotFound(post_id))
}

fn ensure_author(post: &Post, user_id: Id<UserMarker>) -> Result<()> {
    if post.is_authored_by(user_id) {
        Ok(())
    } else {
        Err(MutationError::Forbidden {
            post: post.id,
            user: user_id,
        })
    }
}

async fn apply_like<T: Transaction>(tx: &mut T, like: Like, action: LikeAction) -> Result<()> {
    match action {
        LikeAction::Like => tx.insert_like(like).await?,
        LikeAction::Unlike => tx.delete_like(like).await?,
    }
    Ok(())
}

async fn apply_comment<T: Transaction>(
    tx: &mut T,
    post_id: Id<PostMarker>,
    author_id: Id<UserMarker>,
    text: CommentText,
) -> Result<Comment> {
    let comment = tx
        .insert_comment(&CreateComment {
            post_id,
            author_id,
            text,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;
    Ok(comment)
}

async fn apply_caption<T: Transaction>(
    tx: &mut T,
    post_id: Id<PostMarker>,
    caption: &Caption,
) -> Result<Post> {
    let caption = (!caption.is_blank()).then_some(caption);
    Ok(tx.update_caption(post_id, caption).await?)
}

/// Uploads the media, then records the post.
///
/// If the insert fails after a successful upload the hosted file is left behind; it is
/// logged so it can be cleaned up by hand.
pub async fn create_post<S: Store, M: MediaHost>(
    store: &S,
    media_host: &M,
    author_id: Id<UserMarker>,
    upload: MediaUpload,
    caption: Option<Caption>,
) -> Result<Post> {
    let media_kind = MediaKind::from_content_type(&upload.content_type);
    let hosted = media_host.upload(upload).await?;

    let create = CreatePost {
        author_id,
        caption: caption.filter(|caption| !caption.is_blank()),
        media_url: hosted.url,
        media_kind,
        media_file_name: hosted.file_name,
        created_at: OffsetDateTime::now_utc(),
    };

    let inserted = async {
        let mut tx = store.begin().await?;
        let post = tx.insert_post(&create).await?;
        tx.commit().await?;
        Ok::<_, MutationError>(post)
    }
    .await;

    match inserted {
        Ok(post) => {
            debug!(post = %post.id, author = %author_id, kind = media_kind.as_str(), "Created post");
            Ok(post)
        }
        Err(err) => {
            warn!(
                media_url = %create.media_url,
                media_file_name = %create.media_file_name,
                error = %err,
                "Post insert failed after upload, hosted media is orphaned"
            );
            Err(err)
        }
    }
}

/// Deletes a post with its comments and likes. Only the author may do this.
pub async fn delete_post<S: Store>(
    store: &S,
    user_id: Id<UserMarker>,
    post_id: Id<PostMarker>,
) -> Result<()> {
    let mut tx = store.begin().await?;

    let post = fetch_post(&mut tx, post_id).await?;
    ensure_author(&post, user_id)?;

    tx.delete_post(post_id).await?;
    tx.commit().await?;

    debug!(post = %post_id, user = %user_id, "Deleted post");
    Ok(())
}

/// Likes or unlikes a post for `user_id` and returns the resulting number of likers.
/// Repeating the same action is a no-op.
pub async fn toggle_like<S: Store>(
    store: &S,
    user_id: Id<UserMarker>,
    post_id: Id<PostMarker>,
    action: LikeAction,
) -> Result<u64> {
    let mut tx = store.begin().await?;

    fetch_post(&mut tx, post_id).await?;
    apply_like(&mut tx, Like { post_id, user_id }, action).await?;
    let likes_count = tx.count_likes(post_id).await?;

    tx.commit().await?;

    debug!(post = %post_id, user = %user_id, ?action, likes_count, "Toggled like");
    Ok(likes_count)
}

pub async fn add_comment<S: Store>(
    store: &S,
    user_id: Id<UserMarker>,
    post_id: Id<PostMarker>,
    text: CommentText,
) -> Result<Comment> {
    let mut tx = store.begin().await?;

    fetch_post(&mut tx, post_id).await?;
    let comment = apply_comment(&mut tx, post_id, user_id, text).await?;

    tx.commit().await?;

    debug!(post = %post_id, user = %user_id, comment = %comment.id, "Added comment");
    Ok(comment)
}

/// Replaces the caption. Only the author may do this; a blank caption clears it.
pub async fn edit_caption<S: Store>(
    store: &S,
    user_id: Id<UserMarker>,
    post_id: Id<PostMarker>,
    caption: Caption,
) -> Result<Post> {
    let mut tx = store.begin().await?;

    let post = fetch_post(&mut tx, post_id).await?;
    ensure_author(&post, user_id)?;
    let post = apply_caption(&mut tx, post_id, &caption).await?;

    tx.commit().await?;

    debug!(post = %post_id, user = %user_id, "Edited caption");
    Ok(post)
}

/// Applies any combination of like toggle, new comment and caption edit in one transaction.
///
/// Absent parts are skipped. Permissions are checked before anything is written, so a
/// caption edit by someone other than the author fails the whole update.
///
/// Such a request answers 403 with nothing applied, not even the like or comment it carries.
pub async fn update_post<S: Store>(
    store: &S,
    user_id: Id<UserMarker>,
    post_id: Id<PostMarker>,
    update: PostUpdate,
) -> Result<PostUpdateOutcome> {
    let mut tx = store.begin().await?;

    let mut post = fetch_post(&mut tx, post_id).await?;
    if update.caption.is_some() {
        ensure_author(&post, user_id)?;
    }

    if let Some(action) = update.like_action {
        apply_like(&mut tx, Like { post_id, user_id }, action).await?;
    }

    let comment = match update.new_comment {
        Some(text) => Some(apply_comment(&mut tx, post_id, user_id, text).await?),
        None => None,
    };

    if let Some(caption) = &update.caption {
        post = apply_caption(&mut tx, post_id, caption).await?;
    }

    let likes_count = tx.count_likes(post_id).await?;
    tx.commit().await?;

    debug!(
        post = %post_id,
        user = %user_id,
        like_action = ?update.like_action,
        commented = comment.is_some(),
        caption_edited = update.caption.is_some(),
        likes_count,
        "Updated post"
    );

    Ok(PostUpdateOutcome {
        post,
        likes_count,
        comment,
    })
}
