use crate::store::{Result, Store, Transaction};
use glimpse_common::model::{
    Id,
    comment::Comment,
    feed::{Feed, FeedComment, FeedItem},
    post::{Like, Post, PostMarker},
    user::{Email, User, UserMarker},
};
use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap},
};
use tracing::debug;

/// Builds the feed as seen by `viewer`.
///
/// Four batched reads inside one snapshot (posts, then their authors, comments and likes),
/// joined in memory. The number of queries does not depend on the number of posts.
pub async fn assemble_feed<S: Store>(store: &S, viewer: Id<UserMarker>) -> Result<Feed> {
    let mut tx = store.snapshot().await?;

    let posts = tx.fetch_posts().await?;

    let post_ids: Vec<Id<PostMarker>> = posts.iter().map(|post| post.id).collect();
    let author_ids: Vec<Id<UserMarker>> = posts
        .iter()
        .map(|post| post.author_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let users = tx.fetch_users(&author_ids).await?;
    let comments = tx.fetch_comments(&post_ids).await?;
    let likes = tx.fetch_likes(&post_ids).await?;

    // Read-only, nothing to keep. Dropping rolls back.
    drop(tx);

    debug!(
        %viewer,
        posts = posts.len(),
        authors = author_ids.len(),
        comments = comments.len(),
        likes = likes.len(),
        "Assembled feed"
    );

    Ok(Feed {
        posts: denormalize(viewer, posts, users, comments, likes),
    })
}

/// Joins normalized rows into feed items.
///
/// Items come out newest first with ties broken by descending id, comments oldest first with
/// ties broken by ascending id, whatever order the inputs were in. Comments and likes on posts
/// not in `posts` are ignored.
#[must_use]
pub fn denormalize(
    viewer: Id<UserMarker>,
    mut posts: Vec<Post>,
    users: Vec<User>,
    comments: Vec<Comment>,
    likes: Vec<Like>,
) -> Vec<FeedItem> {
    posts.sort_by_key(|post| Reverse((post.created_at, post.id)));

    let emails: HashMap<Id<UserMarker>, Email> =
        users.into_iter().map(|user| (user.id, user.email)).collect();

    let mut comments_by_post: HashMap<Id<PostMarker>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        comments_by_post
            .entry(comment.post_id)
            .or_default()
            .push(comment);
    }

    let mut likes_by_post: HashMap<Id<PostMarker>, BTreeSet<Id<UserMarker>>> = HashMap::new();
    for like in likes {
        likes_by_post
            .entry(like.post_id)
            .or_default()
            .insert(like.user_id);
    }

    posts
        .into_iter()
        .map(|post| {
            let mut comments = comments_by_post.remove(&post.id).unwrap_or_default();
            comments.sort_by_key(|comment| (comment.created_at, comment.id));

            FeedItem {
                id: post.id,
                author_id: post.author_id,
                // An author with several posts needs the email more than once.
                author_email: emails.get(&post.author_id).cloned(),
                caption: post.caption,
                media_url: post.media_url,
                media_kind: post.media_kind,
                media_file_name: post.media_file_name,
                created_at: post.created_at,
                like_user_ids: likes_by_post.remove(&post.id).unwrap_or_default(),
                comments: comments
                    .into_iter()
                    .map(|comment| FeedComment {
                        id: comment.id,
                        author_id: comment.author_id,
                        text: comment.text,
                        created_at: comment.created_at,
                    })
                    .collect(),
                is_owner: post.author_id == viewer,
            }
        })
        .collect()
}
