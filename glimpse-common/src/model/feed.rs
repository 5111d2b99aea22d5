use crate::model::{
    Id,
    comment::{CommentMarker, CommentText},
    post::{Caption, MediaKind, PostMarker},
    user::{Email, UserMarker},
};
use serde::Serialize;
use std::collections::BTreeSet;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct Feed {
    pub posts: Vec<FeedItem>,
}

/// A post as seen by one viewer, with everything the client needs to render it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct FeedItem {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    /// `None` only if the author row vanished between reads.
    pub author_email: Option<Email>,
    pub caption: Option<Caption>,
    pub media_url: String,
    pub media_kind: MediaKind,
    pub media_file_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub like_user_ids: BTreeSet<Id<UserMarker>>,
    pub comments: Vec<FeedComment>,
    pub is_owner: bool,
}

impl FeedItem {
    #[must_use]
    pub fn likes_count(&self) -> usize {
        self.like_user_ids.len()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct FeedComment {
    pub id: Id<CommentMarker>,
    pub author_id: Id<UserMarker>,
    pub text: CommentText,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
