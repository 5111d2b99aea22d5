use crate::{
    model::{Id, post::PostMarker, user::UserMarker},
    util::char_len_within,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const COMMENT_TEXT_MAX_LEN: usize = 1000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub text: CommentText,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub text: CommentText,
    pub created_at: OffsetDateTime,
}

/// Comment body, trimmed. Never empty.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The comment must be between 1 and {max} characters: {0:?}", max = COMMENT_TEXT_MAX_LEN)]
pub struct InvalidCommentTextError(String);

impl CommentText {
    pub fn new(text: String) -> Result<Self, InvalidCommentTextError> {
        let trimmed = text.trim();
        if char_len_within(trimmed, 1, COMMENT_TEXT_MAX_LEN) {
            Ok(CommentText(trimmed.to_owned()))
        } else {
            Err(InvalidCommentTextError(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CommentText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentText::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"CommentText"))
    }
}
