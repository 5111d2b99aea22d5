use crate::{
    model::{Id, comment::CommentText, user::UserMarker},
    util::char_len_within,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

pub const CAPTION_MAX_LEN: usize = 2200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub caption: Option<Caption>,
    pub media_url: String,
    pub media_kind: MediaKind,
    pub media_file_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Post {
    #[must_use]
    pub fn is_authored_by(&self, user_id: Id<UserMarker>) -> bool {
        self.author_id == user_id
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author_id: Id<UserMarker>,
    pub caption: Option<Caption>,
    pub media_url: String,
    pub media_kind: MediaKind,
    pub media_file_name: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown media kind: {0}")]
pub struct UnknownMediaKindError(String);

impl MediaKind {
    /// Anything that is not explicitly a video is treated as an image.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = UnknownMediaKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(UnknownMediaKindError(other.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Caption(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The caption is longer than {max} characters", max = CAPTION_MAX_LEN)]
pub struct InvalidCaptionError(String);

impl Caption {
    pub fn new(caption: String) -> Result<Self, InvalidCaptionError> {
        if char_len_within(&caption, 0, CAPTION_MAX_LEN) {
            Ok(Caption(caption))
        } else {
            Err(InvalidCaptionError(caption))
        }
    }

    /// Blank captions are stored as no caption at all.
    pub fn new_optional(caption: String) -> Result<Option<Self>, InvalidCaptionError> {
        if caption.trim().is_empty() {
            Ok(None)
        } else {
            Self::new(caption).map(Some)
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<'de> Deserialize<'de> for Caption {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Caption::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Caption"))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Like {
    pub post_id: Id<PostMarker>,
    pub user_id: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Unlike,
}

/// The combined mutation accepted for a single post. Every field is optional and absent
/// fields are left alone.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PostUpdate {
    pub caption: Option<Caption>,
    pub like_action: Option<LikeAction>,
    pub new_comment: Option<CommentText>,
}
