use glimpse_common::model::{
    Id, ModelValidationError,
    auth::Authentication,
    comment::{Comment, CommentText},
    post::{Caption, Like, Post},
    user::{Email, User},
};
use glimpse_common::util::PositiveDuration;
use sqlx::FromRow;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

pub(crate) const POST_COLUMNS: &str = "post_snowflake, user_snowflake, caption, media_url, \
    media_kind, media_file_name, created_at";

pub(crate) const COMMENT_COLUMNS: &str =
    "comment_snowflake, post_snowflake, user_snowflake, text, created_at";

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub email: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub caption: Option<String>,
    pub media_url: String,
    pub media_kind: String,
    pub media_file_name: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct LikeRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            email: Email::new(value.email)?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            caption: value.caption.map(Caption::new).transpose()?,
            media_url: value.media_url,
            media_kind: value.media_kind.parse()?,
            media_file_name: value.media_file_name,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post_id: Id::from_db(value.post_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            text: CommentText::new(value.text)?,
            created_at: value.created_at,
        })
    }
}

impl From<LikeRecord> for Like {
    fn from(value: LikeRecord) -> Self {
        Self {
            post_id: Id::from_db(value.post_snowflake),
            user_id: Id::from_db(value.user_snowflake),
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| PositiveDuration::try_from(Duration::seconds(seconds)))
                .transpose()?,
        })
    }
}

/// Converts a batch of records, failing on the first invalid one.
pub(crate) fn convert_all<R, T>(records: Vec<R>) -> Result<Vec<T>, ModelValidationError>
where
    T: TryFrom<R, Error = ModelValidationError>,
{
    records.into_iter().map(T::try_from).collect()
}
