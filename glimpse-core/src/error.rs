use glimpse_common::model::{Id, ModelValidationError, post::PostMarker, user::UserMarker};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("The store could not be reached: {0}")]
    Unavailable(#[source] BoxError),
    #[error("A store constraint was violated: {0}")]
    Constraint(#[source] BoxError),
    #[error("The store returned invalid data: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Store operation failed: {0}")]
    Other(#[source] BoxError),
}

impl StoreError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
#[error("Uploading to the media host failed: {0}")]
pub struct MediaHostError(#[source] pub BoxError);

impl MediaHostError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("Post with id {0} was not found.")]
    NotFound(Id<PostMarker>),
    #[error("User {user} is not the author of post {post}.")]
    Forbidden {
        post: Id<PostMarker>,
        user: Id<UserMarker>,
    },
    #[error(transparent)]
    MediaHost(#[from] MediaHostError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
