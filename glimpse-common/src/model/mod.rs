pub mod auth;
pub mod comment;
pub mod feed;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::InvalidAuthTokenHashError,
        comment::InvalidCommentTextError,
        post::{InvalidCaptionError, UnknownMediaKindError},
        user::InvalidEmailError,
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    Caption(#[from] InvalidCaptionError),
    #[error(transparent)]
    CommentText(#[from] InvalidCommentTextError),
    #[error(transparent)]
    MediaKind(#[from] UnknownMediaKindError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GlimpseEpoch;
impl Epoch for GlimpseEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type GlimpseSnowflake = Snowflake<GlimpseEpoch>;
pub type GlimpseSnowflakeGenerator = SnowflakeGenerator<GlimpseEpoch>;

/// A snowflake tagged with the kind of object it identifies.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(GlimpseSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: GlimpseSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> GlimpseSnowflake {
        self.0
    }

    /// The representation used for `BIGINT` columns.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<GlimpseSnowflake> for Id<Marker> {
    fn from(value: GlimpseSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for GlimpseSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(GlimpseSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker};

    #[test]
    fn db_representation_round_trips_high_bit() {
        let id = Id::<PostMarker>::from(u64::MAX - 7);

        assert_eq!(id.to_db(), -8);
        assert_eq!(Id::<PostMarker>::from_db(id.to_db()), id);
    }

    #[test]
    fn serializes_as_plain_number() {
        let id = Id::<PostMarker>::from(42);

        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("42").unwrap(), id);
    }

    // Any marker, not just the ones that happen to be `Copy`.
    fn to_db_all<Marker>(ids: &[Id<Marker>]) -> Vec<i64> {
        ids.iter().map(|id| id.to_db()).collect()
    }

    #[test]
    fn ids_copy_regardless_of_marker() {
        struct OpaqueMarker;

        let ids = [Id::<OpaqueMarker>::from(1), Id::from(2)];
        let first = ids[0];

        assert_eq!(to_db_all(&ids), [1, 2]);
        assert_eq!(first, ids[0]);
        assert!(ids[0] < ids[1]);
    }
}
