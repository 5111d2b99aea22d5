use crate::error::StoreError;
use glimpse_common::model::{
    Id,
    comment::{Comment, CreateComment},
    post::{Caption, CreatePost, Like, Post, PostMarker},
    user::{User, UserMarker},
};

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Handle to the persistence store. Cheap to share; every unit of work happens inside a
/// [`Transaction`].
pub trait Store: Send + Sync {
    type Transaction: Transaction;

    /// A read-write transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;

    /// A read-only transaction in which every read sees the same snapshot.
    fn snapshot(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// One atomic unit of work. Nothing becomes visible to other transactions until
/// [`Transaction::commit`]; dropping an uncommitted transaction rolls it back.
pub trait Transaction: Send {
    /// All posts, newest first. Posts sharing a `created_at` are ordered by id, descending.
    fn fetch_posts(&mut self) -> impl Future<Output = Result<Vec<Post>>> + Send;

    fn fetch_post(
        &mut self,
        post_id: Id<PostMarker>,
    ) -> impl Future<Output = Result<Option<Post>>> + Send;

    /// Users for the given ids. Unknown ids are skipped.
    fn fetch_users(
        &mut self,
        user_ids: &[Id<UserMarker>],
    ) -> impl Future<Output = Result<Vec<User>>> + Send;

    /// Comments on any of the given posts, oldest first.
    fn fetch_comments(
        &mut self,
        post_ids: &[Id<PostMarker>],
    ) -> impl Future<Output = Result<Vec<Comment>>> + Send;

    fn fetch_likes(
        &mut self,
        post_ids: &[Id<PostMarker>],
    ) -> impl Future<Output = Result<Vec<Like>>> + Send;

    fn insert_post(&mut self, post: &CreatePost) -> impl Future<Output = Result<Post>> + Send;

    /// Deletes the post together with its comments and likes.
    fn delete_post(&mut self, post_id: Id<PostMarker>) -> impl Future<Output = Result<()>> + Send;

    fn update_caption(
        &mut self,
        post_id: Id<PostMarker>,
        caption: Option<&Caption>,
    ) -> impl Future<Output = Result<Post>> + Send;

    /// Adds the like unless it already exists. Concurrent identical inserts must neither
    /// duplicate the row nor fail.
    fn insert_like(&mut self, like: Like) -> impl Future<Output = Result<()>> + Send;

    /// Removes the like if present.
    fn delete_like(&mut self, like: Like) -> impl Future<Output = Result<()>> + Send;

    fn count_likes(&mut self, post_id: Id<PostMarker>) -> impl Future<Output = Result<u64>> + Send;

    fn insert_comment(
        &mut self,
        comment: &CreateComment,
    ) -> impl Future<Output = Result<Comment>> + Send;

    fn commit(self) -> impl Future<Output = Result<()>> + Send;
}
