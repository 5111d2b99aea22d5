//! In-memory [`Store`] and [`MediaHost`] for tests. Transactions work on a private copy of the
//! state that replaces the shared state on commit.

use crate::{
    error::{MediaHostError, StoreError},
    media::{HostedMedia, MediaHost, MediaUpload},
    store::{Result, Store, Transaction},
};
use glimpse_common::model::{
    Id,
    comment::{Comment, CommentMarker, CreateComment},
    post::{Caption, CreatePost, Like, MediaKind, Post, PostMarker},
    user::{Email, User, UserMarker},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use time::OffsetDateTime;

#[derive(Clone, Default, Debug)]
struct MemoryState {
    users: BTreeMap<Id<UserMarker>, User>,
    posts: BTreeMap<Id<PostMarker>, Post>,
    comments: BTreeMap<Id<CommentMarker>, Comment>,
    likes: BTreeSet<Like>,
    next_id: u64,
}

impl MemoryState {
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.next_id += 1;
        Id::from(self.next_id)
    }
}

#[derive(Default, Debug)]
struct Inner {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
    user_fetches: AtomicUsize,
}

#[derive(Clone, Default, Debug)]
pub(crate) struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    fn state(&self) -> MemoryState {
        self.inner.state.lock().unwrap().clone()
    }

    pub(crate) fn add_user(&self, email: &str) -> Id<UserMarker> {
        let mut state = self.inner.state.lock().unwrap();
        let id = state.next_id();
        state.users.insert(
            id,
            User {
                id,
                email: Email::new(email.to_owned()).unwrap(),
            },
        );
        id
    }

    /// Inserts a post directly, bypassing the media host.
    pub(crate) fn seed_post(&self, author_id: Id<UserMarker>, created_at: OffsetDateTime) -> Post {
        let mut state = self.inner.state.lock().unwrap();
        let id = state.next_id();
        let post = Post {
            id,
            author_id,
            caption: None,
            media_url: format!("https://media.test/{id}.png"),
            media_kind: MediaKind::Image,
            media_file_name: format!("{id}.png"),
            created_at,
        };
        state.posts.insert(id, post.clone());
        post
    }

    pub(crate) fn post(&self, post_id: Id<PostMarker>) -> Option<Post> {
        self.state().posts.get(&post_id).cloned()
    }

    pub(crate) fn post_count(&self) -> usize {
        self.state().posts.len()
    }

    pub(crate) fn comments_on(&self, post_id: Id<PostMarker>) -> Vec<Comment> {
        self.state()
            .comments
            .into_values()
            .filter(|comment| comment.post_id == post_id)
            .collect()
    }

    pub(crate) fn likes_on(&self, post_id: Id<PostMarker>) -> Vec<Like> {
        self.state()
            .likes
            .into_iter()
            .filter(|like| like.post_id == post_id)
            .collect()
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn user_fetches(&self) -> usize {
        self.inner.user_fetches.load(Ordering::SeqCst)
    }

    fn transaction(&self, read_only: bool) -> MemoryTransaction {
        MemoryTransaction {
            store: self.clone(),
            working: self.state(),
            read_only,
        }
    }
}

impl Store for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        Ok(self.transaction(false))
    }

    async fn snapshot(&self) -> Result<MemoryTransaction> {
        Ok(self.transaction(true))
    }
}

#[derive(Debug)]
pub(crate) struct MemoryTransaction {
    store: MemoryStore,
    working: MemoryState,
    read_only: bool,
}

impl MemoryTransaction {
    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(StoreError::Other("write in read-only transaction".into()));
        }
        if self.store.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }

    fn check_references(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<()> {
        if !self.working.posts.contains_key(&post_id) {
            return Err(StoreError::Constraint(format!("no post {post_id}").into()));
        }
        if !self.working.users.contains_key(&user_id) {
            return Err(StoreError::Constraint(format!("no user {user_id}").into()));
        }
        Ok(())
    }
}

impl Transaction for MemoryTransaction {
    async fn fetch_posts(&mut self) -> Result<Vec<Post>> {
        // Deliberately oldest first: the caller must not rely on store ordering.
        Ok(self.working.posts.values().cloned().collect())
    }

    async fn fetch_post(&mut self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.working.posts.get(&post_id).cloned())
    }

    async fn fetch_users(&mut self, user_ids: &[Id<UserMarker>]) -> Result<Vec<User>> {
        self.store.inner.user_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(user_ids
            .iter()
            .filter_map(|id| self.working.users.get(id).cloned())
            .collect())
    }

    async fn fetch_comments(&mut self, post_ids: &[Id<PostMarker>]) -> Result<Vec<Comment>> {
        Ok(self
            .working
            .comments
            .values()
            .filter(|comment| post_ids.contains(&comment.post_id))
            .cloned()
            .collect())
    }

    async fn fetch_likes(&mut self, post_ids: &[Id<PostMarker>]) -> Result<Vec<Like>> {
        Ok(self
            .working
            .likes
            .iter()
            .filter(|like| post_ids.contains(&like.post_id))
            .copied()
            .collect())
    }

    async fn insert_post(&mut self, post: &CreatePost) -> Result<Post> {
        self.check_writable()?;
        if !self.working.users.contains_key(&post.author_id) {
            return Err(StoreError::Constraint(
                format!("no user {}", post.author_id).into(),
            ));
        }

        let id = self.working.next_id();
        let post = Post {
            id,
            author_id: post.author_id,
            caption: post.caption.clone(),
            media_url: post.media_url.clone(),
            media_kind: post.media_kind,
            media_file_name: post.media_file_name.clone(),
            created_at: post.created_at,
        };
        self.working.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn delete_post(&mut self, post_id: Id<PostMarker>) -> Result<()> {
        self.check_writable()?;
        self.working.posts.remove(&post_id);
        self.working
            .comments
            .retain(|_, comment| comment.post_id != post_id);
        self.working.likes.retain(|like| like.post_id != post_id);
        Ok(())
    }

    async fn update_caption(
        &mut self,
        post_id: Id<PostMarker>,
        caption: Option<&Caption>,
    ) -> Result<Post> {
        self.check_writable()?;
        let post = self
            .working
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| StoreError::Other(format!("no post {post_id}").into()))?;
        post.caption = caption.cloned();
        Ok(post.clone())
    }

    async fn insert_like(&mut self, like: Like) -> Result<()> {
        self.check_writable()?;
        self.check_references(like.post_id, like.user_id)?;
        self.working.likes.insert(like);
        Ok(())
    }

    async fn delete_like(&mut self, like: Like) -> Result<()> {
        self.check_writable()?;
        self.working.likes.remove(&like);
        Ok(())
    }

    async fn count_likes(&mut self, post_id: Id<PostMarker>) -> Result<u64> {
        Ok(self
            .working
            .likes
            .iter()
            .filter(|like| like.post_id == post_id)
            .count() as u64)
    }

    async fn insert_comment(&mut self, comment: &CreateComment) -> Result<Comment> {
        self.check_writable()?;
        self.check_references(comment.post_id, comment.author_id)?;

        let id = self.working.next_id();
        let comment = Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text.clone(),
            created_at: comment.created_at,
        };
        self.working.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn commit(self) -> Result<()> {
        if !self.read_only {
            *self.store.inner.state.lock().unwrap() = self.working;
        }
        Ok(())
    }
}

/// Records every upload and hands out predictable URLs, or fails every upload.
#[derive(Default, Debug)]
pub(crate) struct MemoryMediaHost {
    uploads: Mutex<Vec<MediaUpload>>,
    fail: bool,
}

impl MemoryMediaHost {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn uploads(&self) -> Vec<MediaUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

impl MediaHost for MemoryMediaHost {
    async fn upload(&self, upload: MediaUpload) -> Result<HostedMedia, MediaHostError> {
        if self.fail {
            return Err(MediaHostError::new("media host refused the upload"));
        }

        let mut uploads = self.uploads.lock().unwrap();
        let file_name = format!("{}_{}", uploads.len(), upload.file_name);
        uploads.push(upload);

        Ok(HostedMedia {
            url: format!("https://media.test/uploads/{file_name}"),
            file_name,
        })
    }
}
