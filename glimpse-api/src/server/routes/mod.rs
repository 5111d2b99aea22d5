use crate::server::ServerRouter;

mod auth;
mod feed;
mod posts;
mod users;

pub fn routes(max_upload_bytes: usize) -> ServerRouter {
    ServerRouter::new()
        .merge(auth::routes())
        .merge(feed::routes())
        .merge(posts::routes(max_upload_bytes))
        .merge(users::routes())
}
