use tracing::{error, info};

use crate::content_loader::{load_post, LoadedPost};
use crate::error::BlogError;
use crate::models::Post;
use crate::state::AppState;

/// Terminal state of one post page load.
#[derive(Debug)]
pub enum PostView {
    Loaded(Box<LoadedPost>),
    /// No slug was given; the caller goes back to the listing.
    Redirected,
    NotFound(String),
    Failed(BlogError),
}

/// Resolve in the fetched index, then content fetch, then render, one after
/// the other. Every failure ends in a fallback state.
pub async fn load_post_view(state: &AppState, posts: &[Post], slug: Option<&str>) -> PostView {
    let Some(slug) = slug.filter(|s| !s.is_empty()) else {
        return PostView::Redirected;
    };

    match load_post(state.source.as_ref(), posts, slug, state.render).await {
        Ok(loaded) => {
            info!(%slug, headings = loaded.headings.len(), "post rendered");
            PostView::Loaded(Box::new(loaded))
        }
        Err(BlogError::PostNotFound(_)) | Err(BlogError::ContentUnavailable { .. }) => {
            info!(%slug, "post unavailable");
            PostView::NotFound(slug.to_string())
        }
        Err(e) => {
            error!(%slug, "Error rendering post: {}", e);
            PostView::Failed(e)
        }
    }
}
