use std::cmp::Ordering;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::BlogError;
use crate::models::Post;
use crate::source::ContentSource;

/// Parses an index date, accepting `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_post_date(date: &str) -> Option<NaiveDate> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(date).ok().map(|dt| dt.date_naive()))
}

/// Display form of an index date; unparseable dates are shown as written.
pub fn format_post_date(date: &str) -> String {
    match parse_post_date(date) {
        Some(parsed) => parsed.format("%B %-d, %Y").to_string(),
        None => date.to_string(),
    }
}

/// Newest first. Posts with unparseable dates go last; ties keep index order.
pub fn sort_by_date_desc(posts: &mut [Post]) {
    posts.sort_by(|a, b| match (parse_post_date(&a.date), parse_post_date(&b.date)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

pub fn parse_index(document: &str) -> Result<Vec<Post>, BlogError> {
    serde_json::from_str::<Vec<Post>>(document).map_err(|e| BlogError::IndexUnavailable(e.to_string()))
}

/// Fetches and parses the index, sorted newest first.
pub async fn try_fetch_index(source: &dyn ContentSource) -> Result<Vec<Post>, BlogError> {
    let document = source
        .fetch_index_document()
        .await
        .map_err(|e| BlogError::IndexUnavailable(e.to_string()))?;
    let mut posts = parse_index(&document)?;
    sort_by_date_desc(&mut posts);
    Ok(posts)
}

/// Fetches the index, degrading to an empty list on any failure.
pub async fn fetch_index(source: &dyn ContentSource) -> Vec<Post> {
    match try_fetch_index(source).await {
        Ok(posts) => posts,
        Err(e) => {
            error!(source = %source.describe(), "Error fetching posts: {}", e);
            Vec::new()
        }
    }
}

/// First post whose slug matches exactly.
pub fn resolve_post<'a>(posts: &'a [Post], slug: &str) -> Option<&'a Post> {
    posts.iter().find(|post| post.slug == slug)
}

struct CachedIndex {
    fetched_at: Instant,
    posts: Vec<Post>,
}

/// Keeps the last good index for a revalidation window. With no window every
/// call goes to the source.
pub struct IndexCache {
    ttl: Option<Duration>,
    entry: RwLock<Option<CachedIndex>>,
}

impl IndexCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub async fn posts(&self, source: &dyn ContentSource) -> Vec<Post> {
        let Some(ttl) = self.ttl else {
            return fetch_index(source).await;
        };

        if let Some(cached) = self.entry.read().await.as_ref() {
            if cached.fetched_at.elapsed() < ttl {
                debug!(count = cached.posts.len(), "serving cached index");
                return cached.posts.clone();
            }
        }

        match try_fetch_index(source).await {
            Ok(posts) => {
                info!(count = posts.len(), source = %source.describe(), "index revalidated");
                *self.entry.write().await = Some(CachedIndex {
                    fetched_at: Instant::now(),
                    posts: posts.clone(),
                });
                posts
            }
            Err(e) => {
                error!(source = %source.describe(), "Error fetching posts: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}
