use std::path::Path;

use tokio::fs;
use tracing::{error, info, warn};

use crate::error::BlogError;
use crate::index::resolve_post;
use crate::layout::Templates;
use crate::markdown::render_markdown_to_html;
use crate::models::{Heading, Post};
use crate::outline::extract_headings;
use crate::source::ContentSource;
use crate::state::AppState;

pub async fn load_templates(content_dir: &Path) -> Result<Templates, std::io::Error> {
    let layout = fs::read_to_string(content_dir.join("layout.html")).await?;
    let banner = fs::read_to_string(content_dir.join("banner.html")).await?;
    let not_found = fs::read_to_string(content_dir.join("not_found.html")).await?;
    Ok(Templates {
        layout,
        banner,
        not_found,
    })
}

pub async fn reload_content(app_state: &AppState) {
    info!("Reloading application content...");
    match load_templates(&app_state.config.content_dir).await {
        Ok(templates) => {
            *app_state.templates.write().await = templates;
            info!("Content successfully reloaded.");
        }
        Err(e) => {
            error!("Failed to reload content: {}", e);
        }
    }
    app_state.index.invalidate().await;
}

/// Raw Markdown body of `slug`. Missing documents and transport failures both
/// come back as [`BlogError::ContentUnavailable`].
pub async fn fetch_post_content(source: &dyn ContentSource, slug: &str) -> Result<String, BlogError> {
    source.fetch_post_document(slug).await.map_err(|e| {
        warn!(%slug, "Failed to fetch post content: {}", e);
        BlogError::ContentUnavailable {
            slug: slug.to_string(),
            source: e,
        }
    })
}

/// Turns a Markdown body into HTML and its outline.
pub type RenderFn = fn(&str) -> (String, Vec<Heading>);

pub fn render_body(markdown: &str) -> (String, Vec<Heading>) {
    (render_markdown_to_html(markdown), extract_headings(markdown))
}

/// A post with its body fetched and rendered.
#[derive(Debug, Clone)]
pub struct LoadedPost {
    pub post: Post,
    pub html: String,
    pub headings: Vec<Heading>,
}

/// Resolves `slug` in an already fetched index, fetches its body and renders
/// it with `render`. Rendering runs on the blocking pool; a render that panics
/// is reported as [`BlogError::RenderFailure`].
pub async fn load_post(
    source: &dyn ContentSource,
    posts: &[Post],
    slug: &str,
    render: RenderFn,
) -> Result<LoadedPost, BlogError> {
    let mut post = resolve_post(posts, slug)
        .cloned()
        .ok_or_else(|| BlogError::PostNotFound(slug.to_string()))?;

    let markdown = fetch_post_content(source, slug).await?;
    let body = markdown.clone();
    let (html, headings) = tokio::task::spawn_blocking(move || render(&body))
        .await
        .map_err(|e| BlogError::RenderFailure {
            slug: slug.to_string(),
            reason: e.to_string(),
        })?;

    post.content = Some(markdown);
    Ok(LoadedPost { post, html, headings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::index::parse_index;
    use crate::source::testing::MemorySource;

    const INDEX: &str = r#"[
        {"slug": "hello", "title": "Hello", "date": "2024-01-01", "excerpt": "first"},
        {"slug": "ghost", "title": "Ghost", "date": "2024-02-01", "excerpt": "no body"}
    ]"#;

    fn source() -> MemorySource {
        MemorySource::new(INDEX).with_post("hello", "# Hello\n\n## Part one\n\n![](/a.png)\n")
    }

    #[tokio::test]
    async fn loads_and_renders_a_post() {
        let posts = parse_index(INDEX).unwrap();
        let loaded = load_post(&source(), &posts, "hello", render_body).await.unwrap();

        assert_eq!(loaded.post.title, "Hello");
        assert_eq!(loaded.post.content.as_deref(), Some("# Hello\n\n## Part one\n\n![](/a.png)\n"));
        assert!(loaded.html.contains("<h2 id=\"part-one\">"));
        assert!(loaded.html.contains("alt=\"\""));
        let ids: Vec<&str> = loaded.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["hello", "part-one"]);
    }

    #[tokio::test]
    async fn slug_absent_from_index_is_not_found() {
        let posts = parse_index(INDEX).unwrap();
        let result = load_post(&source(), &posts, "nope", render_body).await;
        assert!(matches!(result, Err(BlogError::PostNotFound(slug)) if slug == "nope"));
    }

    #[tokio::test]
    async fn missing_body_is_content_unavailable() {
        let posts = parse_index(INDEX).unwrap();
        let result = load_post(&source(), &posts, "ghost", render_body).await;
        assert!(matches!(
            result,
            Err(BlogError::ContentUnavailable { source: SourceError::NotFound(_), .. })
        ));
    }

    fn crashing_render(_: &str) -> (String, Vec<Heading>) {
        panic!("renderer crashed")
    }

    #[tokio::test]
    async fn render_panic_is_render_failure() {
        let posts = parse_index(INDEX).unwrap();
        let result = load_post(&source(), &posts, "hello", crashing_render).await;
        assert!(matches!(result, Err(BlogError::RenderFailure { slug, .. }) if slug == "hello"));
    }

    #[tokio::test]
    async fn templates_load_from_content_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("layout.html"), "{{ content }}").unwrap();
        std::fs::write(dir.path().join("banner.html"), "banner").unwrap();
        std::fs::write(dir.path().join("not_found.html"), "{{slug}}").unwrap();

        let templates = load_templates(dir.path()).await.unwrap();
        assert_eq!(templates.layout, "{{ content }}");
        assert_eq!(templates.banner, "banner");

        std::fs::remove_file(dir.path().join("banner.html")).unwrap();
        assert!(load_templates(dir.path()).await.is_err());
    }
}
