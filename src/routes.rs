use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, get_service},
    Router,
};
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::hot_reload::ws_handler;
use crate::layout::{render_error_panel, render_home, render_not_found, render_post, render_with_layout, Page};
use crate::models::Post;
use crate::state::{AppState, RouterState};
use crate::view::{load_post_view, PostView};

pub fn build_router(router_state: RouterState, content_dir: &FsPath) -> Router {
    let static_dir = get_service(ServeDir::new(content_dir.join("static")));

    Router::new()
        .route("/", get(homepage))
        .route("/posts", get(post_by_query))
        .route("/posts/{slug}", get(post_by_path))
        .nest_service("/static", static_dir)
        .route("/ws", get(ws_handler))
        .with_state(router_state)
}

async fn render_page(state: &AppState, posts: &[Post], title: &str, description: &str, content: &str) -> String {
    let templates = state.templates.read().await;
    let page = Page {
        title,
        description,
        content,
    };
    render_with_layout(&templates, &page, posts, state.config.theme, state.is_development())
}

async fn homepage(State(state): State<Arc<AppState>>) -> Html<String> {
    let posts = state.index.posts(state.source.as_ref()).await;
    let content = render_home(&state.config.site_title, &posts);
    let title = &state.config.site_title;
    Html(render_page(&state, &posts, title, title, &content).await)
}

async fn loaded_page(state: &AppState, posts: &[Post], view: PostView) -> Result<Html<String>, PostView> {
    match view {
        PostView::Loaded(loaded) => {
            let content = render_post(&loaded.post, &loaded.html, &loaded.headings);
            Ok(Html(render_page(state, posts, &loaded.post.title, &loaded.post.excerpt, &content).await))
        }
        other => Err(other),
    }
}

async fn error_page(state: &AppState, posts: &[Post]) -> Response {
    let body = render_page(
        state,
        posts,
        "Error",
        "An error occurred while loading the post.",
        &render_error_panel(),
    )
    .await;
    (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
}

/// `/posts/{slug}`: unknown posts get the not-found page.
async fn post_by_path(Path(slug): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let posts = state.index.posts(state.source.as_ref()).await;
    let view = load_post_view(&state, &posts, Some(&slug)).await;
    match loaded_page(&state, &posts, view).await {
        Ok(page) => page.into_response(),
        Err(PostView::Failed(_)) => error_page(&state, &posts).await,
        Err(_) => {
            let body = {
                let templates = state.templates.read().await;
                render_not_found(&templates, &slug)
            };
            let page = render_page(
                &state,
                &posts,
                "Post Not Found",
                "The requested post could not be found.",
                &body,
            )
            .await;
            (StatusCode::NOT_FOUND, Html(page)).into_response()
        }
    }
}

#[derive(Deserialize)]
struct PostQuery {
    slug: Option<String>,
}

/// `/posts?slug=`: a missing slug or an unknown post goes back to the listing.
async fn post_by_query(Query(query): Query<PostQuery>, State(state): State<Arc<AppState>>) -> Response {
    let posts = state.index.posts(state.source.as_ref()).await;
    let view = load_post_view(&state, &posts, query.slug.as_deref()).await;
    match loaded_page(&state, &posts, view).await {
        Ok(page) => page.into_response(),
        Err(PostView::Failed(_)) => error_page(&state, &posts).await,
        Err(_) => Redirect::to("/").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, Theme};
    use crate::layout::Templates;
    use crate::models::Heading;
    use crate::source::testing::MemorySource;

    const INDEX: &str = r#"[
        {"slug": "hello", "title": "Hello", "date": "2024-01-01", "excerpt": "first post"},
        {"slug": "world", "title": "World", "date": "2024-06-01", "excerpt": "second post"},
        {"slug": "ghost", "title": "Ghost", "date": "2023-01-01", "excerpt": "no body"}
    ]"#;

    fn app_state() -> AppState {
        let config = Config {
            theme: Theme::Dark,
            ..Config::default()
        };
        let templates = Templates {
            layout: "<html class=\"{{ theme }}\"><head><title>{{ title }}</title></head><body><ul>{{ posts }}</ul>{{ content }}</body></html>".to_string(),
            banner: String::new(),
            not_found: "<p>Nothing at {{slug}}</p>".to_string(),
        };
        let source = MemorySource::new(INDEX)
            .with_post("hello", "# Hello\n\n## Details\n\nSome text.\n")
            .with_post("world", "Just text.\n");
        AppState::new(Arc::new(config), templates, Arc::new(source))
    }

    fn router_for(app_state: AppState) -> Router {
        let (broadcaster, _rx) = broadcast::channel(1);
        build_router(
            RouterState {
                app_state: Arc::new(app_state),
                broadcaster,
            },
            FsPath::new("content"),
        )
    }

    async fn send(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn request(uri: &str) -> Response {
        send(router_for(app_state()), uri).await
    }

    fn crashing_render(_: &str) -> (String, Vec<Heading>) {
        panic!("renderer crashed")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> Option<&str> {
        response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn homepage_lists_posts_newest_first() {
        let response = request("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<html class=\"dark\">"));
        let world = body.find("/posts?slug=world").unwrap();
        let hello = body.find("/posts?slug=hello").unwrap();
        assert!(world < hello);
    }

    #[tokio::test]
    async fn path_route_renders_post_with_toc() {
        let response = request("/posts/hello").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<title>Hello</title>"));
        assert!(body.contains("<h2 id=\"details\">"));
        assert!(body.contains("<a href=\"#details\">Details</a>"));
    }

    #[tokio::test]
    async fn path_route_unknown_post_is_not_found_page() {
        let response = request("/posts/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_text(response).await;
        assert!(body.contains("<p>Nothing at missing</p>"));
        assert!(body.contains("<title>Post Not Found</title>"));
    }

    #[tokio::test]
    async fn path_route_missing_body_is_not_found_page() {
        let response = request("/posts/ghost").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn query_route_renders_post() {
        let response = request("/posts?slug=world").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<p>Just text.</p>"));
    }

    #[tokio::test]
    async fn query_route_redirects_when_unavailable() {
        for uri in ["/posts", "/posts?slug=", "/posts?slug=missing", "/posts?slug=ghost"] {
            let response = request(uri).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
            assert_eq!(location(&response), Some("/"), "{}", uri);
        }
    }

    #[tokio::test]
    async fn render_failure_is_error_page_on_both_routes() {
        for uri in ["/posts/hello", "/posts?slug=hello"] {
            let mut state = app_state();
            state.render = crashing_render;
            let response = send(router_for(state), uri).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            let body = body_text(response).await;
            assert!(body.contains("<title>Error</title>"), "{}", uri);
            assert!(body.contains("Error Loading Post"), "{}", uri);
        }
    }
}
