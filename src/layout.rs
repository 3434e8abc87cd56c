use htmlescape::encode_minimal;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::config::Theme;
use crate::index::format_post_date;
use crate::models::{Heading, Post};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap();
}

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

// Missing targets leave the click as a no-op.
const TOC_SCRIPT: &str = r#"
<script>
    document.querySelectorAll("nav.toc a[href^='#']").forEach((link) => {
        link.addEventListener("click", (event) => {
            event.preventDefault();
            const target = document.getElementById(decodeURIComponent(link.hash.slice(1)));
            if (target) {
                const top = target.getBoundingClientRect().top + window.scrollY - 80;
                window.scrollTo({ top, behavior: "smooth" });
            }
        });
    });
</script>
"#;

/// Page shell pieces loaded from the content directory.
#[derive(Debug, Clone)]
pub struct Templates {
    pub layout: String,
    pub banner: String,
    pub not_found: String, // supports {{slug}} placeholder
}

/// Everything a page contributes to the shell.
pub struct Page<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub content: &'a str,
}

pub fn render_with_layout(
    templates: &Templates,
    page: &Page,
    posts: &[Post],
    theme: Theme,
    is_development: bool,
) -> String {
    let mut list_items = String::new();
    for post in posts {
        list_items.push_str(&format!(
            "<li><a href=\"/posts/{}\" class=\"text-blue no-underline\">{}</a></li>",
            encode_minimal(&post.slug),
            encode_minimal(&post.title)
        ));
    }

    // Single pass: substituted text is never scanned for placeholders again.
    let mut out = PLACEHOLDER
        .replace_all(&templates.layout, |caps: &Captures| match &caps[1] {
            "title" => encode_minimal(page.title),
            "description" => encode_minimal(page.description),
            "theme" => theme.html_class().to_string(),
            "banner" => templates.banner.clone(),
            "posts" => list_items.clone(),
            "content" => page.content.to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned();

    if is_development {
        out = out.replace("</body>", &format!("{}</body>", HOT_RELOAD_SCRIPT));
    }

    out
}

fn post_card(post: &Post) -> String {
    format!(
        concat!(
            "<article class=\"post-card\">",
            "<a href=\"/posts?slug={slug}\">",
            "<h2>{title}</h2>",
            "<time datetime=\"{date_attr}\">{date}</time>",
            "<p>{excerpt}</p>",
            "</a></article>"
        ),
        slug = encode_minimal(&post.slug),
        title = encode_minimal(&post.title),
        date_attr = encode_minimal(&post.date),
        date = encode_minimal(&format_post_date(&post.date)),
        excerpt = encode_minimal(&post.excerpt),
    )
}

pub fn render_home(site_title: &str, posts: &[Post]) -> String {
    let mut out = format!("<h1>{}</h1>", encode_minimal(site_title));
    if posts.is_empty() {
        out.push_str("<p class=\"empty\">No posts yet.</p>");
        return out;
    }
    out.push_str("<div class=\"post-grid\">");
    for post in posts {
        out.push_str(&post_card(post));
    }
    out.push_str("</div>");
    out
}

pub fn render_toc(headings: &[Heading]) -> String {
    if headings.is_empty() {
        return String::new();
    }
    let mut out = String::from("<nav class=\"toc\"><h2>Contents</h2><ul>");
    for heading in headings {
        out.push_str(&format!(
            "<li class=\"toc-level-{}\"><a href=\"#{}\">{}</a></li>",
            heading.level,
            encode_minimal(&heading.id),
            encode_minimal(&heading.text)
        ));
    }
    out.push_str("</ul></nav>");
    out.push_str(TOC_SCRIPT);
    out
}

pub fn render_post(post: &Post, body_html: &str, headings: &[Heading]) -> String {
    let date = encode_minimal(&format_post_date(&post.date));
    format!(
        concat!(
            "<div class=\"post-layout\">",
            "<aside class=\"post-sidebar\">",
            "<section class=\"post-info\"><h2>Post info</h2><p>Published: {date}</p></section>",
            "{toc}",
            "</aside>",
            "<article class=\"post\">",
            "<h1>{title}</h1>",
            "<time datetime=\"{date_attr}\">{date}</time>",
            "<div class=\"markdown-body\">{body}</div>",
            "</article>",
            "</div>"
        ),
        date = date,
        toc = render_toc(headings),
        title = encode_minimal(&post.title),
        date_attr = encode_minimal(&post.date),
        body = body_html,
    )
}

pub fn render_not_found(templates: &Templates, slug: &str) -> String {
    templates.not_found.replace("{{slug}}", &encode_minimal(slug))
}

pub fn render_error_panel() -> String {
    concat!(
        "<div class=\"error-panel\">",
        "<h1>Error Loading Post</h1>",
        "<p>Sorry, there was an error loading this post.</p>",
        "</div>"
    )
    .to_string()
}
