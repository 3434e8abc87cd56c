//! Markdown to HTML rendering.
//!
//! Raw HTML in the source is passed through untouched. Post bodies are written
//! by the blog author and treated as trusted; anything rendering untrusted
//! input through here must sanitize the output first.

use std::ops::Range;

use lazy_static::lazy_static;
use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::outline::heading_anchors;

lazy_static! {
    static ref BARE_URL: Regex = Regex::new(r#"https?://[^\s<>"'`]+"#).unwrap();
    static ref IMG_TAG: Regex = Regex::new(r"(?i)<img\b[^>]*>").unwrap();
    static ref ALT_ATTR: Regex = Regex::new(r"(?i)\salt\s*=").unwrap();
    static ref ANCHOR_OPEN: Regex = Regex::new(r"(?i)^<a(\s|>)").unwrap();
    static ref ANCHOR_CLOSE: Regex = Regex::new(r"(?i)^</a\s*>").unwrap();
}

pub(crate) fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_GFM);
    options.insert(Options::ENABLE_MATH);
    options
}

struct PendingImage<'a> {
    dest_url: CowStr<'a>,
    title: CowStr<'a>,
    alt: String,
    // images nested inside the alt text
    depth: usize,
}

pub fn render_markdown_to_html(markdown: &str) -> String {
    let normalized_markdown = normalize_latex_delimiters(markdown);
    let mut anchor_ids = heading_anchors(markdown).into_iter().map(|anchor| anchor.id);
    let mut events: Vec<Event> = Vec::new();
    let mut image: Option<PendingImage> = None;
    let mut link_depth = 0usize;
    let mut in_code_block = false;

    for event in Parser::new_ext(&normalized_markdown, markdown_options()) {
        if let Some(pending) = image.as_mut() {
            match event {
                Event::Text(text) | Event::Code(text) | Event::InlineMath(text) => pending.alt.push_str(&text),
                Event::SoftBreak | Event::HardBreak => pending.alt.push(' '),
                Event::Start(Tag::Image { .. }) => pending.depth += 1,
                Event::End(TagEnd::Image) if pending.depth > 0 => pending.depth -= 1,
                Event::End(TagEnd::Image) => {
                    let html = image_html(pending);
                    events.push(Event::Html(CowStr::from(html)));
                    image = None;
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::Heading { level, id: _, classes, attrs }) => {
                events.push(Event::Start(Tag::Heading {
                    level,
                    id: anchor_ids.next().map(CowStr::from),
                    classes,
                    attrs,
                }));
            }
            Event::Start(Tag::Image { dest_url, title, .. }) => {
                image = Some(PendingImage {
                    dest_url,
                    title,
                    alt: String::new(),
                    depth: 0,
                });
            }
            Event::Start(Tag::Link { .. }) => {
                link_depth += 1;
                events.push(event);
            }
            Event::End(TagEnd::Link) => {
                link_depth = link_depth.saturating_sub(1);
                events.push(event);
            }
            Event::Start(Tag::CodeBlock(_)) => {
                in_code_block = true;
                events.push(event);
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                events.push(event);
            }
            Event::Text(text) if link_depth == 0 && !in_code_block => linkify(text, &mut events),
            Event::Html(raw) => events.push(Event::Html(ensure_img_alt(raw))),
            Event::InlineHtml(raw) => {
                if ANCHOR_OPEN.is_match(&raw) {
                    link_depth += 1;
                } else if ANCHOR_CLOSE.is_match(&raw) {
                    link_depth = link_depth.saturating_sub(1);
                }
                events.push(Event::InlineHtml(ensure_img_alt(raw)));
            }
            Event::InlineMath(math) => events.push(Event::Html(CowStr::Boxed(render_math_html(&math, false).into_boxed_str()))),
            Event::DisplayMath(math) => events.push(Event::Html(CowStr::Boxed(render_math_html(&math, true).into_boxed_str()))),
            other => events.push(other),
        }
    }

    let mut html_out = String::new();
    html::push_html(&mut html_out, events.into_iter());
    html_out
}

fn image_html(image: &PendingImage) -> String {
    let mut out = format!(
        "<img src=\"{}\" alt=\"{}\"",
        htmlescape::encode_minimal(&image.dest_url),
        htmlescape::encode_minimal(&image.alt)
    );
    if !image.title.is_empty() {
        out.push_str(&format!(" title=\"{}\"", htmlescape::encode_minimal(&image.title)));
    }
    out.push_str(" />");
    out
}

/// Adds `alt=""` to raw `<img>` tags that have no alt attribute.
fn ensure_img_alt(raw: CowStr<'_>) -> CowStr<'_> {
    if !IMG_TAG.is_match(&raw) {
        return raw;
    }
    let patched = IMG_TAG.replace_all(&raw, |caps: &regex::Captures| {
        let tag = &caps[0];
        if ALT_ATTR.is_match(tag) {
            tag.to_string()
        } else {
            format!("{} alt=\"\"{}", &tag[..4], &tag[4..])
        }
    });
    CowStr::from(patched.into_owned())
}

fn linkify<'a>(text: CowStr<'a>, events: &mut Vec<Event<'a>>) {
    if !BARE_URL.is_match(&text) {
        events.push(Event::Text(text));
        return;
    }

    let mut last = 0;
    for m in BARE_URL.find_iter(&text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        let end = m.start() + url.len();
        if m.start() > last {
            events.push(Event::Text(CowStr::from(text[last..m.start()].to_string())));
        }
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(url.to_string()),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        events.push(Event::Text(CowStr::from(url.to_string())));
        events.push(Event::End(TagEnd::Link));
        last = end;
    }
    if last < text.len() {
        events.push(Event::Text(CowStr::from(text[last..].to_string())));
    }
}

/// Source ranges that must reach the parser byte for byte: code spans, code
/// blocks and raw HTML.
fn verbatim_ranges(input: &str) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for (event, range) in Parser::new_ext(input, markdown_options()).into_offset_iter() {
        let verbatim = matches!(
            event,
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) | Event::Html(_) | Event::InlineHtml(_)
        );
        if verbatim && ranges.last().map_or(true, |last| range.start >= last.end) {
            ranges.push(range);
        }
    }
    ranges
}

/// Rewrites `\(..\)` and `\[..\]` into the `$` forms the parser knows,
/// leaving code and raw HTML untouched.
fn normalize_latex_delimiters(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for range in verbatim_ranges(input) {
        normalize_segment(&input[last..range.start], &mut out);
        out.push_str(&input[range.clone()]);
        last = range.end;
    }
    normalize_segment(&input[last..], &mut out);
    out
}

fn normalize_segment(input: &str, out: &mut String) {
    let mut i = 0;

    while i < input.len() {
        if let Some((open, close, display_mode)) = delimiter_at(input, i) {
            let content_start = i + open.len();
            if let Some(close_at) = input[content_start..].find(close) {
                let content_end = content_start + close_at;
                // `$` next to whitespace does not open or close math
                let content = input[content_start..content_end].trim();
                if !content.is_empty() {
                    let fence = if display_mode || content.contains('\n') { "$$" } else { "$" };
                    out.push_str(fence);
                    out.push_str(content);
                    out.push_str(fence);
                    i = content_end + close.len();
                    continue;
                }
            }
        }

        if let Some(ch) = input[i..].chars().next() {
            out.push(ch);
            i += ch.len_utf8();
        } else {
            break;
        }
    }
}

fn delimiter_at(input: &str, index: usize) -> Option<(&'static str, &'static str, bool)> {
    let tail = &input[index..];
    if tail.starts_with("\\(") {
        Some(("\\(", "\\)", false))
    } else if tail.starts_with("\\[") {
        Some(("\\[", "\\]", true))
    } else {
        None
    }
}

fn render_math_html(source: &str, display_mode: bool) -> String {
    let mut opts = katex::Opts::builder();
    opts.display_mode(display_mode);

    let rendered = match opts.build() {
        Ok(opts) => katex::render_with_opts(source, opts),
        Err(_) => return fallback_math_html(source, display_mode),
    };

    match rendered {
        Ok(html) => html,
        Err(_) => fallback_math_html(source, display_mode),
    }
}

fn fallback_math_html(source: &str, display_mode: bool) -> String {
    let class_name = if display_mode { "math math-display" } else { "math math-inline" };
    format!("<span class=\"{class_name}\">{}</span>", htmlescape::encode_minimal(source))
}
