use lazy_static::lazy_static;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;

use crate::anchor::Slugger;
use crate::markdown::markdown_options;
use crate::models::Heading;

/// Deepest heading level listed in the table of contents.
pub const MAX_OUTLINE_LEVEL: u8 = 3;

lazy_static! {
    static ref ATX_HEADING: Regex = Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.+)$").unwrap();
    static ref CLOSING_SEQUENCE: Regex = Regex::new(r"(^|[ \t]+)#+[ \t]*$").unwrap();
}

/// Parses one source line as an ATX heading, returning its level and text
/// with any closing `#` sequence removed.
fn atx_heading(line: &str) -> Option<(u8, &str)> {
    let caps = ATX_HEADING.captures(line.trim_end_matches(['\r', '\n']))?;
    let level = caps.get(1)?.as_str().len() as u8;
    let raw = caps.get(2)?.as_str();
    let text = match CLOSING_SEQUENCE.find(raw) {
        Some(m) => &raw[..m.start()],
        None => raw,
    }
    .trim();

    if text.is_empty() {
        None
    } else {
        Some((level, text))
    }
}

/// Splits the line holding `offset` into the part before `offset` and the
/// whole line.
fn line_around(markdown: &str, offset: usize) -> (&str, &str) {
    let start = markdown[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = markdown[offset..].find('\n').map_or(markdown.len(), |i| offset + i);
    (&markdown[start..offset], &markdown[start..end])
}

/// One heading of the rendered document and its anchor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub level: u8,
    pub text: String,
    pub id: String,
    /// Written on its own `#` line, so the outline lists it.
    pub listed: bool,
}

/// Anchor ids for every heading the Markdown parser produces, in document
/// order. This is the only place ids are handed out; the renderer and the
/// outline both read from it.
///
/// Headings written as a bare `#` line take their ids first, in order, so
/// the outline never depends on headings it does not list. Setext headings
/// and headings nested in lists or quotes are slugged afterwards from the
/// same [`Slugger`] and can only take ids that are still free.
pub fn heading_anchors(markdown: &str) -> Vec<Anchor> {
    let mut found: Vec<(u8, String, bool)> = Vec::new();
    let mut current: Option<(u8, usize, String)> = None;

    for (event, range) in Parser::new_ext(markdown, markdown_options()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => current = Some((level as u8, range.start, String::new())),
            Event::End(TagEnd::Heading(_)) => {
                let Some((level, start, text)) = current.take() else {
                    continue;
                };
                let (prefix, line) = line_around(markdown, start);
                let atx = if prefix.trim().is_empty() { atx_heading(line) } else { None };
                match atx {
                    Some((level, raw)) => found.push((level, raw.to_string(), true)),
                    None => found.push((level, text.trim().to_string(), false)),
                }
            }
            Event::Text(text) | Event::Code(text) | Event::InlineMath(text) | Event::DisplayMath(text) => {
                if let Some((_, _, buf)) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, _, buf)) = current.as_mut() {
                    buf.push(' ');
                }
            }
            _ => {}
        }
    }

    let mut slugger = Slugger::new();
    let mut ids: Vec<Option<String>> = found
        .iter()
        .map(|(_, text, listed)| listed.then(|| slugger.slugify(text)))
        .collect();
    for ((_, text, _), id) in found.iter().zip(ids.iter_mut()) {
        if id.is_none() {
            *id = Some(slugger.slugify(text));
        }
    }

    found
        .into_iter()
        .zip(ids)
        .map(|((level, text, listed), id)| Anchor {
            level,
            text,
            id: id.unwrap_or_default(),
            listed,
        })
        .collect()
}

/// Scans the Markdown source for ATX headings and returns the outline
/// entries of level one to three in document order.
///
/// Deeper headings still use up slugs, so ids agree with the rendered body
/// even when deeper headings or duplicate texts are present. `#` lines the
/// parser does not treat as headings (fenced code, raw HTML blocks) are
/// skipped.
pub fn extract_headings(markdown: &str) -> Vec<Heading> {
    heading_anchors(markdown)
        .into_iter()
        .filter(|anchor| anchor.listed && anchor.level <= MAX_OUTLINE_LEVEL)
        .map(|anchor| Heading {
            level: anchor.level,
            text: anchor.text,
            id: anchor.id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels_and_texts(headings: &[Heading]) -> (Vec<u8>, Vec<&str>) {
        (
            headings.iter().map(|h| h.level).collect(),
            headings.iter().map(|h| h.text.as_str()).collect(),
        )
    }

    fn ids(headings: &[Heading]) -> Vec<&str> {
        headings.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn extracts_headings_in_document_order() {
        let headings = extract_headings("# A\n## B\n### C\ntext\n## D");
        let (levels, texts) = levels_and_texts(&headings);
        assert_eq!(levels, vec![1, 2, 3, 2]);
        assert_eq!(texts, vec!["A", "B", "C", "D"]);
        assert_eq!(headings[0].id, "a");
    }

    #[test]
    fn ignores_deeper_levels_and_hashes_without_space() {
        let headings = extract_headings("#### Deep\n#tag\n##\n## Kept");
        let (levels, texts) = levels_and_texts(&headings);
        assert_eq!(levels, vec![2]);
        assert_eq!(texts, vec!["Kept"]);
    }

    #[test]
    fn strips_closing_sequence() {
        let headings = extract_headings("## Closed ##\n# C# language");
        assert_eq!(headings[0].text, "Closed");
        assert_eq!(headings[1].text, "C# language");
    }

    #[test]
    fn skips_fenced_code_blocks() {
        let source = "# Real\n```sh\n# not a heading\n```\n~~~\n## nor this\n~~~\n## After";
        let headings = extract_headings(source);
        let (_, texts) = levels_and_texts(&headings);
        assert_eq!(texts, vec!["Real", "After"]);
    }

    #[test]
    fn longer_fence_is_not_closed_by_shorter_one() {
        let source = "````\n```\n# inside\n````\n# outside";
        let headings = extract_headings(source);
        let (_, texts) = levels_and_texts(&headings);
        assert_eq!(texts, vec!["outside"]);
    }

    #[test]
    fn duplicate_headings_get_suffixed_ids() {
        let headings = extract_headings("## Setup\n#### Setup\n## Setup");
        assert_eq!(ids(&headings), vec!["setup", "setup-2"]);
    }

    #[test]
    fn handles_crlf_sources() {
        let headings = extract_headings("# One\r\n## Two\r\n");
        let (_, texts) = levels_and_texts(&headings);
        assert_eq!(texts, vec!["One", "Two"]);
    }

    #[test]
    fn hash_lines_inside_html_blocks_are_not_headings() {
        let headings = extract_headings("<div>\n# Hidden\n</div>\n\n# Hidden\n");
        assert_eq!(ids(&headings), vec!["hidden"]);
    }

    #[test]
    fn nested_headings_do_not_shift_listed_ids() {
        let anchors = heading_anchors("- # Setup\n\n## Setup\n\n> # Setup\n");
        let summary: Vec<(&str, bool)> = anchors.iter().map(|a| (a.id.as_str(), a.listed)).collect();
        assert_eq!(summary, vec![("setup-1", false), ("setup", true), ("setup-2", false)]);
        assert_eq!(ids(&extract_headings("- # Setup\n\n## Setup\n")), vec!["setup"]);
    }

    #[test]
    fn setext_headings_get_anchors_outside_the_outline() {
        let anchors = heading_anchors("Title\n=====\n\n# Title\n");
        assert_eq!(anchors[0].id, "title-1");
        assert!(!anchors[0].listed);
        assert_eq!(anchors[1].id, "title");
        assert_eq!(extract_headings("Title\n=====\n\n# Title\n").len(), 1);
    }
}
