use serde::Deserialize;

/// One entry of `index.json`. `content` is never read from the index; it is
/// filled in after the body has been fetched.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(skip)]
    pub content: Option<String>,
}

/// A table of contents entry derived from the Markdown source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub id: String,
}
