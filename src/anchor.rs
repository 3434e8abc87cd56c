use std::collections::HashSet;

const FALLBACK_SLUG: &str = "section";

/// Anchor id for a piece of heading text. Lowercases, transliterates and
/// collapses every run of non-alphanumerics into a single `-`.
pub fn slugify(text: &str) -> String {
    let slug = ::slug::slugify(text);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Hands out unique anchor ids within one document. The first occurrence of a
/// text keeps the plain slug, later ones get `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct Slugger {
    generated_slugs: HashSet<String>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slugify(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut slug = base.clone();
        let mut counter = 1;
        while self.generated_slugs.contains(&slug) {
            slug = format!("{}-{}", base, counter);
            counter += 1;
        }
        self.generated_slugs.insert(slug.clone());
        slug
    }
}
