//! Engine-neutral element selectors.
//!
//! A [`Selector`] names a piece of UI the way a reviewer would describe it:
//! by visible text, by accessible role and name, or by a CSS query. Backends
//! translate selectors into whatever their engine understands; the matching
//! rules for text live here so that every backend agrees on them.
//!
//! # Text matching
//!
//! - **Exact** matches compare whitespace-normalised text for equality.
//! - **Loose** matches are case-insensitive substring matches over the
//!   normalised text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one or more elements in the application under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// The innermost element whose visible text matches.
    Text {
        /// Text to look for.
        text: String,
        /// Require whole-text equality instead of a substring match.
        #[serde(default)]
        exact: bool,
    },
    /// An element with the given ARIA role whose accessible name matches.
    Role {
        /// The role, e.g. `button`.
        role: String,
        /// Accessible name (loose match).
        name: String,
    },
    /// A CSS query, optionally narrowed by contained text and position.
    Css {
        /// CSS selector, e.g. `.tab-item` or `h1`.
        css: String,
        /// Only keep matches whose text contains this (loose match).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_text: Option<String>,
        /// Zero-based index into the visible matches.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nth: Option<usize>,
    },
}

impl Selector {
    /// Loose text selector.
    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text { text: text.into(), exact: false }
    }

    /// Exact text selector.
    pub fn exact_text(text: impl Into<String>) -> Self {
        Selector::Text { text: text.into(), exact: true }
    }

    /// A button with the given accessible name.
    pub fn button(name: impl Into<String>) -> Self {
        Selector::Role { role: "button".to_string(), name: name.into() }
    }

    /// Plain CSS selector.
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css { css: css.into(), has_text: None, nth: None }
    }

    /// CSS selector restricted to elements containing `text`.
    pub fn css_has_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::Css { css: css.into(), has_text: Some(text.into()), nth: None }
    }

    /// Narrows a CSS selector to its `index`th visible match.
    ///
    /// Text and role selectors already resolve to their first match, so
    /// they are returned unchanged.
    pub fn nth(self, index: usize) -> Self {
        match self {
            Selector::Css { css, has_text, .. } => Selector::Css { css, has_text, nth: Some(index) },
            other => other,
        }
    }

    /// The same selector without any positional narrowing.
    pub fn all(&self) -> Self {
        match self {
            Selector::Css { css, has_text, .. } => Selector::Css {
                css: css.clone(),
                has_text: has_text.clone(),
                nth: None,
            },
            other => other.clone(),
        }
    }

    /// Returns true if `candidate` satisfies this selector's text rule.
    ///
    /// CSS selectors without `has_text` accept any text.
    pub fn matches_text(&self, candidate: &str) -> bool {
        match self {
            Selector::Text { text, exact: true } => normalize(candidate) == normalize(text),
            Selector::Text { text, exact: false } => contains_loose(candidate, text),
            Selector::Role { name, .. } => contains_loose(candidate, name),
            Selector::Css { has_text: Some(text), .. } => contains_loose(candidate, text),
            Selector::Css { has_text: None, .. } => true,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Text { text, exact: true } => write!(f, "text=\"{}\"", text),
            Selector::Text { text, exact: false } => write!(f, "text={}", text),
            Selector::Role { role, name } => write!(f, "role={}[name=\"{}\"]", role, name),
            Selector::Css { css, has_text, nth } => {
                write!(f, "{}", css)?;
                if let Some(text) = has_text {
                    write!(f, ":has-text(\"{}\")", text)?;
                }
                if let Some(index) = nth {
                    write!(f, " >> nth={}", index)?;
                }
                Ok(())
            }
        }
    }
}

/// Collapses runs of whitespace and trims the ends.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_loose(haystack: &str, needle: &str) -> bool {
    normalize(haystack)
        .to_lowercase()
        .contains(&normalize(needle).to_lowercase())
}
