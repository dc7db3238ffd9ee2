//! Locator maps: logical element names bound to third-party selectors.
//!
//! The widget's markup is obfuscated and owned by someone else, so every
//! selector lives in exactly one table per page. Page objects only ever talk
//! in logical names; the table is the one place to patch when the markup
//! drifts.

use std::collections::BTreeMap;
use std::fmt;

use crate::result::{ProbeError, ProbeResult};

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector (e.g., "div[jsname='N10B9']")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Leaf element whose text contains the given string
    Text(String),
    /// ARIA role with accessible name (e.g. button "Accept all")
    Role {
        /// ARIA role
        role: String,
        /// Accessible name, matched exactly after trimming
        name: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    /// JavaScript expression evaluating to the first matching element (or null)
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelector({})", js_literal(s)),
            Self::XPath(s) => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_literal(s)
            ),
            Self::Text(_) | Self::Role { .. } => {
                format!("({}).find(() => true) || null", self.to_all_query())
            }
        }
    }

    /// JavaScript expression evaluating to the number of matching elements
    #[must_use]
    pub fn to_count_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelectorAll({}).length", js_literal(s)),
            Self::XPath(s) => format!(
                "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
                js_literal(s)
            ),
            Self::Text(_) | Self::Role { .. } => format!("({}).length", self.to_all_query()),
        }
    }

    /// Array of candidate elements for the text and role selectors
    fn to_all_query(&self) -> String {
        match self {
            Self::Text(t) => format!(
                "Array.from(document.querySelectorAll('body *')).filter(el => el.children.length === 0 && el.textContent.includes({}))",
                js_literal(t)
            ),
            Self::Role { role, name } => {
                let candidates = if role == "button" {
                    "button, [role='button'], input[type='button'], input[type='submit']"
                        .to_string()
                } else {
                    format!("[role='{role}']")
                };
                format!(
                    "Array.from(document.querySelectorAll({})).filter(el => ((el.getAttribute('aria-label') || el.innerText || el.value || '').trim()) === {})",
                    js_literal(&candidates),
                    js_literal(name)
                )
            }
            Self::Css(s) => format!("Array.from(document.querySelectorAll({}))", js_literal(s)),
            Self::XPath(_) => format!("[{}].filter(Boolean)", self.to_query()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "{s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Text(t) => write!(f, "text={t}"),
            Self::Role { role, name } => write!(f, "role={role}[name={name:?}]"),
        }
    }
}

/// Quote a string as a JavaScript string literal
fn js_literal(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Immutable table of logical element name → selector for one page
#[derive(Debug, Clone)]
pub struct LocatorMap {
    name: String,
    entries: BTreeMap<String, Selector>,
}

impl LocatorMap {
    /// Build a map from `(logical name, selector)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Config`] if a logical name appears twice.
    pub fn from_entries<I, K>(name: impl Into<String>, entries: I) -> ProbeResult<Self>
    where
        I: IntoIterator<Item = (K, Selector)>,
        K: Into<String>,
    {
        let name = name.into();
        let mut map = BTreeMap::new();
        for (key, selector) in entries {
            let key = key.into();
            if map.insert(key.clone(), selector).is_some() {
                return Err(ProbeError::Config {
                    message: format!("duplicate locator '{key}' in '{name}'"),
                });
            }
        }
        Ok(Self { name, entries: map })
    }

    /// Resolve a logical name to its selector.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::UnknownElement`] if `name` is not in the map.
    pub fn resolve(&self, name: &str) -> ProbeResult<&Selector> {
        self.entries
            .get(name)
            .ok_or_else(|| ProbeError::UnknownElement {
                map: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Whether the map has an entry for `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Map name (the page it describes)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// All entries in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selector)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> LocatorMap {
        LocatorMap::from_entries(
            "sample",
            [
                ("one", Selector::css("div[jsname='N10B9']")),
                ("accept", Selector::role("button", "Accept all")),
            ],
        )
        .unwrap()
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_css_query_is_quoted() {
            let q = Selector::css("div[jsname='N10B9']").to_query();
            assert_eq!(q, r#"document.querySelector("div[jsname='N10B9']")"#);
        }

        #[test]
        fn test_xpath_count_query() {
            let q = Selector::xpath("//iframe[contains(@src, 'recaptcha')]").to_count_query();
            assert!(q.starts_with("document.evaluate("));
            assert!(q.ends_with(".snapshotLength"));
        }

        #[test]
        fn test_text_literal_escapes_quotes() {
            let q = Selector::text("I'm not a \"robot\"").to_count_query();
            assert!(q.contains(r#""I'm not a \"robot\"""#));
        }

        #[test]
        fn test_role_button_candidates() {
            let q = Selector::role("button", "Reject all").to_query();
            assert!(q.contains("[role='button']"));
            assert!(q.contains("\"Reject all\""));
        }

        #[test]
        fn test_display_forms() {
            assert_eq!(Selector::css("span#cwos").to_string(), "span#cwos");
            assert_eq!(Selector::text("x").to_string(), "text=x");
            assert_eq!(
                Selector::role("button", "Stay signed out").to_string(),
                "role=button[name=\"Stay signed out\"]"
            );
        }
    }

    mod locator_map_tests {
        use super::*;

        #[test]
        fn test_resolve_known() {
            let map = sample();
            assert_eq!(
                map.resolve("one").unwrap(),
                &Selector::css("div[jsname='N10B9']")
            );
            assert!(map.contains("accept"));
            assert_eq!(map.len(), 2);
        }

        #[test]
        fn test_resolve_unknown_fails() {
            let err = sample().resolve("two").unwrap_err();
            assert!(matches!(
                err,
                ProbeError::UnknownElement { ref name, ref map } if name == "two" && map == "sample"
            ));
        }

        #[test]
        fn test_duplicate_names_rejected() {
            let err = LocatorMap::from_entries(
                "dup",
                [("a", Selector::css("a")), ("a", Selector::css("b"))],
            )
            .unwrap_err();
            assert!(matches!(err, ProbeError::Config { .. }));
        }

        #[test]
        fn test_names_sorted() {
            let map = sample();
            let names: Vec<_> = map.names().collect();
            assert_eq!(names, vec!["accept", "one"]);
        }
    }

    proptest! {
        #[test]
        fn prop_unknown_names_never_resolve(name in "[a-z_]{1,12}") {
            let map = sample();
            prop_assume!(!map.contains(&name));
            let is_unknown = matches!(map.resolve(&name), Err(ProbeError::UnknownElement { .. }));
            prop_assert!(is_unknown);
        }
    }
}
