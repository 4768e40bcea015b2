//! Intents and the locator resolver.
//!
//! An [`ElementIntent`] is a named UI target ("Reserve Now button") carrying
//! one or more authored structural queries in priority order. The resolver
//! tries them in declared order and the first query that yields at least one
//! element wins. There is no scoring or voting across queries: resilience
//! comes from the authored alternatives, not from runtime inference.

use std::fmt;

use crate::driver::ElementHandle;
use crate::result::{HarnessError, HarnessResult};
use crate::session::Session;

/// Structural query understood by every backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// CSS selector (e.g., "input[name='firstname']")
    Css(String),
    /// XPath expression
    XPath(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// Element whose normalized visible text equals the value
    Text {
        /// Tag to restrict to ("*" for any)
        tag: String,
        /// Exact normalized text
        text: String,
    },
}

/// Query lowered to what a backend can execute natively
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeQuery {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
}

impl Query {
    /// Create a CSS query
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath query
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Create a test ID query
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create an exact-text query restricted to `tag`
    #[must_use]
    pub fn text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            tag: tag.into(),
            text: text.into(),
        }
    }

    /// Lower to a native CSS or XPath query
    #[must_use]
    pub fn to_native(&self) -> NativeQuery {
        match self {
            Self::Css(s) => NativeQuery::Css(s.clone()),
            Self::XPath(s) => NativeQuery::XPath(s.clone()),
            Self::TestId(id) => NativeQuery::Css(format!("[data-testid={}]", css_string(id))),
            Self::Text { tag, text } => NativeQuery::XPath(format!(
                "//{tag}[normalize-space()={}]",
                xpath_literal(text)
            )),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::Text { tag, text } => write!(f, "text={tag}:{text}"),
        }
    }
}

/// Quote a string for use inside a CSS attribute selector
fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote a string as an XPath literal, using concat() when it holds both quote kinds
#[must_use]
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// A named UI target with its authored queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementIntent {
    name: String,
    queries: Vec<Query>,
    strict: bool,
}

impl ElementIntent {
    /// Create an intent with no queries yet
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queries: Vec::new(),
            strict: false,
        }
    }

    /// Append a query (lower priority than those already added)
    #[must_use]
    pub fn or(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    /// Append a CSS query
    #[must_use]
    pub fn css(self, selector: impl Into<String>) -> Self {
        self.or(Query::css(selector))
    }

    /// Append an XPath query
    #[must_use]
    pub fn xpath(self, expr: impl Into<String>) -> Self {
        self.or(Query::xpath(expr))
    }

    /// Append a test ID query
    #[must_use]
    pub fn test_id(self, id: impl Into<String>) -> Self {
        self.or(Query::test_id(id))
    }

    /// Require the winning query to match exactly one element
    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Intent name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Authored queries in priority order
    #[must_use]
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Whether more than one match is an error
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Queries rendered for diagnostics
    #[must_use]
    pub fn describe_queries(&self) -> Vec<String> {
        self.queries.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ElementIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Elements produced by the first query that matched
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Index of the winning query
    pub query_index: usize,
    /// Winning query rendered for diagnostics
    pub query: String,
    /// Matched elements in document order
    pub elements: Vec<ElementHandle>,
}

impl Resolution {
    /// Empty resolution (nothing matched)
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            query_index: 0,
            query: String::new(),
            elements: Vec::new(),
        }
    }

    /// Whether nothing matched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Resolves intents against a live session
#[derive(Debug, Clone, Copy)]
pub struct LocatorResolver<'s> {
    session: &'s Session,
}

impl<'s> LocatorResolver<'s> {
    /// Create a resolver borrowing `session`
    #[must_use]
    pub const fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Candidate queries for an intent, in the order they will be tried
    #[must_use]
    pub fn resolve<'i>(&self, intent: &'i ElementIntent) -> &'i [Query] {
        intent.queries()
    }

    /// Run the intent's queries in order; the first non-empty result wins
    pub fn find_all(
        &self,
        intent: &ElementIntent,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<Resolution> {
        for (index, query) in intent.queries().iter().enumerate() {
            let elements = self
                .session
                .with_driver(|driver| driver.find_all(query, within))?;
            if !elements.is_empty() {
                tracing::debug!(
                    intent = intent.name(),
                    query = %query,
                    matches = elements.len(),
                    "intent resolved"
                );
                return Ok(Resolution {
                    query_index: index,
                    query: query.to_string(),
                    elements,
                });
            }
        }
        tracing::debug!(intent = intent.name(), "intent matched nothing");
        Ok(Resolution::empty())
    }

    /// Find the single element an intent refers to.
    ///
    /// Non-strict intents take the first match in document order; strict
    /// intents fail with [`HarnessError::AmbiguousMatch`] on more than one.
    pub fn find(
        &self,
        intent: &ElementIntent,
        within: Option<&ElementHandle>,
    ) -> HarnessResult<ElementHandle> {
        let resolution = self.find_all(intent, within)?;
        if resolution.elements.len() > 1 && intent.is_strict() {
            return Err(HarnessError::AmbiguousMatch {
                intent: intent.name().to_string(),
                query: resolution.query,
                count: resolution.elements.len(),
            });
        }
        resolution
            .elements
            .into_iter()
            .next()
            .ok_or_else(|| HarnessError::NotFound {
                intent: intent.name().to_string(),
                attempted: intent.describe_queries(),
            })
    }

    /// Number of elements the winning query matches
    pub fn count(&self, intent: &ElementIntent) -> HarnessResult<usize> {
        Ok(self.find_all(intent, None)?.elements.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockDriver, MockElement};
    use crate::session::Session;

    mod query_tests {
        use super::*;

        #[test]
        fn test_display_prefixes() {
            assert_eq!(Query::css("#a").to_string(), "css=#a");
            assert_eq!(Query::xpath("//b").to_string(), "xpath=//b");
            assert_eq!(Query::test_id("ContactName").to_string(), "testid=ContactName");
        }

        #[test]
        fn test_test_id_lowers_to_css() {
            assert_eq!(
                Query::test_id("ContactName").to_native(),
                NativeQuery::Css("[data-testid=\"ContactName\"]".to_string())
            );
        }

        #[test]
        fn test_text_lowers_to_xpath() {
            assert_eq!(
                Query::text("button", "Reserve Now").to_native(),
                NativeQuery::XPath("//button[normalize-space()='Reserve Now']".to_string())
            );
        }

        #[test]
        fn test_xpath_literal_quoting() {
            assert_eq!(xpath_literal("plain"), "'plain'");
            assert_eq!(xpath_literal("it's"), "\"it's\"");
            assert_eq!(
                xpath_literal("a'b\"c"),
                "concat('a', \"'\", 'b\"c')"
            );
        }
    }

    mod intent_tests {
        use super::*;

        #[test]
        fn test_queries_keep_declared_order() {
            let intent = ElementIntent::new("Name field")
                .test_id("ContactName")
                .css("#name");
            assert_eq!(intent.queries().len(), 2);
            assert_eq!(intent.queries()[0], Query::test_id("ContactName"));
            assert_eq!(intent.describe_queries(), vec!["testid=ContactName", "css=#name"]);
            assert!(!intent.is_strict());
            assert!(intent.strict().is_strict());
        }
    }

    mod resolver_tests {
        use super::*;

        fn session_with(mock: MockDriver) -> Session {
            Session::from_driver(Box::new(mock), crate::session::SessionConfig::default())
        }

        #[test]
        fn test_first_matching_query_wins() {
            let mock = MockDriver::new();
            mock.add(MockElement::new("fallback").bind(Query::css("#name")));
            mock.add(MockElement::new("other").bind(Query::css(".late")));
            let session = session_with(mock);
            let intent = ElementIntent::new("Name")
                .test_id("ContactName")
                .css("#name")
                .css(".late");
            let resolution = LocatorResolver::new(&session).find_all(&intent, None).unwrap();
            assert_eq!(resolution.query_index, 1);
            assert_eq!(resolution.elements[0].id, "fallback");
        }

        #[test]
        fn test_not_found_lists_every_query() {
            let session = session_with(MockDriver::new());
            let intent = ElementIntent::new("Ghost").css("#a").xpath("//b");
            let err = LocatorResolver::new(&session).find(&intent, None).unwrap_err();
            match err {
                HarnessError::NotFound { intent, attempted } => {
                    assert_eq!(intent, "Ghost");
                    assert_eq!(attempted, vec!["css=#a", "xpath=//b"]);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_strict_intent_rejects_many() {
            let mock = MockDriver::new();
            mock.add(MockElement::new("a").bind(Query::css("li")));
            mock.add(MockElement::new("b").bind(Query::css("li")));
            let session = session_with(mock);
            let loose = ElementIntent::new("Item").css("li");
            assert_eq!(
                LocatorResolver::new(&session).find(&loose, None).unwrap().id,
                "a"
            );
            let strict = loose.strict();
            assert!(matches!(
                LocatorResolver::new(&session).find(&strict, None),
                Err(HarnessError::AmbiguousMatch { count: 2, .. })
            ));
        }

        #[test]
        fn test_scoped_find() {
            let mock = MockDriver::new();
            mock.add(MockElement::new("card-1").bind(Query::css(".room-card")));
            mock.add(
                MockElement::new("title-1")
                    .bind_within("card-1", Query::css("h5.card-title"))
                    .text("Single"),
            );
            let session = session_with(mock);
            let resolver = LocatorResolver::new(&session);
            let card = resolver
                .find(&ElementIntent::new("card").css(".room-card"), None)
                .unwrap();
            let title = resolver
                .find(&ElementIntent::new("title").css("h5.card-title"), Some(&card))
                .unwrap();
            assert_eq!(title.id, "title-1");
            assert!(resolver
                .find(&ElementIntent::new("title").css("h5.card-title"), None)
                .is_err());
        }
    }
}
