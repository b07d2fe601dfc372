//! Experiment marker extraction.

use scraper::{Html, Selector};

use crate::error::MarkerError;

/// Attribute VWO stamps on elements it controls.
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-vwo";

/// Finds elements carrying an experiment-tagging attribute.
#[derive(Debug, Clone)]
pub struct MarkerExtractor {
    attribute: String,
    selector: String,
}

impl MarkerExtractor {
    /// Validates that `[attribute]` parses as a CSS selector.
    pub fn new(attribute: impl Into<String>) -> Result<Self, MarkerError> {
        let attribute = attribute.into();
        let selector = format!("[{}]", attribute);
        if Selector::parse(&selector).is_err() {
            return Err(MarkerError::InvalidAttribute(attribute));
        }
        Ok(Self {
            attribute,
            selector,
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Outer HTML of every tagged element, in document order.
    ///
    /// The html5ever parser recovers from malformed input, so this never
    /// fails; unparseable regions simply contribute no markers.
    pub fn extract(&self, markup: &str) -> Vec<String> {
        let Ok(selector) = Selector::parse(&self.selector) else {
            return Vec::new();
        };

        let document = Html::parse_document(markup);
        document
            .select(&selector)
            .map(|el| el.html())
            .collect()
    }
}

impl Default for MarkerExtractor {
    fn default() -> Self {
        Self {
            attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            selector: format!("[{}]", DEFAULT_MARKER_ATTRIBUTE),
        }
    }
}

/// Extract `data-vwo` markers from markup.
pub fn extract_markers(markup: &str) -> Vec<String> {
    MarkerExtractor::default().extract(markup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_marker() {
        let html = r#"<html><body><div data-vwo="123">Test</div><p>No data</p></body></html>"#;
        let result = extract_markers(html);
        assert_eq!(result.len(), 1);
        assert!(result[0].contains("data-vwo"));
        assert!(result[0].contains("Test"));
    }

    #[test]
    fn test_markers_in_document_order() {
        let html = r#"
            <section data-vwo="b"><span data-vwo="inner">x</span></section>
            <p>plain</p>
            <a href="/" data-vwo="a">link</a>
        "#;
        let result = extract_markers(html);
        assert_eq!(result.len(), 3);
        assert!(result[0].starts_with("<section"));
        assert!(result[1].starts_with("<span"));
        assert!(result[2].starts_with("<a"));
    }

    #[test]
    fn test_no_markers() {
        assert!(extract_markers("<html><body><p>nothing</p></body></html>").is_empty());
        assert!(extract_markers("").is_empty());
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let html = r#"<div data-vwo="1"><p>unclosed <b>tags <div"#;
        let result = extract_markers(html);
        assert_eq!(result.len(), 1);
        assert!(result[0].contains("data-vwo"));
    }

    #[test]
    fn test_custom_attribute() {
        let extractor = MarkerExtractor::new("data-optimizely").unwrap();
        let html = r#"<div data-optimizely="x">A</div><div data-vwo="y">B</div>"#;
        let result = extractor.extract(html);
        assert_eq!(result.len(), 1);
        assert!(result[0].contains("data-optimizely"));
    }

    #[test]
    fn test_invalid_attribute_rejected() {
        assert!(MarkerExtractor::new("not valid]").is_err());
    }

    #[test]
    fn test_default_matches_named_constructor() {
        let html = r#"<div data-vwo="a">x</div><span data-vwo="b"></span>"#;
        let named = MarkerExtractor::new(DEFAULT_MARKER_ATTRIBUTE).unwrap();

        assert_eq!(MarkerExtractor::default().attribute(), "data-vwo");
        assert_eq!(MarkerExtractor::default().extract(html), named.extract(html));
        assert_eq!(extract_markers(html).len(), 2);
    }
}
