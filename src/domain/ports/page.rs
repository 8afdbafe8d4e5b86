use url::Url;

use crate::domain::errors::DomainResult;
use crate::domain::models::LinkId;

/// An anchor-like element that may carry a navigable target.
pub trait LinkElement {
    /// Stable identity for the decoration ledger
    fn id(&self) -> LinkId;

    /// Lowercase tag name, e.g. `"a"` or `"area"`
    fn tag_name(&self) -> &str;

    /// Attribute value, `None` if the attribute is absent
    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&mut self, name: &str, value: &str);

    /// Raw `href` attribute as authored
    fn href(&self) -> Option<String> {
        self.attribute("href")
    }

    fn set_href(&mut self, href: &str) {
        self.set_attribute("href", href);
    }
}

/// The current document as seen by the engine.
pub trait Page {
    /// Current page URL (including query string)
    fn location(&self) -> Url;

    /// Replace the current history entry's URL without navigating
    fn replace_location(&mut self, url: &Url) -> DomainResult<()>;

    /// Every anchor-like element currently in the document
    fn links(&mut self) -> Vec<&mut dyn LinkElement>;

    /// Query string of the current location, without the leading `?`
    fn query(&self) -> String {
        self.location().query().unwrap_or_default().to_string()
    }
}
