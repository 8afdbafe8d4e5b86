//! In-memory document: a location, a history log and a list of anchors.

use indexmap::IndexMap;
use url::Url;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::LinkId;
use crate::domain::ports::{LinkElement, Page};

/// An anchor element with attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    id: LinkId,
    tag: String,
    attributes: IndexMap<String, String>,
}

impl Anchor {
    /// `<a href="...">`
    pub fn new(href: &str) -> Self {
        let mut attributes = IndexMap::new();
        attributes.insert("href".to_string(), href.to_string());
        Self {
            id: LinkId::new(),
            tag: "a".to_string(),
            attributes,
        }
    }

    /// `<a>` without an `href`
    pub fn without_href() -> Self {
        Self {
            id: LinkId::new(),
            tag: "a".to_string(),
            attributes: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_ascii_lowercase();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_class(self, class: &str) -> Self {
        let classes = match self.attributes.get("class") {
            Some(existing) => format!("{existing} {class}"),
            None => class.to_string(),
        };
        self.with_attribute("class", &classes)
    }
}

impl LinkElement for Anchor {
    fn id(&self) -> LinkId {
        self.id
    }

    fn tag_name(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(&name.to_ascii_lowercase()).cloned()
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
    }
}

/// Document stand-in implementing [`Page`].
#[derive(Debug, Clone)]
pub struct InMemoryPage {
    location: Url,
    anchors: Vec<Anchor>,
    history: Vec<Url>,
}

impl InMemoryPage {
    pub fn new(location: &str) -> DomainResult<Self> {
        let location = Url::parse(location).map_err(|source| DomainError::InvalidUrl {
            url: location.to_string(),
            source,
        })?;
        Ok(Self {
            location,
            anchors: Vec::new(),
            history: Vec::new(),
        })
    }

    /// Append an anchor to the document, returning its identity.
    pub fn add_anchor(&mut self, anchor: Anchor) -> LinkId {
        let id = anchor.id;
        self.anchors.push(anchor);
        id
    }

    pub fn anchor(&self, id: LinkId) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.id == id)
    }

    pub fn anchor_mut(&mut self, id: LinkId) -> Option<&mut Anchor> {
        self.anchors.iter_mut().find(|a| a.id == id)
    }

    /// Current `href` attribute of an anchor.
    pub fn href_of(&self, id: LinkId) -> Option<String> {
        self.anchor(id).and_then(|a| a.href())
    }

    /// Drop every anchor, as a client-side route swap would.
    pub fn clear_anchors(&mut self) {
        self.anchors.clear();
    }

    /// Move to a new URL, as history push would.
    pub fn navigate(&mut self, location: &str) -> DomainResult<()> {
        let next = self.location.join(location).map_err(|source| DomainError::InvalidUrl {
            url: location.to_string(),
            source,
        })?;
        self.history.push(std::mem::replace(&mut self.location, next));
        Ok(())
    }

    /// Previous locations, oldest first.
    pub fn history(&self) -> &[Url] {
        &self.history
    }
}

impl Page for InMemoryPage {
    fn location(&self) -> Url {
        self.location.clone()
    }

    fn replace_location(&mut self, url: &Url) -> DomainResult<()> {
        if url.origin() != self.location.origin() {
            return Err(DomainError::HistoryRejected(format!(
                "cross-origin URL {url} cannot replace {}",
                self.location
            )));
        }
        self.history.push(self.location.clone());
        self.location = url.clone();
        Ok(())
    }

    fn links(&mut self) -> Vec<&mut dyn LinkElement> {
        self.anchors
            .iter_mut()
            .map(|a| a as &mut dyn LinkElement)
            .collect()
    }
}
