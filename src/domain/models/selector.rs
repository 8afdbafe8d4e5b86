//! Link exclusion selectors.
//!
//! A deliberately small subset of CSS selectors, enough to express the
//! opt-out markers site owners put on links: comma-separated alternatives
//! made of an optional tag name followed by any number of `.class`, `#id`,
//! `[attr]` and `[attr=value]` parts. Combinators are not supported.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ConfigError;
use crate::domain::ports::LinkElement;

/// Selector excluding links marked with `data-pz-ignore` or `.pz-ignore`.
pub const DEFAULT_EXCLUDE_SELECTOR: &str = "[data-pz-ignore], .pz-ignore";

/// Parsed exclusion selector, matched against link attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkSelector {
    source: String,
    alternatives: Vec<CompoundSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatcher>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatcher {
    name: String,
    value: Option<String>,
}

impl LinkSelector {
    /// Parse selector text. Empty text yields a selector matching nothing.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut parser = SelectorParser::new(source);
        let alternatives = parser.parse_list()?;
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// Selector that never matches.
    pub fn none() -> Self {
        Self {
            source: String::new(),
            alternatives: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// True if any alternative matches the element.
    pub fn matches(&self, element: &dyn LinkElement) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(element))
    }
}

impl CompoundSelector {
    fn matches(&self, element: &dyn LinkElement) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_attr = element.attribute("class").unwrap_or_default();
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }

        self.attributes.iter().all(|attr| {
            match (element.attribute(&attr.name), &attr.value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => &actual == expected,
            }
        })
    }
}

impl Default for LinkSelector {
    fn default() -> Self {
        Self::parse(DEFAULT_EXCLUDE_SELECTOR).unwrap_or_else(|_| Self::none())
    }
}

impl fmt::Display for LinkSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for LinkSelector {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LinkSelector> for String {
    fn from(selector: LinkSelector) -> Self {
        selector.source
    }
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_list(&mut self) -> Result<Vec<CompoundSelector>, ConfigError> {
        let mut alternatives = Vec::new();
        self.skip_whitespace();
        if self.peek().is_none() {
            return Ok(alternatives);
        }

        loop {
            self.skip_whitespace();
            alternatives.push(self.parse_compound()?);
            self.skip_whitespace();
            match self.bump() {
                None => break,
                Some(',') => {}
                Some(c) => return Err(self.error(format!("unsupported character '{c}'"))),
            }
        }

        Ok(alternatives)
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, ConfigError> {
        let mut compound = CompoundSelector::default();
        let mut has_part = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                has_part = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.parse_ident("tag name")?.to_ascii_lowercase());
                has_part = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident("class name")?);
                }
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident("id")?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
            has_part = true;
        }

        if has_part {
            Ok(compound)
        } else {
            Err(self.error("empty selector"))
        }
    }

    fn parse_attribute(&mut self) -> Result<AttributeMatcher, ConfigError> {
        self.skip_whitespace();
        let name = self.parse_ident("attribute name")?.to_ascii_lowercase();
        self.skip_whitespace();

        let value = if self.peek() == Some('=') {
            self.pos += 1;
            self.skip_whitespace();
            let value = match self.peek() {
                Some(quote @ ('"' | '\'')) => {
                    self.pos += 1;
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c != quote) {
                        self.pos += 1;
                    }
                    if self.bump() != Some(quote) {
                        return Err(self.error("unterminated attribute value"));
                    }
                    self.chars[start..self.pos - 1].iter().collect()
                }
                _ => self.parse_ident("attribute value")?,
            };
            self.skip_whitespace();
            Some(value)
        } else {
            None
        };

        match self.bump() {
            Some(']') => Ok(AttributeMatcher { name, value }),
            _ => Err(self.error("expected ']'")),
        }
    }

    fn parse_ident(&mut self, what: &str) -> Result<String, ConfigError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("expected {what}")));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
