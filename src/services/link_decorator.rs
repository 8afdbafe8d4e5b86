//! Propagation of captured parameters onto outbound links.
//!
//! Each link is checked for eligibility (ledger, scheme, selector, exclusion
//! globs, domain allow-list), then the parameters are merged into its query
//! under the configured [`ExistingParamBehavior`]. Decorated links are
//! recorded in a ledger so that repeated passes within one epoch leave them
//! alone; [`LinkDecorator::reset`] starts a new epoch.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;
use url::Url;

use super::pattern_matcher::{match_domain, GlobSet};
use crate::domain::models::{Config, ExistingParamBehavior, LinkId, LinkSelector, ParamSet};
use crate::domain::ports::{LinkElement, Page};

/// Targets that never navigate to a web page.
const NON_WEB_SCHEMES: &[&str] = &[
    "mailto:",
    "tel:",
    "javascript:",
    "data:",
    "blob:",
    "file:",
    "ftp:",
    "sms:",
    "whatsapp:",
    "skype:",
    "facetime:",
    "#",
];

/// Why a link was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDecorated,
    MissingHref,
    NonWebScheme,
    ExcludedBySelector,
    ExcludedByPattern,
    InvalidUrl,
    DomainNotAllowed,
    Unchanged,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::AlreadyDecorated => "already decorated",
            Self::MissingHref => "no href",
            Self::NonWebScheme => "non-web scheme",
            Self::ExcludedBySelector => "excluded by selector",
            Self::ExcludedByPattern => "excluded by pattern",
            Self::InvalidUrl => "unparseable target",
            Self::DomainNotAllowed => "domain not allowed",
            Self::Unchanged => "nothing to add",
        };
        f.write_str(reason)
    }
}

fn is_non_web(href: &str) -> bool {
    let href = href.trim_start().to_ascii_lowercase();
    href.is_empty() || NON_WEB_SCHEMES.iter().any(|scheme| href.starts_with(scheme))
}

/// Merge `params` into `url`'s query under `behavior`.
///
/// Replacing a parameter sets its first occurrence and drops any later
/// duplicates. Returns true if the query changed.
pub fn apply_params(url: &mut Url, params: &ParamSet, behavior: ExistingParamBehavior) -> bool {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut changed = false;

    for (name, value) in params {
        let Some(index) = pairs.iter().position(|(n, _)| n == name) else {
            pairs.push((name.clone(), value.clone()));
            changed = true;
            continue;
        };

        let replace = match behavior {
            ExistingParamBehavior::Skip => false,
            ExistingParamBehavior::Fill => pairs[index].1.is_empty(),
            ExistingParamBehavior::Overwrite => true,
        };
        if !replace {
            continue;
        }

        let duplicates = pairs.iter().filter(|(n, _)| n == name).count();
        if pairs[index].1 != *value || duplicates > 1 {
            pairs[index].1.clone_from(value);
            let mut seen = 0;
            pairs.retain(|(n, _)| {
                if n != name {
                    return true;
                }
                seen += 1;
                seen == 1
            });
            changed = true;
        }
    }

    if changed {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }
    changed
}

/// Decorates links and owns the per-epoch ledger.
#[derive(Debug)]
pub struct LinkDecorator {
    ledger: HashSet<LinkId>,
    exclude_patterns: GlobSet,
    exclude_selector: LinkSelector,
    allowed_domains: Vec<String>,
    behavior: ExistingParamBehavior,
}

impl LinkDecorator {
    pub fn new(config: &Config) -> Self {
        Self {
            ledger: HashSet::new(),
            exclude_patterns: GlobSet::new(&config.exclude_patterns),
            exclude_selector: config.exclude_selector.clone(),
            allowed_domains: config.allowed_domains.clone(),
            behavior: config.existing_param_behavior,
        }
    }

    /// Adopt new settings; the ledger is kept.
    pub fn update_config(&mut self, config: &Config) {
        self.exclude_patterns = GlobSet::new(&config.exclude_patterns);
        self.exclude_selector.clone_from(&config.exclude_selector);
        self.allowed_domains.clone_from(&config.allowed_domains);
        self.behavior = config.existing_param_behavior;
    }

    /// Number of links decorated in the current epoch.
    pub fn decorated_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_decorated(&self, id: LinkId) -> bool {
        self.ledger.contains(&id)
    }

    /// Start a new epoch.
    pub fn reset(&mut self) {
        debug!(target: "paramtrail::decorator", forgotten = self.ledger.len(), "decoration ledger reset");
        self.ledger.clear();
    }

    fn is_domain_allowed(&self, hostname: &str, page_url: &Url) -> bool {
        if self.allowed_domains.is_empty() {
            return page_url
                .host_str()
                .is_some_and(|own| own.eq_ignore_ascii_case(hostname));
        }
        self.allowed_domains
            .iter()
            .any(|pattern| match_domain(pattern, hostname))
    }

    /// Resolve `link` to an absolute target if it may be decorated.
    pub fn eligible_target(&self, link: &dyn LinkElement, page_url: &Url) -> Result<Url, SkipReason> {
        if self.ledger.contains(&link.id()) {
            return Err(SkipReason::AlreadyDecorated);
        }
        let href = link.href().ok_or(SkipReason::MissingHref)?;
        if is_non_web(&href) {
            return Err(SkipReason::NonWebScheme);
        }
        if self.exclude_selector.matches(link) {
            return Err(SkipReason::ExcludedBySelector);
        }

        let target = page_url.join(href.trim()).map_err(|_| SkipReason::InvalidUrl)?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(SkipReason::NonWebScheme);
        }
        if let Some(pattern) = self.exclude_patterns.first_match(target.as_str()) {
            debug!(target: "paramtrail::decorator", href = %target, pattern, "link excluded by pattern");
            return Err(SkipReason::ExcludedByPattern);
        }

        let hostname = target.host_str().ok_or(SkipReason::InvalidUrl)?;
        if !self.is_domain_allowed(hostname, page_url) {
            return Err(SkipReason::DomainNotAllowed);
        }
        Ok(target)
    }

    /// Decorate a single link. Returns true if its target changed.
    pub fn decorate(&mut self, link: &mut dyn LinkElement, page_url: &Url, params: &ParamSet) -> bool {
        let mut target = match self.eligible_target(&*link, page_url) {
            Ok(target) => target,
            Err(reason) => {
                debug!(target: "paramtrail::decorator", href = ?link.href(), %reason, "link skipped");
                return false;
            }
        };

        if !apply_params(&mut target, params, self.behavior) {
            debug!(target: "paramtrail::decorator", href = %target, reason = %SkipReason::Unchanged, "link skipped");
            return false;
        }

        debug!(target: "paramtrail::decorator", href = %target, "decorated");
        link.set_href(target.as_str());
        self.ledger.insert(link.id());
        true
    }

    /// Decorate every link on the page, returning how many changed.
    pub fn decorate_all<P: Page + ?Sized>(&mut self, page: &mut P, params: &ParamSet) -> usize {
        if params.is_empty() {
            return 0;
        }

        let page_url = page.location();
        let mut count = 0;
        for link in page.links() {
            if self.decorate(link, &page_url, params) {
                count += 1;
            }
        }

        debug!(target: "paramtrail::decorator", count, "links decorated");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Anchor, InMemoryPage};

    fn params(pairs: &[(&str, &str)]) -> ParamSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn decorator(configure: impl FnOnce(&mut Config)) -> LinkDecorator {
        let mut config = Config::default();
        configure(&mut config);
        LinkDecorator::new(&config)
    }

    fn page() -> InMemoryPage {
        InMemoryPage::new("https://shop.example.com/landing?utm_source=google").unwrap()
    }

    #[test]
    fn test_same_origin_link_gets_params() {
        let mut page = page();
        let id = page.add_anchor(Anchor::new("/pricing"));
        let mut decorator = decorator(|_| {});

        let count = decorator.decorate_all(
            &mut page,
            &params(&[("utm_source", "google"), ("utm_medium", "cpc")]),
        );

        assert_eq!(count, 1);
        assert_eq!(
            page.href_of(id).as_deref(),
            Some("https://shop.example.com/pricing?utm_source=google&utm_medium=cpc")
        );
        assert!(decorator.is_decorated(id));
    }

    #[test]
    fn test_decorates_once_per_epoch() {
        let mut page = page();
        let id = page.add_anchor(Anchor::new("/a"));
        let mut decorator = decorator(|c| c.existing_param_behavior = ExistingParamBehavior::Overwrite);
        let first = params(&[("utm_source", "google")]);
        let second = params(&[("utm_source", "bing")]);

        assert_eq!(decorator.decorate_all(&mut page, &first), 1);
        assert_eq!(decorator.decorate_all(&mut page, &second), 0);
        assert_eq!(
            page.href_of(id).as_deref(),
            Some("https://shop.example.com/a?utm_source=google")
        );

        decorator.reset();
        assert_eq!(decorator.decorate_all(&mut page, &second), 1);
        assert_eq!(
            page.href_of(id).as_deref(),
            Some("https://shop.example.com/a?utm_source=bing")
        );
    }

    #[test]
    fn test_existing_param_behaviors() {
        let new = params(&[("x", "new")]);
        let cases = [
            (ExistingParamBehavior::Skip, "https://a.com/?x=old", "https://a.com/?x=old", false),
            (ExistingParamBehavior::Skip, "https://a.com/?x=", "https://a.com/?x=", false),
            (ExistingParamBehavior::Fill, "https://a.com/?x=old", "https://a.com/?x=old", false),
            (ExistingParamBehavior::Fill, "https://a.com/?x=", "https://a.com/?x=new", true),
            (ExistingParamBehavior::Overwrite, "https://a.com/?x=old", "https://a.com/?x=new", true),
            (ExistingParamBehavior::Overwrite, "https://a.com/?x=new", "https://a.com/?x=new", false),
        ];

        for (behavior, before, after, changed) in cases {
            let mut url = Url::parse(before).unwrap();
            assert_eq!(apply_params(&mut url, &new, behavior), changed, "{behavior:?} on {before}");
            assert_eq!(url.as_str(), after, "{behavior:?} on {before}");
        }
    }

    #[test]
    fn test_overwrite_collapses_duplicates() {
        let mut url = Url::parse("https://a.com/?x=1&y=2&x=3").unwrap();
        assert!(apply_params(&mut url, &params(&[("x", "9")]), ExistingParamBehavior::Overwrite));
        assert_eq!(url.as_str(), "https://a.com/?x=9&y=2");
    }

    #[test]
    fn test_fragment_is_kept() {
        let mut url = Url::parse("https://a.com/page#section").unwrap();
        assert!(apply_params(&mut url, &params(&[("utm_source", "g")]), ExistingParamBehavior::Skip));
        assert_eq!(url.as_str(), "https://a.com/page?utm_source=g#section");
    }

    #[test]
    fn test_ineligible_links_are_skipped() {
        let decorator = decorator(|_| {});
        let page_url = page().location();
        let cases = [
            (Anchor::without_href(), SkipReason::MissingHref),
            (Anchor::new("mailto:hi@example.com"), SkipReason::NonWebScheme),
            (Anchor::new("  TEL:+123"), SkipReason::NonWebScheme),
            (Anchor::new("#top"), SkipReason::NonWebScheme),
            (Anchor::new("javascript:void(0)"), SkipReason::NonWebScheme),
            (Anchor::new("/x").with_class("pz-ignore"), SkipReason::ExcludedBySelector),
            (Anchor::new("/x").with_attribute("data-pz-ignore", ""), SkipReason::ExcludedBySelector),
            (Anchor::new("/files/setup.EXE"), SkipReason::ExcludedByPattern),
            (Anchor::new("/account/logout"), SkipReason::ExcludedByPattern),
            (Anchor::new("https://[bad"), SkipReason::InvalidUrl),
            (Anchor::new("https://other.com/"), SkipReason::DomainNotAllowed),
            (Anchor::new("https://sub.shop.example.com/"), SkipReason::DomainNotAllowed),
        ];

        for (anchor, reason) in cases {
            assert_eq!(
                decorator.eligible_target(&anchor, &page_url),
                Err(reason),
                "{:?}",
                anchor.href()
            );
        }
    }

    #[test]
    fn test_allow_list_with_wildcards() {
        let decorator = decorator(|c| c.allowed_domains = vec!["*.example.com".to_string(), "partner.io".to_string()]);
        let page_url = page().location();

        for href in ["https://example.com/", "https://blog.example.com/", "https://PARTNER.io/x"] {
            assert!(decorator.eligible_target(&Anchor::new(href), &page_url).is_ok(), "{href}");
        }
        assert_eq!(
            decorator.eligible_target(&Anchor::new("https://evil-example.com/"), &page_url),
            Err(SkipReason::DomainNotAllowed)
        );
    }

    #[test]
    fn test_empty_params_short_circuit() {
        let mut page = page();
        page.add_anchor(Anchor::new("/a"));
        let mut decorator = decorator(|_| {});
        assert_eq!(decorator.decorate_all(&mut page, &ParamSet::new()), 0);
        assert_eq!(decorator.decorated_count(), 0);
    }

    #[test]
    fn test_unchanged_link_not_recorded() {
        let mut page = page();
        let id = page.add_anchor(Anchor::new("https://shop.example.com/?utm_source=bing"));
        let mut decorator = decorator(|_| {});

        assert_eq!(decorator.decorate_all(&mut page, &params(&[("utm_source", "google")])), 0);
        assert!(!decorator.is_decorated(id));
        assert_eq!(
            page.href_of(id).as_deref(),
            Some("https://shop.example.com/?utm_source=bing")
        );
    }
}
