use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::selector::LinkSelector;
use crate::domain::errors::ConfigError;

/// Storage mechanisms a backend chain can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Durable per-origin storage
    #[serde(rename = "localStorage")]
    Local,
    /// Per-tab storage cleared when the session ends
    #[serde(rename = "sessionStorage")]
    Session,
    /// Small, size-capped cookie storage
    #[serde(rename = "cookie")]
    Cookie,
}

impl BackendKind {
    /// Every kind, in the order `clear_all` sweeps them.
    pub const ALL: [Self; 3] = [Self::Local, Self::Session, Self::Cookie];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "localStorage",
            Self::Session => "sessionStorage",
            Self::Cookie => "cookie",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "localstorage" | "local" => Ok(Self::Local),
            "sessionstorage" | "session" => Ok(Self::Session),
            "cookie" | "cookies" => Ok(Self::Cookie),
            _ => Err(ConfigError::UnknownBackend(s.trim().to_string())),
        }
    }
}

/// Ordered backend priority list.
///
/// Deserializes from either a `|`-delimited string (`"cookie|localStorage"`)
/// or a list of names. Duplicates keep their first position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBackendChain", into = "Vec<BackendKind>")]
pub struct BackendChain(Vec<BackendKind>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBackendChain {
    Delimited(String),
    List(Vec<String>),
}

impl BackendChain {
    pub fn new(kinds: impl IntoIterator<Item = BackendKind>) -> Result<Self, ConfigError> {
        let mut chain = Vec::new();
        for kind in kinds {
            if !chain.contains(&kind) {
                chain.push(kind);
            }
        }
        if chain.is_empty() {
            return Err(ConfigError::EmptyBackendChain);
        }
        Ok(Self(chain))
    }

    /// Parse the delimited form, e.g. `"cookie|localStorage|sessionStorage"`.
    pub fn parse(chain: &str) -> Result<Self, ConfigError> {
        let kinds = chain
            .split('|')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<BackendKind>)
            .collect::<Result<Vec<BackendKind>, _>>()?;
        Self::new(kinds)
    }

    pub fn iter(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[BackendKind] {
        &self.0
    }
}

impl Default for BackendChain {
    fn default() -> Self {
        Self(vec![BackendKind::Local])
    }
}

impl fmt::Display for BackendChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(BackendKind::as_str).collect();
        f.write_str(&names.join(" -> "))
    }
}

impl TryFrom<RawBackendChain> for BackendChain {
    type Error = ConfigError;

    fn try_from(raw: RawBackendChain) -> Result<Self, Self::Error> {
        match raw {
            RawBackendChain::Delimited(chain) => Self::parse(&chain),
            RawBackendChain::List(names) => {
                let kinds = names
                    .iter()
                    .map(|n| n.parse())
                    .collect::<Result<Vec<BackendKind>, _>>()?;
                Self::new(kinds)
            }
        }
    }
}

impl From<BackendChain> for Vec<BackendKind> {
    fn from(chain: BackendChain) -> Self {
        chain.0
    }
}

/// What to do when a link already carries a parameter being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingParamBehavior {
    /// Leave the existing value untouched, even if empty
    #[default]
    Skip,
    /// Replace only an empty existing value
    Fill,
    /// Always replace
    Overwrite,
}

/// How a new capture is reconciled with the previously stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Keep the earliest record; later captures are discarded
    FirstTouch,
    /// Replace the stored record with every new capture
    #[default]
    LastTouch,
    /// Accumulate distinct values per parameter, keeping the first timestamp
    Merge,
}

/// Main configuration structure for paramtrail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Master enable switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Verbose engine logging
    #[serde(default)]
    pub debug: bool,

    /// Keep a write-once "first" record
    #[serde(default = "default_true")]
    pub enable_first_touch: bool,

    /// Keep a "last" record reconciled under `reconcile_mode`
    #[serde(default = "default_true")]
    pub enable_last_touch: bool,

    /// Decorate links automatically on load and on triggers
    #[serde(default = "default_true")]
    pub enable_link_decoration: bool,

    /// Restore stored parameters onto a parameterless page URL
    #[serde(default = "default_true")]
    pub enable_url_restoration: bool,

    /// React to links added after load
    #[serde(default = "default_true")]
    pub enable_dynamic_observer: bool,

    /// React to client-side navigation
    #[serde(default = "default_true")]
    pub enable_spa_support: bool,

    /// Exact parameter names to capture
    #[serde(default)]
    pub params: Vec<String>,

    /// Parameter name prefixes to capture
    #[serde(default = "default_param_prefixes")]
    pub param_prefixes: Vec<String>,

    /// Parameter names never captured (wins over inclusion)
    #[serde(default)]
    pub exclude_params: Vec<String>,

    /// Backend priority chain
    #[serde(default)]
    pub storage: BackendChain,

    /// Namespace prefix for every stored key
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,

    /// Days before the "first" record expires (0 = never)
    #[serde(default = "default_first_touch_ttl")]
    pub first_touch_ttl: u32,

    /// Days before the "last" record expires (0 = never)
    #[serde(default = "default_last_touch_ttl")]
    pub last_touch_ttl: u32,

    /// Cookie `domain` attribute; empty scopes cookies to the current host
    #[serde(default)]
    pub cookie_domain: String,

    /// Hostnames links may be decorated for; empty means the page's own host
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Glob patterns matched against the resolved link URL
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Links matching this selector are never decorated
    #[serde(default)]
    pub exclude_selector: LinkSelector,

    /// Conflict policy for parameters already on a link
    #[serde(default)]
    pub existing_param_behavior: ExistingParamBehavior,

    /// Reconciliation policy for the "last" record
    #[serde(default)]
    pub reconcile_mode: ReconcileMode,

    /// Skip URL restoration when the page already has capturable parameters
    #[serde(default = "default_true")]
    pub restore_only_if_empty: bool,

    /// Debounce window for DOM mutation triggers
    #[serde(default = "default_dom_debounce_ms")]
    pub dom_debounce_ms: u64,

    /// Debounce window for navigation triggers
    #[serde(default = "default_navigation_debounce_ms")]
    pub navigation_debounce_ms: u64,
}

const fn default_true() -> bool {
    true
}

fn default_param_prefixes() -> Vec<String> {
    vec!["utm_".to_string()]
}

fn default_storage_prefix() -> String {
    "pz_".to_string()
}

const fn default_first_touch_ttl() -> u32 {
    365
}

const fn default_last_touch_ttl() -> u32 {
    30
}

const fn default_dom_debounce_ms() -> u64 {
    100
}

const fn default_navigation_debounce_ms() -> u64 {
    50
}

/// Executables, archives, documents, non-web schemes and account actions.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "*.exe",
    "*.msi",
    "*.dmg",
    "*.pkg",
    "*.zip",
    "*.rar",
    "*.7z",
    "*.tar*",
    "*.pdf",
    "mailto:*",
    "tel:*",
    "javascript:*",
    "*logout*",
    "*signout*",
    "*unsubscribe*",
];

fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            enable_first_touch: true,
            enable_last_touch: true,
            enable_link_decoration: true,
            enable_url_restoration: true,
            enable_dynamic_observer: true,
            enable_spa_support: true,
            params: vec![],
            param_prefixes: default_param_prefixes(),
            exclude_params: vec![],
            storage: BackendChain::default(),
            storage_prefix: default_storage_prefix(),
            first_touch_ttl: default_first_touch_ttl(),
            last_touch_ttl: default_last_touch_ttl(),
            cookie_domain: String::new(),
            allowed_domains: vec![],
            exclude_patterns: default_exclude_patterns(),
            exclude_selector: LinkSelector::default(),
            existing_param_behavior: ExistingParamBehavior::default(),
            reconcile_mode: ReconcileMode::default(),
            restore_only_if_empty: true,
            dom_debounce_ms: default_dom_debounce_ms(),
            navigation_debounce_ms: default_navigation_debounce_ms(),
        }
    }
}

/// Partial configuration update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub debug: Option<bool>,
    pub enable_first_touch: Option<bool>,
    pub enable_last_touch: Option<bool>,
    pub enable_link_decoration: Option<bool>,
    pub enable_url_restoration: Option<bool>,
    pub enable_dynamic_observer: Option<bool>,
    pub enable_spa_support: Option<bool>,
    pub params: Option<Vec<String>>,
    pub param_prefixes: Option<Vec<String>>,
    pub exclude_params: Option<Vec<String>>,
    pub storage: Option<BackendChain>,
    pub storage_prefix: Option<String>,
    pub first_touch_ttl: Option<u32>,
    pub last_touch_ttl: Option<u32>,
    pub cookie_domain: Option<String>,
    pub allowed_domains: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
    pub exclude_selector: Option<LinkSelector>,
    pub existing_param_behavior: Option<ExistingParamBehavior>,
    pub reconcile_mode: Option<ReconcileMode>,
    pub restore_only_if_empty: Option<bool>,
    pub dom_debounce_ms: Option<u64>,
    pub navigation_debounce_ms: Option<u64>,
}

macro_rules! merge_fields {
    ($target:ident, $patch:ident; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value;
            }
        )+
    };
}

impl Config {
    /// Merge a partial update field by field.
    ///
    /// The merged configuration is validated before it replaces `self`;
    /// on error `self` is left unchanged.
    pub fn apply(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        let mut next = self.clone();
        merge_fields!(next, patch;
            enabled,
            debug,
            enable_first_touch,
            enable_last_touch,
            enable_link_decoration,
            enable_url_restoration,
            enable_dynamic_observer,
            enable_spa_support,
            params,
            param_prefixes,
            exclude_params,
            storage,
            storage_prefix,
            first_touch_ttl,
            last_touch_ttl,
            cookie_domain,
            allowed_domains,
            exclude_patterns,
            exclude_selector,
            existing_param_behavior,
            reconcile_mode,
            restore_only_if_empty,
            dom_debounce_ms,
            navigation_debounce_ms,
        );
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Check cross-field invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // An empty prefix would make clear_all wipe unrelated keys
        if self.storage_prefix.is_empty() {
            return Err(ConfigError::EmptyStoragePrefix);
        }

        if self.param_prefixes.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyParamPrefix);
        }

        for domain in &self.allowed_domains {
            let invalid = domain.trim().is_empty()
                || domain.contains('/')
                || domain.contains(':')
                || domain.chars().any(char::is_whitespace);
            if invalid {
                return Err(ConfigError::InvalidDomain(domain.clone()));
            }
        }

        if self.dom_debounce_ms == 0 {
            return Err(ConfigError::InvalidDebounce("dom_debounce_ms"));
        }
        if self.navigation_debounce_ms == 0 {
            return Err(ConfigError::InvalidDebounce("navigation_debounce_ms"));
        }

        if self.storage.as_slice().is_empty() {
            return Err(ConfigError::EmptyBackendChain);
        }

        Ok(())
    }

    /// Configured cookie domain, if any.
    pub fn cookie_domain(&self) -> Option<&str> {
        let domain = self.cookie_domain.trim();
        (!domain.is_empty()).then_some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.param_prefixes, vec!["utm_"]);
        assert_eq!(config.storage.as_slice(), &[BackendKind::Local]);
        assert_eq!(config.storage_prefix, "pz_");
        assert_eq!(config.first_touch_ttl, 365);
        assert_eq!(config.last_touch_ttl, 30);
        assert_eq!(config.existing_param_behavior, ExistingParamBehavior::Skip);
        assert_eq!(config.reconcile_mode, ReconcileMode::LastTouch);
        assert_eq!(config.exclude_patterns.len(), DEFAULT_EXCLUDE_PATTERNS.len());
        config.validate().expect("default config should be valid");
    }

    #[test]
    fn test_backend_chain_parsing() {
        let chain = BackendChain::parse("cookie|localStorage").unwrap();
        assert_eq!(chain.as_slice(), &[BackendKind::Cookie, BackendKind::Local]);

        let chain = BackendChain::parse(" sessionStorage | cookie | sessionStorage ").unwrap();
        assert_eq!(chain.as_slice(), &[BackendKind::Session, BackendKind::Cookie]);

        assert_eq!(
            BackendChain::parse("indexedDB"),
            Err(ConfigError::UnknownBackend("indexedDB".to_string()))
        );
        assert_eq!(BackendChain::parse(""), Err(ConfigError::EmptyBackendChain));
    }

    #[test]
    fn test_backend_chain_deserialize_forms() {
        let delimited: BackendChain = serde_json::from_str(r#""cookie|sessionStorage""#).unwrap();
        let list: BackendChain = serde_json::from_str(r#"["cookie", "sessionStorage"]"#).unwrap();
        assert_eq!(delimited, list);
        assert_eq!(delimited.to_string(), "cookie -> sessionStorage");
        assert!(serde_json::from_str::<BackendChain>(r#"["floppy"]"#).is_err());
    }

    #[test]
    fn test_apply_patch_merges_named_fields() {
        let mut config = Config::default();
        let patch = ConfigPatch {
            debug: Some(true),
            reconcile_mode: Some(ReconcileMode::Merge),
            allowed_domains: Some(vec!["*.example.com".to_string()]),
            ..ConfigPatch::default()
        };

        config.apply(patch).unwrap();
        assert!(config.debug);
        assert_eq!(config.reconcile_mode, ReconcileMode::Merge);
        assert_eq!(config.allowed_domains, vec!["*.example.com"]);
        assert_eq!(config.storage_prefix, "pz_");
    }

    #[test]
    fn test_apply_invalid_patch_leaves_config_untouched() {
        let mut config = Config::default();
        let patch = ConfigPatch {
            debug: Some(true),
            storage_prefix: Some(String::new()),
            ..ConfigPatch::default()
        };

        assert_eq!(config.apply(patch), Err(ConfigError::EmptyStoragePrefix));
        assert!(!config.debug);
    }

    #[test]
    fn test_validate_rejects_bad_domains() {
        let mut config = Config::default();
        config.allowed_domains = vec!["https://example.com".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDomain(_))));
    }

    #[test]
    fn test_patch_from_json() {
        let patch: ConfigPatch =
            serde_json::from_str(r#"{"storage": "cookie|localStorage", "existing_param_behavior": "fill"}"#)
                .unwrap();
        assert_eq!(patch.existing_param_behavior, Some(ExistingParamBehavior::Fill));
        assert_eq!(
            patch.storage.unwrap().as_slice(),
            &[BackendKind::Cookie, BackendKind::Local]
        );
        assert!(patch.debug.is_none());
    }
}
