//! In-memory `document.cookie` emulation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::DateTime;
use indexmap::IndexMap;

use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::ports::{Clock, CookieJar};

/// A cookie as the jar recorded it, attributes included.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredCookie {
    pub value: String,
    /// Expiry in Unix milliseconds; `None` for session cookies
    pub expires: Option<i64>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub same_site: Option<String>,
}

/// Cookie jar that parses set-cookie strings and hides expired entries.
pub struct MemoryCookieJar {
    cookies: Mutex<IndexMap<String, StoredCookie>>,
    clock: Arc<dyn Clock>,
    enabled: AtomicBool,
}

impl MemoryCookieJar {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            cookies: Mutex::new(IndexMap::new()),
            clock,
            enabled: AtomicBool::new(true),
        }
    }

    /// Disabled jars silently drop writes and read as empty, like a
    /// browser with cookies blocked.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Look up a live cookie by its raw (encoded) name.
    pub fn get(&self, name: &str) -> Option<StoredCookie> {
        let now = self.clock.now_millis();
        self.lock()
            .ok()?
            .get(name)
            .filter(|c| !is_expired(c, now))
            .cloned()
    }

    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.lock()
            .map(|cookies| cookies.values().filter(|c| !is_expired(c, now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, IndexMap<String, StoredCookie>>> {
        self.cookies
            .lock()
            .map_err(|_| StorageError::Unavailable("cookie jar lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for MemoryCookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCookieJar")
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn is_expired(cookie: &StoredCookie, now: i64) -> bool {
    cookie.expires.is_some_and(|at| at <= now)
}

impl CookieJar for MemoryCookieJar {
    fn cookie_string(&self) -> StorageResult<String> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Ok(String::new());
        }

        let now = self.clock.now_millis();
        let cookies = self.lock()?;
        let pairs: Vec<String> = cookies
            .iter()
            .filter(|(_, c)| !is_expired(c, now))
            .map(|(name, c)| format!("{name}={}", c.value))
            .collect();
        Ok(pairs.join("; "))
    }

    fn set_cookie(&self, cookie: &str) -> StorageResult<()> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut parts = cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return Err(StorageError::Serialization(format!(
                "malformed cookie string: {cookie}"
            )));
        };

        let now = self.clock.now_millis();
        let mut stored = StoredCookie {
            value: value.trim().to_string(),
            ..StoredCookie::default()
        };

        for attribute in parts {
            let (key, val) = attribute
                .split_once('=')
                .map_or((attribute.trim(), ""), |(k, v)| (k.trim(), v.trim()));
            match key.to_ascii_lowercase().as_str() {
                "expires" => {
                    if let Ok(at) = DateTime::parse_from_rfc2822(val) {
                        stored.expires = Some(at.timestamp_millis());
                    }
                }
                "max-age" => {
                    if let Ok(secs) = val.parse::<i64>() {
                        stored.expires = Some(now.saturating_add(secs.saturating_mul(1000)));
                    }
                }
                "path" => stored.path = Some(val.to_string()),
                "domain" => stored.domain = Some(val.to_string()),
                "samesite" => stored.same_site = Some(val.to_string()),
                _ => {}
            }
        }

        let name = name.trim().to_string();
        let mut cookies = self.lock()?;
        if is_expired(&stored, now) {
            cookies.shift_remove(&name);
        } else {
            cookies.insert(name, stored);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;

    fn jar() -> (Arc<ManualClock>, MemoryCookieJar) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let jar = MemoryCookieJar::new(clock.clone());
        (clock, jar)
    }

    #[test]
    fn test_set_and_read_cookies() {
        let (_, jar) = jar();
        jar.set_cookie("a=1; path=/; SameSite=Lax").unwrap();
        jar.set_cookie("b=2").unwrap();
        assert_eq!(jar.cookie_string().unwrap(), "a=1; b=2");

        let a = jar.get("a").unwrap();
        assert_eq!(a.path.as_deref(), Some("/"));
        assert_eq!(a.same_site.as_deref(), Some("Lax"));
        assert_eq!(a.expires, None);
    }

    #[test]
    fn test_past_expiry_deletes() {
        let (_, jar) = jar();
        jar.set_cookie("a=1").unwrap();
        jar.set_cookie("a=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/")
            .unwrap();
        assert!(jar.get("a").is_none());
        assert_eq!(jar.cookie_string().unwrap(), "");
    }

    #[test]
    fn test_expired_cookies_hidden() {
        let (clock, jar) = jar();
        jar.set_cookie("a=1; max-age=60").unwrap();
        assert_eq!(jar.len(), 1);
        clock.advance(60_000);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_disabled_jar_drops_writes() {
        let (_, jar) = jar();
        jar.set_enabled(false);
        jar.set_cookie("a=1").unwrap();
        jar.set_enabled(true);
        assert!(jar.get("a").is_none());
    }

    #[test]
    fn test_malformed_cookie_rejected() {
        let (_, jar) = jar();
        assert!(jar.set_cookie("no-equals-sign").is_err());
    }
}
