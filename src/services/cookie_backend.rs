//! Cookie-backed storage.
//!
//! Entries are written as `name=value; path=/; SameSite=Lax` with an
//! optional `expires` and `domain`. Names and values are percent-encoded
//! the way `encodeURIComponent` does it, and payloads above
//! [`MAX_COOKIE_PAYLOAD`] bytes are rejected instead of truncated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::BackendKind;
use crate::domain::ports::{CookieJar, StorageBackend};

/// Largest serialized payload a cookie entry may carry.
pub const MAX_COOKIE_PAYLOAD: usize = 4000;

const EXPIRED_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

fn decode(encoded: &str) -> StorageResult<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| StorageError::Serialization(format!("invalid cookie encoding: {e}")))
}

/// Format Unix milliseconds as a cookie `expires` date.
pub fn format_expires(expires_at: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(expires_at)
        .map(|at| at.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

/// [`StorageBackend`] over a [`CookieJar`].
pub struct CookieBackend {
    jar: Arc<dyn CookieJar>,
    domain: Option<String>,
}

impl CookieBackend {
    pub fn new(jar: Arc<dyn CookieJar>, domain: Option<&str>) -> Self {
        Self {
            jar,
            domain: domain.map(ToString::to_string),
        }
    }

    fn with_domain(&self, mut cookie: String) -> String {
        if let Some(domain) = &self.domain {
            cookie.push_str("; domain=");
            cookie.push_str(domain);
        }
        cookie
    }

    fn pairs(&self) -> StorageResult<Vec<(String, String)>> {
        let header = self.jar.cookie_string()?;
        Ok(header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.to_string(), value.to_string()))
            })
            .collect())
    }
}

impl std::fmt::Debug for CookieBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieBackend")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl StorageBackend for CookieBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cookie
    }

    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let name = encode(key);
        match self.pairs()?.into_iter().find(|(n, _)| *n == name) {
            Some((_, value)) => decode(&value).map(Some),
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &str, expires_at: i64) -> StorageResult<()> {
        if value.len() > MAX_COOKIE_PAYLOAD {
            return Err(StorageError::PayloadTooLarge {
                size: value.len(),
                limit: MAX_COOKIE_PAYLOAD,
            });
        }

        let mut cookie = format!("{}={}; path=/; SameSite=Lax", encode(key), encode(value));
        if expires_at > 0 {
            if let Some(expires) = format_expires(expires_at) {
                cookie.push_str("; expires=");
                cookie.push_str(&expires);
            }
        }
        self.jar.set_cookie(&self.with_domain(cookie))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let cookie = format!("{}=; expires={EXPIRED_DATE}; path=/", encode(key));
        self.jar.set_cookie(&self.with_domain(cookie))
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.pairs()?
            .into_iter()
            .map(|(name, _)| decode(&name))
            .collect()
    }
}
