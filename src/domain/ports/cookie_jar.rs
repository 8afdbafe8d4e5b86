use crate::domain::errors::StorageResult;

/// The document cookie interface.
///
/// Mirrors the browser's `document.cookie` accessor pair: reading yields
/// every visible cookie as `name=value` pairs joined by `"; "`, writing
/// takes one set-cookie string with attributes.
pub trait CookieJar: Send + Sync {
    /// Visible cookies, e.g. `"a=1; b=2"`
    fn cookie_string(&self) -> StorageResult<String>;

    /// Apply one set-cookie string, e.g. `"a=1; path=/; SameSite=Lax"`
    fn set_cookie(&self, cookie: &str) -> StorageResult<()>;
}
