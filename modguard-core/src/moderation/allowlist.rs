//! URL canonicalization and allowlist matching for the link policy.
//!
//! Two links are "the same" when their canonical strings are equal:
//! lower-cased host without `www.`, https scheme, trailing `/` trimmed,
//! query pairs sorted and re-encoded, fragment dropped.

use std::fmt;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use url::{form_urlencoded, Url};

/// Characters that commonly trail a link in prose and are never part of it.
pub const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '\'', '"'];

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").expect("Invalid scheme regex"));

static BARE_DOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9.\-]+\.[a-z]{2,}$").expect("Invalid domain regex"));

/// Comparison-ready form of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalUrl {
    host: String,
    canonical: String,
}

impl CanonicalUrl {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// One allowlist line after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowlistEntry {
    /// Matches the host itself and any subdomain of it.
    Domain(String),
    /// Matches only this exact canonical URL.
    Url(String),
}

impl AllowlistEntry {
    pub fn matches(&self, url: &CanonicalUrl) -> bool {
        match self {
            AllowlistEntry::Domain(domain) => {
                url.host == *domain
                    || url
                        .host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
            AllowlistEntry::Url(canonical) => url.canonical == *canonical,
        }
    }
}

/// Drops whitespace and trailing prose punctuation.
pub fn strip_trailing_punctuation(raw: &str) -> &str {
    raw.trim().trim_end_matches(TRAILING_PUNCTUATION)
}

/// Prefixes `https://` when the token carries no scheme of its own.
pub fn with_default_scheme(token: &str) -> String {
    if SCHEME_PREFIX.is_match(token) {
        token.to_string()
    } else {
        format!("https://{}", token)
    }
}

/// Canonicalizes a link. `None` for anything that is not an http(s) URL with a host.
pub fn normalize(raw: &str) -> Option<CanonicalUrl> {
    let cleaned = strip_trailing_punctuation(raw);
    if cleaned.is_empty() {
        return None;
    }

    let parsed = Url::parse(&with_default_scheme(cleaned)).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        return None;
    }

    let mut canonical = format!("https://{}", host);
    if let Some(port) = parsed.port() {
        canonical.push_str(&format!(":{}", port));
    }
    canonical.push_str(parsed.path().trim_end_matches('/'));

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !pairs.is_empty() {
        pairs.sort();
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &pairs {
            serializer.append_pair(key, value);
        }
        canonical.push('?');
        canonical.push_str(&serializer.finish());
    }

    Some(CanonicalUrl { host, canonical })
}

/// Bare domains (`example.com`) become [`AllowlistEntry::Domain`]; anything
/// with a path, query, fragment or port is canonicalized as a full URL.
pub fn normalize_allowlist_entry(raw: &str) -> Option<AllowlistEntry> {
    let cleaned = strip_trailing_punctuation(raw);
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.contains(&['/', '?', '#', ':'][..]) {
        return normalize(cleaned).map(|c| AllowlistEntry::Url(c.canonical));
    }

    let domain = cleaned.to_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
    if BARE_DOMAIN.is_match(domain) {
        Some(AllowlistEntry::Domain(domain.to_string()))
    } else {
        None
    }
}

/// Pre-normalized allowlist. Empty means every link is denied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    entries: Vec<AllowlistEntry>,
}

impl Allowlist {
    /// Normalizes every raw line; invalid ones are dropped with a warning.
    pub fn compile<S: AsRef<str>>(raw_entries: &[S]) -> Self {
        let mut entries = Vec::with_capacity(raw_entries.len());
        for raw in raw_entries {
            let raw = raw.as_ref();
            match normalize_allowlist_entry(raw) {
                Some(entry) => {
                    if !entries.contains(&entry) {
                        entries.push(entry);
                    }
                }
                None => warn!("Allowlist: ignoring invalid entry '{}'", raw),
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[AllowlistEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Default-deny: unparsable links and an empty list both answer `false`.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Some(canonical) = normalize(url) else {
            return false;
        };
        self.entries.iter().any(|entry| entry.matches(&canonical))
    }
}

/// Free-function form of [`Allowlist::is_allowed`].
pub fn is_allowed(url: &str, allowlist: &Allowlist) -> bool {
    allowlist.is_allowed(url)
}
