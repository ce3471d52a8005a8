//! Pulls link-like tokens out of free-form chat text.
//!
//! Three token classes are matched independently:
//!   * scheme URLs   `http://…` / `https://…`
//!   * www URLs      `www.…`
//!   * bare domains  `label.label.tld[:port][/path?query]`, alphabetic TLD only
//!
//! Bare-domain hits that look like a command toggle (`spamfilter.on`,
//! `!linkfilter.off`) are not links.

use std::ops::Range;
use once_cell::sync::Lazy;
use regex::Regex;
use crate::moderation::allowlist::{strip_trailing_punctuation, with_default_scheme, TRAILING_PUNCTUATION};

static SCHEME_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhttps?://[^\s<>\[\]()]+").expect("Invalid scheme URL regex"));

static WWW_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwww\.[^\s<>\[\]()]+").expect("Invalid www URL regex"));

static BARE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?\.)+[a-z]{2,}\b(?::\d{1,5})?(?:/[^\s<>\[\]()]*)?",
    )
    .expect("Invalid bare domain regex")
});

static TOGGLE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9_\-]+\.(?:on|off)$").expect("Invalid toggle regex"));

/// Characters that introduce a chat command.
pub const COMMAND_PREFIXES: &[char] = &['!', '/', '~', '$', '#'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTokenKind {
    SchemeUrl,
    WwwUrl,
    BareDomain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken {
    pub kind: LinkTokenKind,
    /// Text as it appeared in the message.
    pub raw: String,
    /// Punctuation stripped, scheme defaulted. Ready for the allowlist.
    pub candidate: String,
}

/// Every distinct link-like token in `text`.
pub fn extract_link_tokens(text: &str) -> Vec<LinkToken> {
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut tokens: Vec<LinkToken> = Vec::new();

    for (kind, pattern) in [
        (LinkTokenKind::SchemeUrl, &*SCHEME_URL),
        (LinkTokenKind::WwwUrl, &*WWW_URL),
        (LinkTokenKind::BareDomain, &*BARE_DOMAIN),
    ] {
        let mut found = Vec::new();
        for m in pattern.find_iter(text) {
            let span = m.range();
            if claimed.iter().any(|c| c.start < span.end && span.start < c.end) {
                continue;
            }
            if kind == LinkTokenKind::BareDomain && is_command_toggle(text, span.clone()) {
                continue;
            }

            let cleaned = strip_trailing_punctuation(m.as_str());
            if cleaned.is_empty() {
                continue;
            }
            let candidate = with_default_scheme(cleaned);
            if !tokens.iter().any(|t| t.candidate == candidate) {
                tokens.push(LinkToken {
                    kind,
                    raw: m.as_str().to_string(),
                    candidate,
                });
            }
            found.push(span);
        }
        claimed.extend(found);
    }

    tokens
}

/// `word.on` / `word.off` that stands alone or directly follows a command prefix.
pub fn is_command_toggle(text: &str, span: Range<usize>) -> bool {
    let token = &text[span.clone()];
    if !TOGGLE_SHAPE.is_match(token) {
        return false;
    }

    let before = text[..span.start].chars().next_back();
    let after = text[span.end..].chars().next();

    let starts_clean = match before {
        None => true,
        Some(c) => c.is_whitespace() || COMMAND_PREFIXES.contains(&c),
    };
    let ends_clean = match after {
        None => true,
        Some(c) => c.is_whitespace() || TRAILING_PUNCTUATION.contains(&c),
    };

    starts_clean && ends_clean
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(text: &str) -> Vec<String> {
        extract_link_tokens(text).into_iter().map(|t| t.candidate).collect()
    }

    #[test]
    fn test_scheme_url_is_one_token() {
        let tokens = extract_link_tokens("look at https://www.example.com/a?b=1, neat");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, LinkTokenKind::SchemeUrl);
        assert_eq!(tokens[0].candidate, "https://www.example.com/a?b=1");
    }

    #[test]
    fn test_www_and_bare_domains() {
        assert_eq!(candidates("go to www.Example.com."), vec!["https://www.Example.com"]);
        assert_eq!(
            candidates("mirror at cdn.example.org:8080/file?x=1)"),
            vec!["https://cdn.example.org:8080/file?x=1"]
        );
    }

    #[test]
    fn test_version_numbers_are_not_links() {
        assert!(candidates("patch 1.0 and 2.15.3 are out").is_empty());
        assert!(candidates("e.g. this").is_empty());
    }

    #[test]
    fn test_toggle_commands_are_not_links() {
        assert!(candidates("!spamfilter.on").is_empty());
        assert!(candidates("enable-mode.on").is_empty());
        assert!(candidates("please run /linkfilter.OFF now").is_empty());
        // a toggle-looking word glued to other text is still a domain
        assert_eq!(candidates("visit=spamfilter.on"), vec!["https://spamfilter.on"]);
    }

    #[test]
    fn test_distinct_tokens_only() {
        let tokens = extract_link_tokens("example.com example.com https://example.com");
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_plain_text_has_no_tokens() {
        assert!(extract_link_tokens("hello chat, how is everyone").is_empty());
        assert!(extract_link_tokens("").is_empty());
    }
}
