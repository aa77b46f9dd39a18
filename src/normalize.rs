use regex::Regex;
use std::sync::LazyLock;

/// URL scheme of the extension's own pages. Nothing under it is ever a
/// blocking candidate, and rules exclude it as an initiator so the warning
/// page cannot retrigger a redirect.
pub const EXTENSION_SCHEME: &str = "chrome-extension://";

// Registrable host: optional http(s) scheme, optional leading www., at least
// one dot, a 2+ letter top-level label, optional port and path.
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})(?::\d+)?(?:/.*)?$")
        .expect("domain pattern is valid")
});

/// Canonicalizes a URL-like or bare-domain string to a lowercase registrable
/// host. Scheme, a leading `www.`, port and path are stripped. Returns `None`
/// for extension-internal URLs and anything that does not look like a domain.
pub fn normalize(input: &str) -> Option<String> {
    let input = input.trim();
    if input.starts_with(EXTENSION_SCHEME) {
        return None;
    }
    DOMAIN_RE
        .captures(input)
        .map(|caps| caps[1].to_ascii_lowercase())
}
