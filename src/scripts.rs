//! Page-side fingerprint filtering.
//!
//! The host injects a content script into every visited page; this module
//! holds the decision logic it applies to `<script>` elements. Matches are
//! removed from the document and reported as `blockedScript` messages.

/// Flags script elements that look like fingerprinting code: an external
/// source mentioning `fingerprint`, or an inline body calling a
/// `Fingerprint` API.
pub fn is_fingerprinting_script(src: &str, body: &str) -> bool {
    src.contains("fingerprint") || body.contains("Fingerprint")
}

/// Removes matching `<script>` elements from an HTML document. Returns the
/// stripped document and the sources that were dropped (`inline` for
/// elements without a `src` attribute).
pub fn strip_fingerprinting_scripts(html: &str) -> (String, Vec<String>) {
    let mut output = String::with_capacity(html.len());
    let mut removed = Vec::new();
    let mut rest = html;

    loop {
        let Some(open) = find_ci(rest, "<script") else {
            output.push_str(rest);
            break;
        };
        let tail = &rest[open..];
        let (Some(tag_end), Some(close)) = (tail.find('>'), find_ci(tail, "</script>")) else {
            output.push_str(rest);
            break;
        };
        if close < tag_end {
            // Malformed markup; leave the remainder untouched.
            output.push_str(rest);
            break;
        }
        let element_end = close + "</script>".len();

        let open_tag = &tail[..tag_end + 1];
        let body = &tail[tag_end + 1..close];
        let src = extract_src(open_tag).unwrap_or_default();

        if is_fingerprinting_script(&src, body) {
            output.push_str(&rest[..open]);
            removed.push(if src.is_empty() {
                "inline".to_string()
            } else {
                src
            });
        } else {
            output.push_str(&rest[..open + element_end]);
        }
        rest = &tail[element_end..];
    }

    (output, removed)
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

fn extract_src(open_tag: &str) -> Option<String> {
    let lower = open_tag.to_ascii_lowercase();
    let pos = lower.find("src=")?;
    let value = &open_tag[pos + 4..];
    let mut chars = value.chars();
    match chars.next()? {
        quote @ ('"' | '\'') => value[1..].split(quote).next().map(str::to_string),
        _ => value.split([' ', '>']).next().map(str::to_string),
    }
}
