//! Candidate URL construction.
//!
//! Pure string assembly from a target, a word and the scan mode. No
//! normalisation beyond what each mode describes, so the same inputs
//! always give the same URL.

use spray_core::ScanMode;

/// Build the URL to probe for `word` against `target`.
///
/// - `Wildcards`: every `*` in the target is replaced by the word verbatim.
/// - `Directories`: target and word joined by exactly one `/`.
/// - `Subdomains`: `https://{word}.{domain}`, where the domain is the target
///   with its scheme and path removed.
#[must_use]
pub fn build_url(target: &str, word: &str, mode: ScanMode) -> String {
    match mode {
        ScanMode::Wildcards => target.replace('*', word),
        ScanMode::Directories => format!(
            "{}/{}",
            target.trim_end_matches('/'),
            word.trim_start_matches('/')
        ),
        ScanMode::Subdomains => format!("https://{}.{}", word, bare_domain(target)),
    }
}

/// Strip the scheme and anything from the first `/` on.
fn bare_domain(target: &str) -> &str {
    let rest = target
        .strip_prefix("https://")
        .or_else(|| target.strip_prefix("http://"))
        .unwrap_or(target);
    rest.split('/').next().unwrap_or(rest)
}
