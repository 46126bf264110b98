//! The filter module decides which crawled pages are worth sending to the extractor.
//!
//! The decision is a closed-world whitelist over URL path segments: administrative
//! pages are always dropped, and of the remaining pages only those that look like
//! event listings are kept.

/// Path segments of administrative, legal and contact pages.
const DENIED_PATTERNS: &[&str] = &[
    "/impressum",
    "/kontakt",
    "/datenschutz",
    "/agb",
    "/newsletter",
    "/login",
    "/suche",
    "/search",
    "/vermietung",
    "/grundstueck",
    "/ausschreibung",
    "/verwaltung",
    "/rathaus",
    "/satzung",
    "/formulare",
    "/buergerservice",
    "/kontaktformular",
    "/kontakt-",
];

/// Path segments that indicate event content.
const ALLOWED_PATTERNS: &[&str] = &[
    "/veranstalt",
    "/event",
    "/konzert",
    "/markt",
    "/messe",
    "/theater",
    "/festival",
];

/// Returns `true` if the page at `url` should be analyzed for events.
///
/// A deny-list match rejects the page even when an allow-list segment is present,
/// and URLs matching neither list are rejected.
pub fn is_relevant(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    let url = url.to_lowercase();

    if DENIED_PATTERNS.iter().any(|pattern| url.contains(pattern)) {
        return false;
    }

    ALLOWED_PATTERNS.iter().any(|pattern| url.contains(pattern))
}
