//! Navigation tokens for SPA route locations.
//!
//! A token summarizes where a navigation ended up: either the URL carried a
//! `redirect` query parameter (the token is the URL with that value replaced
//! by [`REDIRECT`]) or it did not (the token is [`NO_REDIRECT`]). Route
//! classification compares these tokens, so the sentinel strings are part of
//! the contract and must not change.

use url::form_urlencoded;

pub const BLANK_PAGE: &str = "about:blank";
pub const REDIRECT: &str = "{REDIRECT}";
pub const NO_REDIRECT: &str = "{NO_REDIRECT}";

const REDIRECT_PARAM: &str = "redirect";

/// Tokenize a location into `(base_uri, token)`.
///
/// ```
/// use jshunter_scanner::token::tokenize;
///
/// let (base, token) = tokenize("https://x.com/#/login?redirect=%2FauditDetail");
/// assert_eq!(base, "https://x.com/#/login");
/// assert_eq!(token, "https://x.com/#/login?redirect={REDIRECT}");
/// ```
pub fn tokenize(url: &str) -> (String, String) {
    // Redirect targets are frequently double encoded
    let original = if url.contains("%2F") {
        url.replace("%2F", "/")
    } else {
        url.to_string()
    };

    // Hash routes parse as an ordinary path once the fragment marker is gone
    let collapsed = if original.contains("/#/") {
        original.replacen("/#/", "/", 1)
    } else {
        original.clone()
    };

    if has_redirect_param(&collapsed)
        && let Some(templated) = template_redirect(&original)
    {
        let base_uri = truncate_at_query(&templated).to_string();
        return (base_uri, templated);
    }

    (truncate_at_query(&original).to_string(), NO_REDIRECT.to_string())
}

/// Base URL that client-side routes hang off, derived from a first-visit href.
///
/// `http://example.com/#/login` becomes `http://example.com/#/`; locations
/// without a fragment keep their path and gain a trailing slash.
pub fn route_base_url(href: &str) -> String {
    if let Some(index) = href.find('#') {
        return format!("{}#/", &href[..index]);
    }

    let mut base = truncate_at_query(href).to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// A route is reported when the navigation was not redirected, did not land
/// on a blank tab, and ended somewhere other than where the target's own
/// first visit landed.
pub fn is_broken_access(
    token: &str,
    observed_base: &str,
    observed_href: &str,
    first_visit_href: &str,
) -> bool {
    token == NO_REDIRECT && observed_base != BLANK_PAGE && observed_href != first_visit_href
}

fn truncate_at_query(url: &str) -> &str {
    match url.find('?') {
        Some(index) => &url[..index],
        None => url,
    }
}

/// Query component as a URL parser sees it: a `?` inside the fragment does
/// not start a query.
fn query_of(url: &str) -> Option<&str> {
    let before_fragment = match url.find('#') {
        Some(end) => &url[..end],
        None => url,
    };
    let start = before_fragment.find('?')? + 1;
    Some(&before_fragment[start..])
}

/// Only the first `redirect` value counts; a later one never rescues an empty first.
fn has_redirect_param(url: &str) -> bool {
    query_of(url)
        .and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == REDIRECT_PARAM)
                .map(|(_, value)| !value.is_empty())
        })
        .unwrap_or(false)
}

/// Replace the literal value of the first `redirect` parameter.
fn template_redirect(url: &str) -> Option<String> {
    let query_start = url.find('?')? + 1;
    let (head, query) = url.split_at(query_start);

    let mut offset = 0;
    for pair in query.split(['&', '#']) {
        if let Some(value) = pair.strip_prefix("redirect=") {
            if value.is_empty() {
                return None;
            }
            let value_start = offset + "redirect=".len();
            let value_end = value_start + value.len();
            return Some(format!(
                "{}{}{}{}",
                head,
                &query[..value_start],
                REDIRECT,
                &query[value_end..]
            ));
        }
        offset += pair.len() + 1;
    }
    None
}
