use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// rel name -> URL, from an RFC 8288 style `Link` header.
pub type Links = BTreeMap<String, String>;

static RE_LINK: OnceLock<Regex> = OnceLock::new();
static RE_PAGE: OnceLock<Regex> = OnceLock::new();

fn re_link() -> &'static Regex { RE_LINK.get_or_init(|| Regex::new(r#"<([^>]+)>; rel="([^"]+)""#).unwrap()) }
fn re_page() -> &'static Regex { RE_PAGE.get_or_init(|| Regex::new(r"(?:^|[?&])page=(\d+)").unwrap()) }

pub fn parse_link_header(value: &str) -> Links {
    re_link()
        .captures_iter(value)
        .map(|c| (c[2].to_owned(), c[1].to_owned()))
        .collect()
}

/// `page=N` query parameter of a link URL.
pub fn page_param(url: &str) -> Option<u32> {
    re_page().captures(url)?.get(1)?.as_str().parse().ok()
}

/// What the listing response says about the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastPageHint {
    /// Read from a `rel="last"` link, or no further pages exist.
    Exact(u32),
    /// Only a `rel="next"` link was sent; the real count is unknown and at least this.
    AtLeast(u32),
}

impl LastPageHint {
    pub fn page(&self) -> u32 {
        match *self {
            LastPageHint::Exact(p) | LastPageHint::AtLeast(p) => p,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, LastPageHint::Exact(_))
    }
}

pub fn last_page_hint(current: u32, links: Option<&Links>) -> LastPageHint {
    let Some(links) = links else {
        return LastPageHint::Exact(current);
    };
    if let Some(last) = links.get("last").and_then(|u| page_param(u)) {
        return LastPageHint::Exact(last);
    }
    if links.contains_key("next") {
        return LastPageHint::AtLeast(current + 1);
    }
    LastPageHint::Exact(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<http://localhost/api/admin/users?page=1>; rel="prev", <http://localhost/api/admin/users?page=3>; rel="next", <http://localhost/api/admin/users?page=40>; rel="last""#;

    #[test]
    fn parses_every_relation() {
        let links = parse_link_header(HEADER);
        assert_eq!(links.len(), 3);
        assert_eq!(links["next"], "http://localhost/api/admin/users?page=3");
    }

    #[test]
    fn last_relation_is_exact() {
        let links = parse_link_header(HEADER);
        assert_eq!(last_page_hint(2, Some(&links)), LastPageHint::Exact(40));
    }

    #[test]
    fn next_only_approximates_one_more_page() {
        let links = parse_link_header(r#"<https://x/api/admin/users?query=ann&page=6>; rel="next""#);
        let hint = last_page_hint(5, Some(&links));
        assert_eq!(hint, LastPageHint::AtLeast(6));
        assert!(!hint.is_exact());
        assert_eq!(hint.page(), 6);
    }

    #[test]
    fn no_header_means_current_page_is_last() {
        assert_eq!(last_page_hint(1, None), LastPageHint::Exact(1));
        assert_eq!(last_page_hint(3, Some(&Links::new())), LastPageHint::Exact(3));
    }

    #[test]
    fn per_page_is_not_mistaken_for_page() {
        assert_eq!(page_param("https://x/users?per_page=25&page=7"), Some(7));
        assert_eq!(page_param("https://x/users?per_page=25"), None);
    }
}
