use serde::{Deserialize, Serialize};

/// One entry of the page navigation bar, emitted left to right.
/// `Prev(None)` / `Next(None)` are rendered but not navigable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageLinkToken {
    Prev(Option<u32>),
    PageNumber(u32),
    Ellipsis,
    Current(u32),
    Next(Option<u32>),
}

impl PageLinkToken {
    /// Page this token navigates to, if any.
    pub fn target(&self) -> Option<u32> {
        match *self {
            PageLinkToken::Prev(t) | PageLinkToken::Next(t) => t,
            PageLinkToken::PageNumber(n) => Some(n),
            PageLinkToken::Ellipsis | PageLinkToken::Current(_) => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            PageLinkToken::Prev(_) => "Prev".into(),
            PageLinkToken::Next(_) => "Next".into(),
            PageLinkToken::PageNumber(n) | PageLinkToken::Current(n) => n.to_string(),
            PageLinkToken::Ellipsis => "\u{2026}".into(),
        }
    }
}

/// Current page plus the last page once the listing response resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub page: u32,
    pub last_page: Option<u32>,
}

impl PageState {
    pub fn new(page: u32) -> Self {
        Self { page: page.max(1), last_page: None }
    }

    pub fn tokens(&self) -> Vec<PageLinkToken> {
        compute(self.page, self.last_page)
    }

    pub fn prev(&self) -> Option<u32> {
        self.tokens().first().and_then(|t| t.target())
    }

    pub fn next(&self) -> Option<u32> {
        self.tokens().last().and_then(|t| t.target())
    }
}

/// Page links to show for `page` of `last_page`.
///
/// First, last, current and the immediate neighbours are always present; a gap of
/// exactly one page is filled with that page instead of an ellipsis. An unknown
/// `last_page` is the loading state: only the current page between two disabled arrows.
pub fn compute(page: u32, last_page: Option<u32>) -> Vec<PageLinkToken> {
    let page = page.max(1);
    let Some(last) = last_page else {
        return vec![PageLinkToken::Prev(None), PageLinkToken::Current(page), PageLinkToken::Next(None)];
    };
    // signed so out-of-range requests (page > last) cannot underflow
    let (p, l) = (page as i64, last as i64);
    let mut tokens = Vec::with_capacity(11);

    tokens.push(PageLinkToken::Prev(if page == 1 { None } else { Some(page - 1) }));
    if p > 1 {
        tokens.push(PageLinkToken::PageNumber(1));
    }
    if p - 3 >= 2 {
        tokens.push(PageLinkToken::Ellipsis);
    }
    if p == 4 {
        tokens.push(PageLinkToken::PageNumber(2));
    }
    if p > 2 {
        tokens.push(PageLinkToken::PageNumber(page - 1));
    }
    tokens.push(PageLinkToken::Current(page));
    if p < l {
        tokens.push(PageLinkToken::PageNumber(page + 1));
    }
    if p + 2 == l - 1 {
        tokens.push(PageLinkToken::PageNumber(page + 2));
    }
    if l - (p + 1) > 2 {
        tokens.push(PageLinkToken::Ellipsis);
    }
    if p < l - 1 {
        tokens.push(PageLinkToken::PageNumber(last));
    }
    tokens.push(PageLinkToken::Next(if p < l { Some(page + 1) } else { None }));
    tokens
}

/// Query string for a page link. Every other active parameter is kept verbatim
/// and in order; page 1 is the bare listing, so it carries no `page` parameter.
pub fn page_query(target: u32, other_params: &[(String, String)]) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in other_params.iter().filter(|(k, _)| k != "page") {
        ser.append_pair(k, v);
    }
    if target > 1 {
        ser.append_pair("page", &target.to_string());
    }
    format!("?{}", ser.finish())
}

/// Plain-text navigation bar, e.g. `Prev 1 … 4 [5] 6 … 10 Next`.
pub fn render_text(tokens: &[PageLinkToken]) -> String {
    tokens
        .iter()
        .map(|t| match t {
            PageLinkToken::Current(n) => format!("[{n}]"),
            PageLinkToken::Prev(None) | PageLinkToken::Next(None) => format!("({})", t.label()),
            _ => t.label(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
