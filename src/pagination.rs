//! Listing-page discovery for HTML sources and the page cursor for the API source.

use reqwest::Url;
use scraper::{Html, Selector};

/// Every listing page of a paginated source, seed first.
///
/// The page count is the number of elements `control` matches; pages after the
/// first are addressed as `?page=k` relative to the seed. A missing or empty
/// control yields just the seed.
pub fn discover_pages(seed_url: &str, document: &Html, control: &Selector) -> Vec<String> {
    let count = document.select(control).count();
    let mut pages = vec![seed_url.to_string()];
    let Ok(seed) = Url::parse(seed_url) else {
        return pages;
    };
    for page_number in 2..=count {
        if let Ok(url) = seed.join(&format!("?page={page_number}")) {
            pages.push(url.to_string());
        }
    }
    pages
}

/// Next API page to request, or `None` once the last page has been seen.
pub fn next_cursor(page_num: u32, total_pages: u32) -> Option<u32> {
    if page_num >= total_pages {
        None
    } else {
        Some(page_num + 1)
    }
}

/// Absolute URL of a "next page" link, for listings that chain pages by link.
pub fn next_link(page_url: &str, document: &Html, link: &Selector) -> Option<String> {
    let href = document.select(link).next()?.value().attr("href")?;
    let base = Url::parse(page_url).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> Selector {
        Selector::parse(".pagination-nav li").unwrap()
    }

    #[test]
    fn test_discover_pages_from_control_count() {
        let html = Html::parse_document(
            r#"<ul class="pagination-nav"><li>1</li><li>2</li><li>3</li></ul>"#,
        );
        let seed = "http://www.ticketweb.com/venue/warsaw-brooklyn-ny/22869";
        let pages = discover_pages(seed, &html, &control());
        assert_eq!(
            pages,
            vec![
                "http://www.ticketweb.com/venue/warsaw-brooklyn-ny/22869",
                "http://www.ticketweb.com/venue/warsaw-brooklyn-ny/22869?page=2",
                "http://www.ticketweb.com/venue/warsaw-brooklyn-ny/22869?page=3",
            ]
        );
        // Same input, same answer
        assert_eq!(pages, discover_pages(seed, &html, &control()));
    }

    #[test]
    fn test_discover_pages_without_control_is_seed_only() {
        let html = Html::parse_document("<div class=\"event-list\"></div>");
        let pages = discover_pages("http://www.ticketweb.com/venue/x/1", &html, &control());
        assert_eq!(pages, vec!["http://www.ticketweb.com/venue/x/1"]);
    }

    #[test]
    fn test_cursor_visits_exactly_total_pages() {
        for total in [1u32, 2, 5] {
            let mut visited = vec![1u32];
            let mut page = 1;
            while let Some(next) = next_cursor(page, total) {
                visited.push(next);
                page = next;
            }
            assert_eq!(visited, (1..=total).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_cursor_stops_on_miscounted_total() {
        assert_eq!(next_cursor(1, 0), None);
        assert_eq!(next_cursor(4, 3), None);
        assert_eq!(next_cursor(2, 3), Some(3));
    }

    #[test]
    fn test_next_link_resolves_relative_href() {
        let html = Html::parse_document(r#"<a class="next" href="tickets.html?p=2">Next</a>"#);
        let link = Selector::parse("a.next").unwrap();
        assert_eq!(
            next_link("http://www.citywinery.com/newyork/tickets.html?p=1", &html, &link),
            Some("http://www.citywinery.com/newyork/tickets.html?p=2".to_string())
        );
        let empty = Html::parse_document("<p>last page</p>");
        assert_eq!(next_link("http://www.citywinery.com/", &empty, &link), None);
    }
}
