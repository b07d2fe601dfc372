//! Same-domain link discovery.
//!
//! Breadth-first over a FIFO queue of `(url, depth)`. Deduplication happens at
//! dequeue time through the visited set, so a URL may sit in the queue more
//! than once; every dequeue after the first is a no-op.

use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};
use url::Url;

use crate::fetcher::PageFetcher;

/// Host plus explicit port. Default ports are dropped by `Url`, so
/// `http://a.com` and `http://a.com:80` share a location.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NetLoc {
    host: Option<String>,
    port: Option<u16>,
}

impl NetLoc {
    fn of(url: &Url) -> Self {
        Self {
            host: url.host_str().map(str::to_string),
            port: url.port(),
        }
    }
}

/// Discovers the pages of a site reachable within a depth bound.
pub struct SiteCrawler<F> {
    fetcher: F,
}

impl<F: PageFetcher> SiteCrawler<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Every URL reached from `seed_url` within `max_depth` hops, staying on
    /// the seed's network location. The seed itself is always included.
    pub async fn crawl(&self, seed_url: &str, max_depth: usize) -> HashSet<String> {
        info!(seed = %seed_url, max_depth, "Starting crawl");

        let seed_location = Url::parse(seed_url).ok().map(|u| NetLoc::of(&u));

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((seed_url.to_string(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if visited.contains(&current) || depth > max_depth {
                continue;
            }
            visited.insert(current.clone());

            let Some(html) = self.fetcher.fetch(&current).await else {
                debug!(url = %current, depth, "No content, treating as leaf");
                continue;
            };

            let Some(seed_location) = seed_location.as_ref() else {
                continue;
            };

            let links = same_location_links(&current, &html, seed_location);
            debug!(url = %current, depth, links = links.len(), "Discovered links");

            for link in links {
                if !visited.contains(&link) {
                    queue.push_back((link, depth + 1));
                }
            }
        }

        info!(seed = %seed_url, pages = visited.len(), "Crawl completed");
        visited
    }

    /// Crawl each seed and merge the results.
    pub async fn crawl_all(&self, seeds: &[String], max_depth: usize) -> HashSet<String> {
        let mut found = HashSet::new();
        for seed in seeds {
            found.extend(self.crawl(seed, max_depth).await);
        }
        found
    }
}

/// Resolve every `<a href>` in `html` against `page_url`, keeping only
/// targets on `location`.
fn same_location_links(page_url: &str, html: &str, location: &NetLoc) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|url| NetLoc::of(url) == *location)
        .map(|url| url.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    #[tokio::test]
    async fn test_crawl_site_depth_one() {
        let fetcher = MockFetcher::new()
            .with_page(
                "http://test.com",
                r#"<html><body><a href="/page1">Page1</a></body></html>"#,
            )
            .with_page(
                "http://test.com/page1",
                "<html><body>No links here</body></html>",
            );

        let result = SiteCrawler::new(&fetcher).crawl("http://test.com", 1).await;

        let expected: HashSet<String> = ["http://test.com", "http://test.com/page1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(result, expected);
    }

    #[tokio::test]
    async fn test_depth_zero_only_returns_seed() {
        let fetcher = MockFetcher::new().with_page(
            "http://test.com",
            r#"<a href="/page1">Page1</a>"#,
        );

        let result = SiteCrawler::new(&fetcher).crawl("http://test.com", 0).await;
        assert_eq!(result.len(), 1);
        assert!(result.contains("http://test.com"));
        // page1 was discovered at depth 1 but never fetched
        assert_eq!(fetcher.fetch_count("http://test.com/page1"), 0);
    }

    #[tokio::test]
    async fn test_failed_seed_is_still_found() {
        let fetcher = MockFetcher::new();
        let result = SiteCrawler::new(&fetcher).crawl("http://down.com", 2).await;
        assert_eq!(result.len(), 1);
        assert!(result.contains("http://down.com"));
    }

    #[tokio::test]
    async fn test_foreign_hosts_and_ports_are_excluded() {
        let fetcher = MockFetcher::new().with_page(
            "http://test.com/",
            r#"
                <a href="http://other.com/x">other</a>
                <a href="https://sub.test.com/y">sub</a>
                <a href="http://test.com:8080/z">port</a>
                <a href="//test.com/proto">protocol relative</a>
                <a href="mailto:team@test.com">mail</a>
                <a href="about?tab=1#top">relative</a>
            "#,
        );

        let result = SiteCrawler::new(&fetcher).crawl("http://test.com/", 1).await;

        let expected: HashSet<String> = [
            "http://test.com/",
            "http://test.com/proto",
            "http://test.com/about?tab=1#top",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(result, expected);
    }

    #[tokio::test]
    async fn test_cycles_are_visited_once() {
        let fetcher = MockFetcher::new()
            .with_page("http://a.com/", r#"<a href="/b">b</a><a href="/c">c</a>"#)
            .with_page("http://a.com/b", r#"<a href="/c">c</a><a href="/">home</a>"#)
            .with_page("http://a.com/c", r#"<a href="/b">b</a><a href="/">home</a>"#);

        let result = SiteCrawler::new(&fetcher).crawl("http://a.com/", 5).await;

        assert_eq!(result.len(), 3);
        for url in ["http://a.com/", "http://a.com/b", "http://a.com/c"] {
            assert_eq!(fetcher.fetch_count(url), 1, "{url} fetched more than once");
        }
    }

    #[tokio::test]
    async fn test_crawl_all_merges_seeds() {
        let fetcher = MockFetcher::new()
            .with_page("http://a.com/", r#"<a href="/x">x</a>"#)
            .with_page("http://b.com/", r#"<a href="/y">y</a>"#);

        let seeds = vec!["http://a.com/".to_string(), "http://b.com/".to_string()];
        let result = SiteCrawler::new(&fetcher).crawl_all(&seeds, 1).await;

        assert_eq!(result.len(), 4);
        assert!(result.contains("http://a.com/x"));
        assert!(result.contains("http://b.com/y"));
    }

    #[test]
    fn test_link_resolution_follows_url_join_rules() {
        let location = NetLoc::of(&Url::parse("http://test.com").unwrap());
        let links = same_location_links(
            "http://test.com/dir/page",
            r#"<a href="sibling">s</a><a href="../up">u</a><a href="?q=1">q</a><a href="">self</a>"#,
            &location,
        );
        assert_eq!(
            links,
            vec![
                "http://test.com/dir/sibling",
                "http://test.com/up",
                "http://test.com/dir/page?q=1",
                "http://test.com/dir/page",
            ]
        );
    }
}
