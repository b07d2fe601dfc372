//! Property tests for the site crawler over randomly generated link graphs.
//!
//! Every generated site lives on `http://site.test`; each page may link to
//! other pages on the site, to the same path on a foreign host, or to nothing.
//! Some pages fail to fetch and act as leaves.

use proptest::prelude::*;
use std::collections::{HashSet, VecDeque};
use variant_tracker::testing::MockFetcher;
use variant_tracker::SiteCrawler;

const SITE: &str = "http://site.test";
const MAX_PAGES: usize = 10;
const MAX_DEPTH: usize = 4;

#[derive(Debug, Clone)]
struct Page {
    links: Vec<usize>,
    foreign_links: Vec<usize>,
    reachable: bool,
}

#[derive(Debug, Clone)]
struct Site {
    pages: Vec<Page>,
}

impl Site {
    fn url(index: usize) -> String {
        format!("{SITE}/p{index}")
    }

    fn fetcher(&self) -> MockFetcher {
        let fetcher = MockFetcher::new();
        for (i, page) in self.pages.iter().enumerate() {
            if !page.reachable {
                continue;
            }
            let mut body = String::from("<html><body>");
            for target in &page.links {
                body.push_str(&format!(r#"<a href="/p{target}">local</a>"#));
            }
            for target in &page.foreign_links {
                body.push_str(&format!(r#"<a href="http://other.test/p{target}">away</a>"#));
            }
            body.push_str("</body></html>");
            fetcher.set_page(Self::url(i), body);
        }
        fetcher
    }

    /// Pages whose shortest path from p0 is within `depth`, expanding only
    /// through pages that can be fetched.
    fn expected(&self, depth: usize) -> HashSet<String> {
        let mut dist: Vec<Option<usize>> = vec![None; self.pages.len()];
        let mut queue = VecDeque::new();
        dist[0] = Some(0);
        queue.push_back(0);

        while let Some(i) = queue.pop_front() {
            let d = dist[i].unwrap();
            if d == depth || !self.pages[i].reachable {
                continue;
            }
            for &next in &self.pages[i].links {
                if dist[next].is_none() {
                    dist[next] = Some(d + 1);
                    queue.push_back(next);
                }
            }
        }

        dist.iter()
            .enumerate()
            .filter(|(_, d)| d.is_some())
            .map(|(i, _)| Self::url(i))
            .collect()
    }
}

fn site_strategy() -> impl Strategy<Value = Site> {
    (1usize..=MAX_PAGES).prop_flat_map(|n| {
        let page = (
            prop::collection::vec(0..n, 0..4),
            prop::collection::vec(0..n, 0..2),
            prop::bool::weighted(0.85),
        )
            .prop_map(|(links, foreign_links, reachable)| Page {
                links,
                foreign_links,
                reachable,
            });
        prop::collection::vec(page, n).prop_map(|pages| Site { pages })
    })
}

fn crawl(site: &Site, depth: usize) -> (HashSet<String>, MockFetcher) {
    let fetcher = site.fetcher();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let found = runtime.block_on(SiteCrawler::new(&fetcher).crawl(&Site::url(0), depth));
    (found, fetcher)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn crawl_returns_exactly_pages_within_depth(site in site_strategy(), depth in 0usize..=MAX_DEPTH) {
        let (found, _) = crawl(&site, depth);
        prop_assert_eq!(found, site.expected(depth));
    }

    #[test]
    fn crawl_never_leaves_the_seed_host(site in site_strategy(), depth in 0usize..=MAX_DEPTH) {
        let (found, fetcher) = crawl(&site, depth);
        prop_assert!(found.contains(&Site::url(0)));
        prop_assert!(found.iter().all(|u| u.starts_with(SITE)));
        prop_assert!(fetcher.fetched().iter().all(|u| u.starts_with(SITE)));
    }

    #[test]
    fn crawl_fetches_each_page_at_most_once(site in site_strategy(), depth in 0usize..=MAX_DEPTH) {
        let (_, fetcher) = crawl(&site, depth);
        let fetched = fetcher.fetched();
        let unique: HashSet<&String> = fetched.iter().collect();
        prop_assert_eq!(unique.len(), fetched.len());
    }

    #[test]
    fn crawl_is_deterministic(site in site_strategy(), depth in 0usize..=MAX_DEPTH) {
        let (first, _) = crawl(&site, depth);
        let (second, _) = crawl(&site, depth);
        prop_assert_eq!(first, second);
    }
}
