//! Per-retailer handlers.
//!
//! A handler recognises its retailer's URLs, pulls listings out of a parsed
//! page through ordered fallback selectors, and grafts rating widgets next to
//! the listings it found.

pub mod bokelai;
pub mod kobo;
pub mod pchome;
pub mod taaze;

pub use bokelai::BokelaiHandler;
pub use kobo::KoboHandler;
pub use pchome::PchomeHandler;
pub use taaze::TaazeHandler;

use ego_tree::NodeId;
use tracing::{trace, warn};

use crate::app::Result;
use crate::dom::{InsertPosition, Page};
use crate::domain::{BookData, GoodreadsRating};
use crate::render::WRAPPER_SELECTOR;
use crate::text::BookFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    /// The main book of a product page
    Detail,
    /// A book card in a list, carousel or search result
    ListItem,
}

/// A book found on a page together with the element it was read from
#[derive(Debug, Clone)]
pub struct Listing {
    pub container: NodeId,
    pub kind: ListingKind,
    pub book: BookData,
}

impl Listing {
    pub fn detail(container: NodeId, book: BookData) -> Self {
        Self {
            container,
            kind: ListingKind::Detail,
            book,
        }
    }

    pub fn list_item(container: NodeId, book: BookData) -> Self {
        Self {
            container,
            kind: ListingKind::ListItem,
            book,
        }
    }
}

pub trait RetailerHandler: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, url: &str) -> bool;

    /// Collect every unprocessed listing on the page, marking their containers
    fn extract(&self, page: &mut Page) -> Vec<Listing>;

    /// Insert a widget for `rating` next to `listing`; false when nothing was inserted
    fn render(&self, page: &mut Page, listing: &Listing, rating: &GoodreadsRating) -> Result<bool>;
}

/// A candidate insertion point: a selector inside the container (or the
/// container itself) and where the widget goes relative to it
#[derive(Debug, Clone, Copy)]
pub struct InsertionStrategy {
    pub selector: Option<&'static str>,
    pub position: InsertPosition,
}

impl InsertionStrategy {
    pub const fn at(selector: &'static str, position: InsertPosition) -> Self {
        Self {
            selector: Some(selector),
            position,
        }
    }

    pub const fn container(position: InsertPosition) -> Self {
        Self {
            selector: None,
            position,
        }
    }
}

/// Where to look for an already inserted widget before inserting another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    None,
    Target,
    TargetOrParent,
}

fn already_rendered(page: &Page, target: NodeId, check: DuplicateCheck) -> bool {
    match check {
        DuplicateCheck::None => false,
        DuplicateCheck::Target => page.contains_selector(target, WRAPPER_SELECTOR),
        DuplicateCheck::TargetOrParent => {
            page.contains_selector(target, WRAPPER_SELECTOR)
                || page
                    .parent_element(target)
                    .map(|parent| page.contains_selector(parent, WRAPPER_SELECTOR))
                    .unwrap_or(false)
        }
    }
}

/// Insert `markup` at the first strategy whose target exists.
///
/// An existing widget at that target stops the search without inserting.
pub(crate) fn insert_with_strategies(
    page: &mut Page,
    container: NodeId,
    strategies: &[InsertionStrategy],
    check: DuplicateCheck,
    markup: &str,
    handler: &str,
) -> Result<bool> {
    for strategy in strategies {
        let target = match strategy.selector {
            Some(selector) => page.select_first(Some(container), &[selector]),
            None => Some(container),
        };
        let Some(target) = target else {
            continue;
        };

        if already_rendered(page, target, check) {
            trace!("{}: rating already present, skipping insertion", handler);
            return Ok(false);
        }

        page.insert_adjacent_html(target, strategy.position, markup)?;
        return Ok(true);
    }

    warn!("{}: no suitable insertion point found", handler);
    Ok(false)
}

/// Containers of every link matching `link_selector`.
///
/// Each entry of `closest_chain` is tried in turn before falling back to the
/// link's parent. `include` sees the link and its container. Processed and
/// repeated containers are dropped, first-seen order is kept.
pub(crate) fn list_containers<F>(
    page: &Page,
    link_selector: &str,
    closest_chain: &[&str],
    include: F,
) -> Vec<NodeId>
where
    F: Fn(&Page, NodeId, NodeId) -> bool,
{
    let mut containers: Vec<NodeId> = Vec::new();

    for link in page.select_ids(None, link_selector) {
        let container = closest_chain
            .iter()
            .find_map(|selector| page.closest(link, selector))
            .or_else(|| page.parent_element(link));
        let Some(container) = container else {
            continue;
        };

        if !include(page, link, container) {
            continue;
        }
        if page.is_processed(container) || containers.contains(&container) {
            continue;
        }
        containers.push(container);
    }

    containers
}

/// Category facts a breadcrumb entry implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryInfo {
    pub language: &'static str,
    pub format: BookFormat,
    pub is_magazine: bool,
}

impl CategoryInfo {
    pub const fn new(language: &'static str, format: BookFormat, is_magazine: bool) -> Self {
        Self {
            language,
            format,
            is_magazine,
        }
    }
}

/// First table entry (in table order) whose key appears in any breadcrumb
pub(crate) fn resolve_category(
    table: &[(&str, CategoryInfo)],
    breadcrumbs: &[String],
) -> Option<CategoryInfo> {
    table
        .iter()
        .find(|(key, _)| breadcrumbs.iter().any(|crumb| crumb.contains(key)))
        .map(|(_, info)| *info)
}

/// Texts of every element matching `selector` under `scope`
pub(crate) fn texts_of(page: &Page, scope: NodeId, selector: &str) -> Vec<String> {
    page.select_ids(Some(scope), selector)
        .into_iter()
        .map(|id| page.text_of(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const HTML: &str = r#"<html><body>
        <ul>
            <li class="item"><a href="/products/1">One</a><h4>One</h4></li>
            <li class="item"><a href="/products/1">One again</a></li>
            <li><span><a href="/products/2">Two</a></span></li>
        </ul>
        <div class="loose"><a href="/products/3">Three</a></div>
    </body></html>"#;

    fn page() -> Page {
        Page::parse(Url::parse("https://www.books.com.tw/").unwrap(), HTML)
    }

    #[test]
    fn test_list_containers_follows_chain_and_dedups() {
        let mut page = page();
        let containers = list_containers(&page, "a[href*=\"/products/\"]", &[".item", "li"], |_, _, _| true);
        assert_eq!(containers.len(), 4);
        assert!(page.has_class(containers[0], "item"));
        assert!(page.has_class(containers[3], "loose"));

        page.mark_processed(containers[0]);
        let again = list_containers(&page, "a[href*=\"/products/\"]", &[".item", "li"], |_, _, _| true);
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn test_list_containers_filter() {
        let page = page();
        let containers = list_containers(&page, "a", &[".item"], |page, _, container| {
            page.has_class(container, "item")
        });
        assert_eq!(containers.len(), 2);
    }

    #[test]
    fn test_insert_with_strategies_skips_existing_widget() {
        let mut page = page();
        let item = page.select_first(None, &[".item"]).unwrap();
        let strategies = [
            InsertionStrategy::at(".missing", InsertPosition::AfterEnd),
            InsertionStrategy::container(InsertPosition::BeforeEnd),
        ];
        let markup = r#"<div class="bra-rating-wrapper">x</div>"#;

        let inserted = insert_with_strategies(&mut page, item, &strategies, DuplicateCheck::Target, markup, "test").unwrap();
        assert!(inserted);
        let inserted = insert_with_strategies(&mut page, item, &strategies, DuplicateCheck::Target, markup, "test").unwrap();
        assert!(!inserted);
        assert_eq!(page.to_html().matches("bra-rating-wrapper").count(), 1);
    }

    #[test]
    fn test_insert_with_strategies_checks_parent() {
        let mut page = page();
        let item = page.select_first(None, &[".item"]).unwrap();
        let h4 = page.select_first(Some(item), &["h4"]).unwrap();
        page.insert_adjacent_html(h4, InsertPosition::AfterEnd, r#"<div class="bra-rating-wrapper"></div>"#)
            .unwrap();

        let strategies = [InsertionStrategy::at("h4", InsertPosition::AfterEnd)];
        let markup = r#"<div class="bra-rating-wrapper">x</div>"#;
        let inserted = insert_with_strategies(&mut page, item, &strategies, DuplicateCheck::Target, markup, "test").unwrap();
        assert!(inserted);

        let inserted = insert_with_strategies(&mut page, item, &strategies, DuplicateCheck::TargetOrParent, markup, "test").unwrap();
        assert!(!inserted);
    }

    #[test]
    fn test_resolve_category_uses_table_order() {
        let table = [
            ("雜誌", CategoryInfo::new("zh-TW", BookFormat::Physical, true)),
            ("中文書", CategoryInfo::new("zh-TW", BookFormat::Physical, false)),
        ];
        let crumbs = vec!["首頁".to_string(), "中文書".to_string(), "商業雜誌".to_string()];
        assert!(resolve_category(&table, &crumbs).unwrap().is_magazine);
        assert_eq!(resolve_category(&table, &["首頁".to_string()]), None);
    }
}
