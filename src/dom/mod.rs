//! Parsed retailer page with the handful of DOM operations handlers need.
//!
//! Element handles are `ego_tree` node ids, which stay valid while widgets are
//! grafted into the tree, so handlers collect ids first and mutate afterwards.

use std::collections::HashSet;
use std::fmt;

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{trace, warn};
use url::Url;

use crate::app::{BookrateError, Result};

/// Where markup lands relative to the target element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    BeforeBegin,
    AfterBegin,
    BeforeEnd,
    AfterEnd,
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InsertPosition::BeforeBegin => "beforebegin",
            InsertPosition::AfterBegin => "afterbegin",
            InsertPosition::BeforeEnd => "beforeend",
            InsertPosition::AfterEnd => "afterend",
        };
        f.write_str(s)
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| BookrateError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn selector(selector: &str) -> Option<Selector> {
    match parse_selector(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// Text content of an element with surrounding whitespace removed
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub struct Page {
    url: Url,
    html: Html,
    processed: HashSet<NodeId>,
}

impl Page {
    pub fn parse(url: Url, html: &str) -> Self {
        Self {
            url,
            html: Html::parse_document(html),
            processed: HashSet::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn to_html(&self) -> String {
        self.html.html()
    }

    /// `scheme://host[:port]` of the page
    pub fn root_url(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Resolve root-relative hrefs against the page, leave everything else as is
    pub fn ensure_absolute_url(&self, href: &str) -> String {
        if href.starts_with('/') {
            match self.url.join(href) {
                Ok(url) => return url.to_string(),
                Err(e) => trace!("Could not resolve {} against {}: {}", href, self.url, e),
            }
        }
        href.to_string()
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    pub fn body(&self) -> Option<NodeId> {
        self.select_ids(None, "body").into_iter().next()
    }

    fn query(&self, scope: Option<NodeId>, sel: &Selector) -> Vec<NodeId> {
        match scope {
            None => self.html.select(sel).map(|e| e.id()).collect(),
            Some(id) => match self.element(id) {
                Some(element) => element.select(sel).map(|e| e.id()).collect(),
                None => Vec::new(),
            },
        }
    }

    /// Every element under `scope` (the whole document for `None`) matching `selector`
    pub fn select_ids(&self, scope: Option<NodeId>, selector_str: &str) -> Vec<NodeId> {
        match selector(selector_str) {
            Some(sel) => self.query(scope, &sel),
            None => Vec::new(),
        }
    }

    /// First element matched by the first selector in `selectors` that matches anything
    pub fn select_first(&self, scope: Option<NodeId>, selectors: &[&str]) -> Option<NodeId> {
        selectors.iter().find_map(|s| {
            let found = self.select_ids(scope, s).into_iter().next();
            trace!("Selector {} -> {:?}", s, found);
            found
        })
    }

    /// Last element of the first selector in `selectors` that matches anything
    pub fn select_last(&self, scope: Option<NodeId>, selectors: &[&str]) -> Option<NodeId> {
        selectors
            .iter()
            .find_map(|s| self.select_ids(scope, s).into_iter().last())
    }

    /// Trimmed text of the first selector whose first match has non-empty text
    pub fn first_text(&self, scope: Option<NodeId>, selectors: &[&str]) -> Option<String> {
        selectors.iter().find_map(|s| {
            let id = self.select_ids(scope, s).into_iter().next()?;
            let text = self.text_of(id);
            (!text.is_empty()).then_some(text)
        })
    }

    pub fn text_of(&self, id: NodeId) -> String {
        self.element(id).map(element_text).unwrap_or_default()
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)
            .and_then(|e| e.value().attr(name))
            .map(str::to_string)
    }

    /// The element itself or its nearest ancestor matching `selector_list`
    pub fn closest(&self, id: NodeId, selector_list: &str) -> Option<NodeId> {
        let sel = selector(selector_list)?;
        let start = self.element(id)?;
        std::iter::successors(Some(start), |e| e.parent().and_then(ElementRef::wrap))
            .find(|e| sel.matches(e))
            .map(|e| e.id())
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.element(id)?
            .parent()
            .and_then(ElementRef::wrap)
            .map(|e| e.id())
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.element(id)?
            .next_siblings()
            .find_map(ElementRef::wrap)
            .map(|e| e.id())
    }

    #[cfg(test)]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .map(|e| e.value().classes().any(|c| c == class))
            .unwrap_or(false)
    }

    /// True if any descendant of `id` matches `selector`
    pub fn contains_selector(&self, id: NodeId, selector: &str) -> bool {
        !self.select_ids(Some(id), selector).is_empty()
    }

    pub fn is_processed(&self, id: NodeId) -> bool {
        self.processed.contains(&id)
    }

    /// Mark a container as handled; false if it already was
    pub fn mark_processed(&mut self, id: NodeId) -> bool {
        self.processed.insert(id)
    }

    /// Parse `markup` as a fragment and graft it at `position` relative to `target`
    pub fn insert_adjacent_html(
        &mut self,
        target: NodeId,
        position: InsertPosition,
        markup: &str,
    ) -> Result<()> {
        if self.element(target).is_none() {
            return Err(BookrateError::Other(format!(
                "insertion target {:?} is not an element",
                target
            )));
        }
        let needs_parent = matches!(
            position,
            InsertPosition::BeforeBegin | InsertPosition::AfterEnd
        );
        if needs_parent && self.parent_element(target).is_none() {
            return Err(BookrateError::Other(format!(
                "cannot insert {} a root element",
                position
            )));
        }

        let fragment = Html::parse_fragment(markup);
        let tree = &mut self.html.tree;
        let mut grafted: Vec<NodeId> = fragment
            .root_element()
            .children()
            .map(|child| graft(tree, child))
            .collect();

        // afterbegin and afterend attach in reverse so the fragment keeps its order
        if matches!(
            position,
            InsertPosition::AfterBegin | InsertPosition::AfterEnd
        ) {
            grafted.reverse();
        }

        let mut target_node = tree
            .get_mut(target)
            .ok_or_else(|| BookrateError::Other("insertion target vanished".to_string()))?;
        for id in grafted {
            match position {
                InsertPosition::BeforeBegin => target_node.insert_id_before(id),
                InsertPosition::AfterBegin => target_node.prepend_id(id),
                InsertPosition::BeforeEnd => target_node.append_id(id),
                InsertPosition::AfterEnd => target_node.insert_id_after(id),
            };
        }
        Ok(())
    }
}

/// Copy `source` and its subtree into `tree` as a detached node
fn graft(tree: &mut Tree<Node>, source: NodeRef<'_, Node>) -> NodeId {
    let id = tree.orphan(source.value().clone()).id();
    for child in source.children() {
        let child_id = graft(tree, child);
        if let Some(mut parent) = tree.get_mut(id) {
            parent.append_id(child_id);
        }
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<html><body>
        <div class="list">
            <div class="item" id="first"><a href="/ebook/one"><span class="title"> One </span></a><p class="price">NT$100</p></div>
            <div class="item" id="second"><a href="https://cdn.example.com/two"><span class="title"></span></a><h4>Two</h4></div>
        </div>
        <h1>Main</h1><h2>Sub</h2>
    </body></html>"#;

    fn page() -> Page {
        Page::parse(Url::parse("https://www.kobo.com/tw/zh").unwrap(), HTML)
    }

    #[test]
    fn test_urls() {
        let page = page();
        assert_eq!(page.root_url(), "https://www.kobo.com");
        assert_eq!(
            page.ensure_absolute_url("/ebook/one"),
            "https://www.kobo.com/ebook/one"
        );
        assert_eq!(
            page.ensure_absolute_url("https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );
        assert_eq!(page.ensure_absolute_url(""), "");
    }

    #[test]
    fn test_first_text_skips_empty_matches() {
        let page = page();
        let second = page.select_first(None, &["#second"]).unwrap();
        assert_eq!(
            page.first_text(Some(second), &[".title", "h4"]),
            Some("Two".to_string())
        );
        assert_eq!(page.first_text(None, &[".title"]), Some("One".to_string()));
        assert_eq!(page.first_text(None, &[".missing"]), None);
    }

    #[test]
    fn test_closest_and_siblings() {
        let page = page();
        let link = page.select_first(None, &["a"]).unwrap();
        let item = page.closest(link, ".item, .other").unwrap();
        assert_eq!(page.attr(item, "id"), Some("first".to_string()));
        assert_eq!(page.closest(item, ".item"), Some(item));
        assert_eq!(page.closest(link, ".nope"), None);

        let h1 = page.select_first(None, &["h1"]).unwrap();
        let h2 = page.next_element_sibling(h1).unwrap();
        assert_eq!(page.text_of(h2), "Sub");
        assert_eq!(page.parent_element(h1), page.body());
    }

    #[test]
    fn test_select_last() {
        let page = page();
        let last = page.select_last(None, &[".missing", ".item"]).unwrap();
        assert_eq!(page.attr(last, "id"), Some("second".to_string()));
    }

    #[test]
    fn test_processed_marking() {
        let mut page = page();
        let item = page.select_first(None, &[".item"]).unwrap();
        assert!(!page.is_processed(item));
        assert!(page.mark_processed(item));
        assert!(!page.mark_processed(item));
        assert!(page.is_processed(item));
    }

    #[test]
    fn test_insert_adjacent_html_positions() {
        let mut page = page();
        let price = page.select_first(None, &[".price"]).unwrap();
        page.insert_adjacent_html(price, InsertPosition::BeforeBegin, r#"<i class="a"></i>"#)
            .unwrap();
        page.insert_adjacent_html(price, InsertPosition::AfterEnd, r#"<i class="b"></i><i class="c"></i>"#)
            .unwrap();
        page.insert_adjacent_html(price, InsertPosition::AfterBegin, r#"<b class="d">x</b>"#)
            .unwrap();
        page.insert_adjacent_html(price, InsertPosition::BeforeEnd, r#"<b class="e">y</b>"#)
            .unwrap();

        let html = page.to_html();
        let a = html.find(r#"class="a""#).unwrap();
        let p = html.find(r#"class="price""#).unwrap();
        let d = html.find(r#"class="d""#).unwrap();
        let e = html.find(r#"class="e""#).unwrap();
        let b = html.find(r#"class="b""#).unwrap();
        let c = html.find(r#"class="c""#).unwrap();
        assert!(a < p && p < d && d < e && e < b && b < c);
        assert!(html.contains(r#"<b class="d">x</b>NT$100<b class="e">y</b>"#));

        let first = page.select_first(None, &["#first"]).unwrap();
        assert!(page.contains_selector(first, ".d"));
    }

    #[test]
    fn test_insert_next_to_root_fails() {
        let mut page = page();
        let root = page.html().root_element().id();
        assert!(page
            .insert_adjacent_html(root, InsertPosition::AfterEnd, "<i></i>")
            .is_err());
    }
}
