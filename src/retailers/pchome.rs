use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use tracing::{debug, error, warn};

use super::{
    insert_with_strategies, list_containers, DuplicateCheck, InsertionStrategy, Listing,
    ListingKind, RetailerHandler,
};
use crate::app::Result;
use crate::dom::{InsertPosition, Page};
use crate::domain::{BookData, GoodreadsRating, Retailer};
use crate::render;
use crate::text;

static PCHOME_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"24h\.pchome\.com\.tw").expect("hardcoded regex pattern is valid"));
static DETAIL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"24h\.pchome\.com\.tw/books/prod").expect("hardcoded regex pattern is valid")
});

const LIST_LINK: &str = r#"a[href*="/prod/"]"#;
const LIST_CHAIN: &[&str] = &[".swiper-slide", ".c-listInfoGrid__item"];
const TITLES: &[&str] = &[".c-prodInfoV2__title", "h1"];
const THUMBNAILS: &[&str] = &[".c-prodInfoV2__img img", ".swiper-wrapper img", "img"];
const PRICES: &[&str] = &[
    ".c-prodInfoV2__priceValue--m",
    ".c-prodInfoV2__priceBar .c-prodInfoV2__priceValue",
    ".c-prodInfoV2__priceBar .o-prodPrice__price",
    ".o-prodPrice__price",
];

const DETAIL_INSERTION: &str = ".c-blockCombine--priceGray";
const PRICE_BAR: &str = ".c-prodInfoV2__priceBar";

/// PChome 24h books and e-books
#[derive(Debug, Default)]
pub struct PchomeHandler;

impl PchomeHandler {
    pub fn new() -> Self {
        Self
    }

    fn is_detail_page(page: &Page) -> bool {
        DETAIL_URL.is_match(page.url().as_str())
    }

    fn extract_book(&self, page: &Page, container: NodeId) -> Option<BookData> {
        let original_title = page.first_text(Some(container), TITLES)?;
        let title = text::clean_book_title(&original_title);
        if title.is_empty() {
            return None;
        }

        let url = match page.select_first(Some(container), &[LIST_LINK]) {
            Some(link) => page.attr(link, "href").unwrap_or_default(),
            None if Self::is_detail_page(page) => page.url().to_string(),
            None => String::new(),
        };

        let mut book = BookData::new(Retailer::Pchome, title, url);
        book.thumbnail_url = THUMBNAILS.iter().find_map(|selector| {
            page.select_first(Some(container), &[selector])
                .and_then(|img| page.attr(img, "src"))
                .filter(|src| !src.is_empty())
        });
        book.price = page
            .select_last(Some(container), PRICES)
            .map(|id| page.text_of(id).replace(['$', ','], ""))
            .and_then(|p| text::parse_int_prefix(&p))
            .map(|p| p as f64);
        book.currency = Some("TWD".to_string());
        book.format = Some(
            if text::resolve_is_digital(&original_title) {
                crate::domain::FORMAT_EBOOK
            } else {
                crate::domain::FORMAT_PHYSICAL
            }
            .to_string(),
        );
        Some(book)
    }
}

impl RetailerHandler for PchomeHandler {
    fn name(&self) -> &str {
        "PChome"
    }

    fn matches(&self, url: &str) -> bool {
        PCHOME_URL.is_match(url)
    }

    fn extract(&self, page: &mut Page) -> Vec<Listing> {
        let mut listings = Vec::new();

        if Self::is_detail_page(page) {
            if let Some(container) = page.select_first(None, &["#ProdBriefing"]) {
                if page.mark_processed(container) {
                    match self.extract_book(page, container) {
                        Some(book) => {
                            debug!("PChome: detail book {:?}", book);
                            listings.push(Listing::detail(container, book));
                        }
                        None => error!("PChome: unable to extract book data from detail page"),
                    }
                }
            }
        }

        let containers = list_containers(page, LIST_LINK, LIST_CHAIN, |page, link, container| {
            let href = page.attr(link, "href").unwrap_or_default();
            if href.contains("/books/prod/") {
                true
            } else if href.contains("/prod/") {
                page.text_of(container).contains("電子書")
            } else {
                false
            }
        });

        for container in containers {
            page.mark_processed(container);
            if let Some(book) = self.extract_book(page, container) {
                listings.push(Listing::list_item(container, book));
            }
        }

        listings
    }

    fn render(&self, page: &mut Page, listing: &Listing, rating: &GoodreadsRating) -> Result<bool> {
        match listing.kind {
            ListingKind::Detail => {
                let Some(target) = page.select_first(None, &[DETAIL_INSERTION]) else {
                    warn!("PChome: no suitable insertion point found for detail page");
                    return Ok(false);
                };
                page.insert_adjacent_html(target, InsertPosition::BeforeBegin, &render::standard_widget(rating))?;
                Ok(true)
            }
            ListingKind::ListItem => {
                if page.select_first(Some(listing.container), &[PRICE_BAR]).is_some() {
                    insert_with_strategies(
                        page,
                        listing.container,
                        &[InsertionStrategy::at(PRICE_BAR, InsertPosition::BeforeBegin)],
                        DuplicateCheck::TargetOrParent,
                        &render::standard_widget(rating),
                        self.name(),
                    )
                } else {
                    // dense grids without a price bar get the one-line widget
                    let compact = render::wrapper(&render::rating_compact(rating), &[render::WRAPPER_CLASS]);
                    insert_with_strategies(
                        page,
                        listing.container,
                        &[InsertionStrategy::container(InsertPosition::BeforeEnd)],
                        DuplicateCheck::TargetOrParent,
                        &compact,
                        self.name(),
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const DETAIL: &str = r#"<html><body>
        <div id="ProdBriefing">
            <h1 class="c-prodInfoV2__title">原子習慣（電子書）</h1>
            <div class="c-prodInfoV2__img"><img src="https://img.pchome.com.tw/cover.jpg"></div>
            <div class="c-prodInfoV2__priceBar">
                <span class="c-prodInfoV2__priceValue">$450</span>
                <span class="c-prodInfoV2__priceValue">$1,356</span>
            </div>
        </div>
        <div class="c-blockCombine--priceGray">price</div>
        <div class="swiper-slide">
            <a href="https://24h.pchome.com.tw/books/prod/DJAV0A-A900"><h1>深度工作力</h1></a>
            <div class="o-prodPrice__price">$300</div>
        </div>
        <div class="swiper-slide">
            <a href="https://24h.pchome.com.tw/prod/DGBJ0A-1"><h1>耳機</h1></a>
        </div>
        <div class="swiper-slide">
            <a href="https://24h.pchome.com.tw/prod/DJBQ0A-2"><h1>電子書 小王子</h1></a>
        </div>
    </body></html>"#;

    fn rating() -> GoodreadsRating {
        GoodreadsRating {
            found: true,
            title: Some("Atomic Habits".to_string()),
            url: Some("https://www.goodreads.com/book/show/1".to_string()),
            rating: Some(4.38),
            num_ratings: Some(1_234),
            ..Default::default()
        }
    }

    fn detail_page() -> Page {
        let url = Url::parse("https://24h.pchome.com.tw/books/prod/DJAV0A-A9009ZZ").unwrap();
        Page::parse(url, DETAIL)
    }

    #[test]
    fn test_extract() {
        let handler = PchomeHandler::new();
        let mut page = detail_page();
        let listings = handler.extract(&mut page);
        assert_eq!(listings.len(), 3);

        let detail = &listings[0];
        assert_eq!(detail.book.title, "原子習慣");
        assert_eq!(detail.book.url, "https://24h.pchome.com.tw/books/prod/DJAV0A-A9009ZZ");
        assert_eq!(detail.book.price, Some(1356.0));
        assert_eq!(detail.book.format.as_deref(), Some("ebook"));
        assert_eq!(detail.book.currency.as_deref(), Some("TWD"));
        assert_eq!(
            detail.book.thumbnail_url.as_deref(),
            Some("https://img.pchome.com.tw/cover.jpg")
        );

        assert_eq!(listings[1].book.title, "深度工作力");
        assert_eq!(listings[1].book.price, Some(300.0));
        assert_eq!(listings[1].book.format.as_deref(), Some("physical"));
        assert_eq!(listings[2].book.title, "電子書 小王子");
        assert_eq!(listings[2].book.format.as_deref(), Some("ebook"));
    }

    #[test]
    fn test_render() {
        let handler = PchomeHandler::new();
        let mut page = detail_page();
        let listings = handler.extract(&mut page);

        assert!(handler.render(&mut page, &listings[1], &rating()).unwrap());
        assert!(!handler.render(&mut page, &listings[1], &rating()).unwrap());
        assert!(handler.render(&mut page, &listings[0], &rating()).unwrap());

        let html = page.to_html();
        assert_eq!(html.matches(r#"class="bra-rating-wrapper""#).count(), 2);
        assert!(html.find("bra-rating-wrapper").unwrap() < html.find("c-blockCombine--priceGray").unwrap());
        assert!(html.contains(r#"<span class="rating-text">4.4 (1,234)</span>"#));
    }
}
