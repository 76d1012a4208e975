use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use tracing::{debug, warn};

use super::{list_containers, DuplicateCheck, Listing, ListingKind, RetailerHandler};
use crate::app::Result;
use crate::dom::{InsertPosition, Page};
use crate::domain::{BookData, GoodreadsRating, Retailer, FORMAT_EBOOK};
use crate::render;
use crate::text;

static KOBO_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"www\.kobo\.com").expect("hardcoded regex pattern is valid"));
static DETAIL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.kobo\.com/.*/ebook/.*").expect("hardcoded regex pattern is valid")
});

const LIST_LINK: &str = r#"a[href*="/ebook/"]"#;
const LIST_CONTAINER: &str = r#".item-wrapper, [data-testid="carousel-bookcard"], .item-container"#;
const LIST_TITLES: &[&str] = &[".title", ".book-title", "h3", "h4", "[data-title]", ".product-title"];
const LIST_AUTHORS: &[&str] = &[".author", ".contributor", ".by-author", "[data-author]"];
const STAR_LABEL: &str = r#"[aria-label^="Rated"]"#;
const PRICES: &[&str] = &[r#"[data-testid="price"]"#, ".price-wrapper", ".price"];

const DETAIL_INSERTION: &str = ".sidebar-group .category-rankings";
const LIST_INSERTION: &[&str] = &[
    r#"[data-testid="rating"]"#,
    r#"[data-testid="spotlight-rating"]"#,
    r#"[data-testid="carousel-card-contributors"]"#,
    "div.kobo.star-rating",
];
/// Older list layout where each field is a `.book-detail-line`
const BOOK_BLOCK_PRICE: &str = ".book-detail-line.price";

/// Kobo Taiwan storefront
#[derive(Debug, Default)]
pub struct KoboHandler;

impl KoboHandler {
    pub fn new() -> Self {
        Self
    }

    fn extract_detail(&self, page: &mut Page) -> Option<Listing> {
        if !DETAIL_URL.is_match(page.url().as_str()) {
            return None;
        }

        let container = page
            .select_first(None, &[".sidebar-group"])
            .or_else(|| page.body())?;
        if !page.mark_processed(container) {
            return None;
        }

        let title = page
            .first_text(None, &[".title.product-field"])
            .map(|t| text::clean_book_title(&t));
        let subtitle = page.first_text(None, &[".subtitle.product-field"]);
        let author = page.first_text(None, &[".contributor-name"]);

        if title.is_none() && subtitle.is_none() {
            warn!("Kobo: no title found on detail page {}", page.url());
            return None;
        }

        let mut book = BookData::new(Retailer::Kobo, title.unwrap_or_default(), page.url().to_string());
        book.subtitle = subtitle;
        book.author = author;
        book.format = Some(FORMAT_EBOOK.to_string());
        self.fill_store_details(page, container, &mut book);

        debug!("Kobo: detail book {:?}", book);
        Some(Listing::detail(container, book))
    }

    fn extract_list_item(&self, page: &Page, container: NodeId) -> Option<BookData> {
        let title = page
            .first_text(Some(container), LIST_TITLES)
            .map(|t| text::clean_book_title(&t))?;

        let link = page
            .select_first(Some(container), &["a"])
            .or_else(|| page.closest(container, "a"));
        let url = link
            .and_then(|a| page.attr(a, "href"))
            .filter(|href| !href.is_empty())
            .map(|href| page.ensure_absolute_url(&href))
            .unwrap_or_else(|| page.url().to_string());

        let mut book = BookData::new(Retailer::Kobo, title, url);
        book.author = page.first_text(Some(container), LIST_AUTHORS);
        book.format = Some(FORMAT_EBOOK.to_string());
        self.fill_store_details(page, container, &mut book);
        Some(book)
    }

    /// Kobo's own star rating and the listed price, when the card shows them
    fn fill_store_details(&self, page: &Page, container: NodeId, book: &mut BookData) {
        let label = page
            .select_first(Some(container), &[STAR_LABEL])
            .and_then(|id| page.attr(id, "aria-label"));
        if let Some((rating, num_ratings)) = label
            .as_deref()
            .and_then(text::extract_rating_and_num_ratings)
        {
            book.rating = Some(rating);
            book.num_ratings = num_ratings;
        }

        if let Some(price_text) = page.first_text(Some(container), PRICES) {
            let (price, currency) = text::extract_price_and_currency(&price_text);
            book.price = price;
            book.currency = currency;
        }
    }

    fn list_target(&self, page: &Page, container: NodeId) -> Option<NodeId> {
        LIST_INSERTION.iter().find_map(|&selector| {
            let found = page.select_first(Some(container), &[selector])?;
            if selector == "div.kobo.star-rating" {
                Some(page.closest(found, "div.book-detail-line").unwrap_or(found))
            } else {
                Some(found)
            }
        })
    }
}

impl RetailerHandler for KoboHandler {
    fn name(&self) -> &str {
        "Kobo"
    }

    fn matches(&self, url: &str) -> bool {
        KOBO_URL.is_match(url)
    }

    fn extract(&self, page: &mut Page) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self.extract_detail(page).into_iter().collect();

        let containers = list_containers(page, LIST_LINK, &[LIST_CONTAINER], |_, _, _| true);
        for container in containers {
            page.mark_processed(container);
            if let Some(book) = self.extract_list_item(page, container) {
                listings.push(Listing::list_item(container, book));
            }
        }

        listings
    }

    fn render(&self, page: &mut Page, listing: &Listing, rating: &GoodreadsRating) -> Result<bool> {
        match listing.kind {
            ListingKind::Detail => super::insert_with_strategies(
                page,
                listing.container,
                &[super::InsertionStrategy::at(DETAIL_INSERTION, InsertPosition::BeforeBegin)],
                DuplicateCheck::None,
                &render::standard_widget(rating),
                self.name(),
            ),
            ListingKind::ListItem => {
                if let Some(target) = self.list_target(page, listing.container) {
                    page.insert_adjacent_html(target, InsertPosition::AfterEnd, &render::standard_widget(rating))?;
                    return Ok(true);
                }

                if let Some(price) = page.select_first(Some(listing.container), &[BOOK_BLOCK_PRICE]) {
                    let block = render::wrapper(
                        &render::rating_all_stars(rating),
                        &["book-detail-line", "bra-book-block-rating"],
                    );
                    page.insert_adjacent_html(price, InsertPosition::BeforeBegin, &block)?;
                    return Ok(true);
                }

                warn!("Kobo: no insertion point for {}", listing.book.title);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const DETAIL: &str = r#"<html><body>
        <div class="sidebar-group">
            <h1 class="title product-field">被討厭的勇氣（二版）</h1>
            <h2 class="subtitle product-field">The Courage to Be Disliked</h2>
            <a class="contributor-name">岸見一郎</a>
            <div class="category-rankings">Rankings</div>
        </div>
        <div class="item-wrapper">
            <a href="/tw/zh/ebook/atomic-habits"><h3>原子習慣</h3></a>
            <span class="author">James Clear</span>
            <div data-testid="rating" aria-label="Rated 4.5 out of 5 stars with 120 ratings"></div>
            <div data-testid="price">NT$315</div>
        </div>
    </body></html>"#;

    const BOOK_BLOCK: &str = r#"<html><body>
        <div class="item-container">
            <h4><a href="https://www.kobo.com/tw/zh/ebook/deep-work">Deep Work</a></h4>
            <div class="book-detail-line price">NT$300</div>
        </div>
    </body></html>"#;

    fn rating() -> GoodreadsRating {
        GoodreadsRating {
            found: true,
            title: Some("Atomic Habits".to_string()),
            url: Some("https://www.goodreads.com/book/show/1".to_string()),
            rating: Some(4.35),
            num_ratings: Some(2_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_matches() {
        let handler = KoboHandler::new();
        assert!(handler.matches("https://www.kobo.com/tw/zh"));
        assert!(!handler.matches("https://24h.pchome.com.tw/books"));
    }

    #[test]
    fn test_extract_detail_and_list() {
        let handler = KoboHandler::new();
        let url = Url::parse("https://www.kobo.com/tw/zh/ebook/the-courage").unwrap();
        let mut page = Page::parse(url, DETAIL);
        let listings = handler.extract(&mut page);
        assert_eq!(listings.len(), 2);

        let detail = &listings[0];
        assert_eq!(detail.kind, ListingKind::Detail);
        assert_eq!(detail.book.title, "被討厭的勇氣");
        assert_eq!(detail.book.subtitle.as_deref(), Some("The Courage to Be Disliked"));
        assert_eq!(detail.book.author.as_deref(), Some("岸見一郎"));
        assert_eq!(detail.book.format.as_deref(), Some("ebook"));

        let item = &listings[1];
        assert_eq!(item.kind, ListingKind::ListItem);
        assert_eq!(item.book.title, "原子習慣");
        assert_eq!(item.book.url, "https://www.kobo.com/tw/zh/ebook/atomic-habits");
        assert_eq!(item.book.author.as_deref(), Some("James Clear"));
        assert_eq!(item.book.rating, Some(4.5));
        assert_eq!(item.book.num_ratings, Some(120));
        assert_eq!(item.book.price, Some(315.0));
        assert_eq!(item.book.currency.as_deref(), Some("NTD"));

        assert!(handler.extract(&mut page).is_empty());
    }

    #[test]
    fn test_render_detail_and_list() {
        let handler = KoboHandler::new();
        let url = Url::parse("https://www.kobo.com/tw/zh/ebook/the-courage").unwrap();
        let mut page = Page::parse(url, DETAIL);
        let listings = handler.extract(&mut page);

        assert!(handler.render(&mut page, &listings[0], &rating()).unwrap());
        assert!(handler.render(&mut page, &listings[1], &rating()).unwrap());

        let html = page.to_html();
        assert_eq!(html.matches("bra-rating-wrapper").count(), 2);
        let widget = html.find("bra-rating-wrapper").unwrap();
        assert!(widget < html.find("category-rankings").unwrap());
        let rating_line = html.find(r#"data-testid="rating""#).unwrap();
        assert!(html.rfind("bra-rating-wrapper").unwrap() > rating_line);
    }

    #[test]
    fn test_render_book_block_uses_stars() {
        let handler = KoboHandler::new();
        let url = Url::parse("https://www.kobo.com/tw/zh").unwrap();
        let mut page = Page::parse(url, BOOK_BLOCK);
        let listings = handler.extract(&mut page);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].book.title, "Deep Work");

        assert!(handler.render(&mut page, &listings[0], &rating()).unwrap());
        let html = page.to_html();
        assert!(html.contains("bra-book-block-rating"));
        assert_eq!(html.matches("bra-star p10").count(), 4);
    }
}
