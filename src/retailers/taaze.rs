use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use tracing::{debug, error, trace, warn};

use super::{
    insert_with_strategies, list_containers, resolve_category, texts_of, CategoryInfo,
    DuplicateCheck, InsertionStrategy, Listing, ListingKind, RetailerHandler,
};
use crate::app::Result;
use crate::dom::{InsertPosition, Page};
use crate::domain::{BookData, GoodreadsRating, Retailer};
use crate::render;
use crate::text::{self, BookFormat};

static TAAZE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.taaze\.tw|activity\.taaze\.tw").expect("hardcoded regex pattern is valid")
});
static DETAIL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.taaze\.tw/(products|usedList)").expect("hardcoded regex pattern is valid")
});
static STYLE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(['"](.+?)['"]\)"#).expect("hardcoded regex pattern is valid"));

const LIST_LINK: &str = r#"a[href*="/products/"]"#;
const LIST_CHAIN: &[&str] = &[
    ".bookGrid",
    ".talkelookGrid2",
    ".avivid_item",
    ".bookGridByListView",
    ".listBookGrid",
    ".bestSellArea",
    ".info_frame",
    ".act_products",
    ".books",
];
const TITLES: &[&str] = &[
    "h1#ga4ProdTitle",
    ".prod_TitleMain",
    ".avivid_item_title",
    "h4",
    ".nameDiv a",
    "strong a",
    "a",
];
const AUTHORS: &[&str] = &[".authorBrand p", ".prod_author", ".author"];
const PRICES: &[&str] = &[".price", ".discPrice", ".discPrice1", ".avivid_sale_price"];
const THUMBNAILS: &[&str] = &[
    "div.col-sm-8.col-md-9 > div > div:nth-child(1) > a > img:nth-child(1)",
    "img",
    ".cover_frame",
    ".avivid_other_image",
];
const BREADCRUMBS: &str = ".site_map span, .site_map li, .col-xs-12 li a";

const CATEGORIES: &[(&str, CategoryInfo)] = &[
    ("雜誌", CategoryInfo::new("zh-TW", BookFormat::Physical, true)),
    ("二手中文書", CategoryInfo::new("zh-TW", BookFormat::SecondHand, false)),
    ("中文電子書", CategoryInfo::new("zh-TW", BookFormat::Digital, false)),
    ("中文書", CategoryInfo::new("zh-TW", BookFormat::Physical, false)),
];

const DETAIL_INSERTION: &str = ".authorBrand";
const LIST_INSERTION: &[InsertionStrategy] = &[
    InsertionStrategy::at(".prod_TitleMain", InsertPosition::AfterEnd),
    InsertionStrategy::at(".avivid_item_title", InsertPosition::AfterEnd),
    InsertionStrategy::at(".author", InsertPosition::BeforeBegin),
    InsertionStrategy::at(".nameDiv", InsertPosition::AfterEnd),
    InsertionStrategy::container(InsertPosition::BeforeEnd),
];

/// 讀冊 (taaze.tw), new and second-hand
#[derive(Debug, Default)]
pub struct TaazeHandler;

impl TaazeHandler {
    pub fn new() -> Self {
        Self
    }

    fn is_detail_page(page: &Page) -> bool {
        DETAIL_URL.is_match(page.url().as_str())
    }

    fn thumbnail(page: &Page, container: NodeId) -> Option<String> {
        THUMBNAILS.iter().find_map(|selector| {
            let img = page.select_first(Some(container), &[selector])?;
            if let Some(src) = page.attr(img, "src").filter(|s| !s.is_empty()) {
                return Some(src);
            }
            let style = page.attr(img, "style")?;
            STYLE_URL
                .captures(&style)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }

    fn extract_book(&self, page: &Page, container: NodeId) -> Option<BookData> {
        let original_title = page.first_text(Some(container), TITLES);
        let title = original_title
            .as_deref()
            .map(text::clean_book_title)
            .filter(|t| !t.is_empty());

        let subtitle = page.first_text(Some(container), &[".row h2"]);

        let author = AUTHORS.iter().find_map(|selector| {
            let id = page.select_first(Some(container), &[selector])?;
            text::extract_author_from_book_info(&page.text_of(id))
        });

        let price = PRICES.iter().find_map(|selector| {
            let id = page.select_first(Some(container), &[selector])?;
            text::extract_price_from_book_info(&page.text_of(id))
                .and_then(|p| text::parse_int_prefix(&p))
                .filter(|p| *p != 0)
        });

        let url = match page.select_first(Some(container), &[LIST_LINK]) {
            Some(link) => page.ensure_absolute_url(&page.attr(link, "href").unwrap_or_default()),
            None if Self::is_detail_page(page) => page.url().to_string(),
            None => String::new(),
        };

        let isbn_spans = texts_of(page, container, ".prodInfo_boldSpan");
        let isbn = if isbn_spans.is_empty() {
            None
        } else {
            text::extract_isbn_from_book_info(&isbn_spans.join(" "))
        };

        let mut format = BookFormat::Physical;
        if let Some(original) = original_title.as_deref() {
            format = text::resolve_book_format(original);
            let breadcrumbs = texts_of(page, container, BREADCRUMBS);
            if let Some(category) = resolve_category(CATEGORIES, &breadcrumbs) {
                trace!("Taaze: category {:?}", category);
                format = category.format;
                if category.is_magazine {
                    debug!("Taaze: skipping magazine {}", original);
                    return None;
                }
            }
        }

        let mut book = BookData::new(Retailer::Taaze, title?, url);
        book.subtitle = subtitle;
        book.author = author;
        book.thumbnail_url = Self::thumbnail(page, container);
        book.price = price.map(|p| p as f64);
        book.currency = Some("TWD".to_string());
        book.format = Some(format.listing_format().to_string());
        book.isbn = isbn;
        Some(book)
    }
}

impl RetailerHandler for TaazeHandler {
    fn name(&self) -> &str {
        "Taaze (讀冊)"
    }

    fn matches(&self, url: &str) -> bool {
        TAAZE_URL.is_match(url)
    }

    fn extract(&self, page: &mut Page) -> Vec<Listing> {
        let mut listings = Vec::new();

        if Self::is_detail_page(page) {
            let container = page
                .select_first(None, &["h1#ga4ProdTitle"])
                .and_then(|h1| page.closest(h1, ".container"))
                .or_else(|| page.body());
            if let Some(container) = container {
                if page.mark_processed(container) {
                    match self.extract_book(page, container) {
                        Some(book) => {
                            debug!("Taaze: detail book {:?}", book);
                            listings.push(Listing::detail(container, book));
                        }
                        None => error!("Taaze: unable to extract book data from detail page"),
                    }
                }
            }
        }

        for container in list_containers(page, LIST_LINK, LIST_CHAIN, |_, _, _| true) {
            page.mark_processed(container);
            if let Some(book) = self.extract_book(page, container) {
                listings.push(Listing::list_item(container, book));
            }
        }

        listings
    }

    fn render(&self, page: &mut Page, listing: &Listing, rating: &GoodreadsRating) -> Result<bool> {
        let widget = render::standard_widget(rating);
        match listing.kind {
            ListingKind::Detail => {
                let Some(target) = page.select_first(None, &[DETAIL_INSERTION]) else {
                    warn!("Taaze: no suitable insertion point found for detail page");
                    return Ok(false);
                };
                page.insert_adjacent_html(target, InsertPosition::BeforeBegin, &widget)?;
                Ok(true)
            }
            ListingKind::ListItem => insert_with_strategies(
                page,
                listing.container,
                LIST_INSERTION,
                DuplicateCheck::TargetOrParent,
                &widget,
                self.name(),
            ),
        }
    }
}
