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

static BOKELAI_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.books\.com\.tw|activity\.books\.com\.tw").expect("hardcoded regex pattern is valid")
});
static DETAIL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.books\.com\.tw/products").expect("hardcoded regex pattern is valid")
});

const LIST_LINK: &str = r#"a[href*="/products/"]"#;
const LIST_CHAIN: &[&str] = &[".item", ".table_td", ".mod_a", "li", ".alpha", ".omega"];
const TITLES: &[&str] = &["h1", "h4", ".prod-name", "p a"];
const AUTHORS: &[&str] = &[".type02_p003 ul li", ".msg li", ".list_details li"];
const PRICES: &[&str] = &[".price01", ".price_a strong", ".prod-price strong", ".list_details"];
const THUMBNAILS: &[&str] = &["img.cover", "img.ban", "img"];

const CATEGORIES: &[(&str, CategoryInfo)] = &[
    ("中文電子書", CategoryInfo::new("zh-TW", BookFormat::Digital, false)),
    ("中文書", CategoryInfo::new("zh-TW", BookFormat::Physical, false)),
    ("簡體書", CategoryInfo::new("zh-CN", BookFormat::Physical, false)),
    ("日文書．MOOK", CategoryInfo::new("ja", BookFormat::Physical, true)),
    ("中文雜誌", CategoryInfo::new("zh-TW", BookFormat::Physical, true)),
    ("電子雜誌", CategoryInfo::new("zh-TW", BookFormat::Digital, true)),
    ("有聲書", CategoryInfo::new("zh-TW", BookFormat::Audio, false)),
    ("外文書", CategoryInfo::new("en-US", BookFormat::Physical, false)),
];

const LIST_INSERTION: &[InsertionStrategy] = &[
    InsertionStrategy::at("h4", InsertPosition::AfterEnd),
    InsertionStrategy::at(".prod-name", InsertPosition::AfterEnd),
    InsertionStrategy::at(".img-wrap", InsertPosition::BeforeEnd),
    InsertionStrategy::container(InsertPosition::BeforeEnd),
];

/// 博客來 (books.com.tw)
#[derive(Debug, Default)]
pub struct BokelaiHandler;

impl BokelaiHandler {
    pub fn new() -> Self {
        Self
    }

    fn is_detail_page(page: &Page) -> bool {
        DETAIL_URL.is_match(page.url().as_str())
    }

    fn extract_book(&self, page: &Page, container: NodeId) -> Option<BookData> {
        let original_title = page.first_text(Some(container), TITLES);
        let title = original_title
            .as_deref()
            .map(text::clean_book_title)
            .filter(|t| !t.is_empty());

        let subtitle = page
            .select_first(Some(container), &["h1"])
            .and_then(|h1| page.next_element_sibling(h1))
            .filter(|sibling| {
                page.element(*sibling)
                    .map(|e| e.value().name() == "h2")
                    .unwrap_or(false)
            })
            .map(|h2| page.text_of(h2))
            .filter(|t| !t.is_empty())
            .map(|t| text::clean_book_title(&t));

        let author = AUTHORS.iter().find_map(|selector| {
            page.select_ids(Some(container), selector)
                .into_iter()
                .find_map(|li| text::extract_author_from_book_info(&page.text_of(li)))
        });

        let price = PRICES.iter().find_map(|selector| {
            let last = page.select_ids(Some(container), selector).into_iter().last()?;
            text::extract_price_from_book_info(&page.text_of(last))
                .and_then(|p| text::parse_int_prefix(&p))
                .filter(|p| *p != 0)
        });

        let thumbnail_url = THUMBNAILS.iter().find_map(|selector| {
            let img = page.select_first(Some(container), &[selector])?;
            page.attr(img, "data-original")
                .filter(|s| !s.is_empty())
                .or_else(|| page.attr(img, "src").filter(|s| !s.is_empty()))
        });

        let url = match page.select_first(Some(container), &[LIST_LINK]) {
            Some(link) => page.ensure_absolute_url(&page.attr(link, "href").unwrap_or_default()),
            None if Self::is_detail_page(page) => page.url().to_string(),
            None => String::new(),
        };

        let isbn = page
            .select_ids(Some(container), ".bd li")
            .into_iter()
            .find_map(|li| text::extract_isbn_from_book_info(&page.text_of(li)));

        let mut format = BookFormat::Physical;
        if let Some(original) = original_title.as_deref() {
            format = text::resolve_book_format(original);
            let breadcrumbs = texts_of(page, container, "#breadcrumb-trail li");
            if let Some(category) = resolve_category(CATEGORIES, &breadcrumbs) {
                trace!("Bokelai: category {:?}", category);
                format = category.format;
                if category.is_magazine {
                    debug!("Bokelai: skipping magazine {}", original);
                    return None;
                }
            }
        }

        let mut book = BookData::new(Retailer::Bokelai, title?, url);
        book.subtitle = subtitle;
        book.author = author;
        book.thumbnail_url = thumbnail_url;
        book.price = price.map(|p| p as f64);
        book.currency = Some("TWD".to_string());
        book.format = Some(format.listing_format().to_string());
        book.isbn = isbn;
        Some(book)
    }
}

impl RetailerHandler for BokelaiHandler {
    fn name(&self) -> &str {
        "Bokelai (博客來)"
    }

    fn matches(&self, url: &str) -> bool {
        BOKELAI_URL.is_match(url)
    }

    fn extract(&self, page: &mut Page) -> Vec<Listing> {
        let mut listings = Vec::new();

        if Self::is_detail_page(page) {
            if let Some(container) = page.select_first(None, &[".main_wrap"]) {
                if page.mark_processed(container) {
                    match self.extract_book(page, container) {
                        Some(book) => {
                            debug!("Bokelai: detail book {:?}", book);
                            listings.push(Listing::detail(container, book));
                        }
                        None => error!("Bokelai: unable to extract book data from detail page"),
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
                let target = page
                    .select_first(Some(listing.container), &["h1"])
                    .and_then(|h1| page.parent_element(h1));
                let Some(target) = target else {
                    warn!("Bokelai: no suitable insertion point found for detail page");
                    return Ok(false);
                };
                page.insert_adjacent_html(target, InsertPosition::BeforeEnd, &widget)?;
                Ok(true)
            }
            ListingKind::ListItem => insert_with_strategies(
                page,
                listing.container,
                LIST_INSERTION,
                DuplicateCheck::Target,
                &widget,
                self.name(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const DETAIL: &str = r#"<html><body>
        <ul id="breadcrumb-trail"><li>首頁</li><li>中文書</li><li>心理勵志</li></ul>
        <div class="main_wrap">
            <ul id="breadcrumb-trail"><li>首頁</li><li>中文書</li></ul>
            <div class="mod type02_p002">
                <h1>被討厭的勇氣：自我啟發之父「阿德勒」的教導（二版）</h1>
                <h2>嫌われる勇気</h2>
            </div>
            <div class="type02_p003"><ul>
                <li>作者： 岸見一郎 追蹤作者 新功能介紹</li>
                <li>譯者：葉小燕</li>
            </ul></div>
            <img class="cover" src="https://im1.book.com.tw/cover.jpg">
            <ul class="price"><li>定價：300元</li><li class="price01">優惠價：79折237元</li></ul>
            <div class="bd"><ul><li>ISBN：9789861371955</li><li>叢書系列：心靈</li></ul></div>
        </div>
        <div class="mod_a">
            <h4><a href="/products/0010822522">原子習慣</a></h4>
            <div class="msg"><ul><li>作者：James Clear</li></ul></div>
            <img data-original="https://im2.book.com.tw/atomic.jpg" src="blank.gif">
            <div class="price_a"><strong>NT$330</strong></div>
        </div>
        <div class="mod_a">
            <h4><a href="/products/M0101">今周刊</a></h4>
            <ul id="breadcrumb-trail"><li>中文雜誌</li></ul>
        </div>
    </body></html>"#;

    fn page() -> Page {
        let url = Url::parse("https://www.books.com.tw/products/0010822522?sloc=main").unwrap();
        Page::parse(url, DETAIL)
    }

    #[test]
    fn test_matches() {
        let handler = BokelaiHandler::new();
        assert!(handler.matches("https://www.books.com.tw/"));
        assert!(handler.matches("https://activity.books.com.tw/crosscat/show/A00000062854"));
        assert!(!handler.matches("https://www.taaze.tw/"));
    }

    #[test]
    fn test_extract_detail() {
        let handler = BokelaiHandler::new();
        let mut page = page();
        let listings = handler.extract(&mut page);
        assert_eq!(listings.len(), 2);

        let book = &listings[0].book;
        assert_eq!(listings[0].kind, ListingKind::Detail);
        assert_eq!(book.title, "被討厭的勇氣：自我啟發之父「阿德勒」的教導");
        assert_eq!(book.subtitle.as_deref(), Some("嫌われる勇気"));
        assert_eq!(book.author.as_deref(), Some("岸見一郎"));
        assert_eq!(book.price, Some(237.0));
        assert_eq!(book.isbn.as_deref(), Some("9789861371955"));
        assert_eq!(book.thumbnail_url.as_deref(), Some("https://im1.book.com.tw/cover.jpg"));
        assert_eq!(book.format.as_deref(), Some("physical"));
        assert_eq!(book.url, "https://www.books.com.tw/products/0010822522?sloc=main");
    }

    #[test]
    fn test_extract_list_item_and_skip_magazine() {
        let handler = BokelaiHandler::new();
        let mut page = page();
        let listings = handler.extract(&mut page);

        let item = &listings[1];
        assert_eq!(item.kind, ListingKind::ListItem);
        assert_eq!(item.book.title, "原子習慣");
        assert_eq!(item.book.url, "https://www.books.com.tw/products/0010822522");
        assert_eq!(item.book.author.as_deref(), Some("JamesClear"));
        assert_eq!(item.book.thumbnail_url.as_deref(), Some("https://im2.book.com.tw/atomic.jpg"));
        assert_eq!(item.book.price, Some(330.0));
        assert!(listings.iter().all(|l| l.book.title != "今周刊"));
    }

    #[test]
    fn test_render() {
        let handler = BokelaiHandler::new();
        let mut page = page();
        let listings = handler.extract(&mut page);
        let rating = GoodreadsRating {
            found: true,
            title: Some("Atomic Habits".to_string()),
            url: Some("https://www.goodreads.com/book/show/1".to_string()),
            rating: Some(4.38),
            num_ratings: Some(900),
            ..Default::default()
        };

        assert!(handler.render(&mut page, &listings[0], &rating).unwrap());
        assert!(handler.render(&mut page, &listings[1], &rating).unwrap());

        let html = page.to_html();
        assert_eq!(html.matches(r#"class="bra-rating-wrapper""#).count(), 2);
        let h2 = html.find("<h2>").unwrap();
        assert!(html.find("bra-rating-wrapper").unwrap() > h2);
        assert!(html.contains(r#"</h4><div class="bra-rating-wrapper">"#));
    }
}
