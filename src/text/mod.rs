//! Pure string helpers shared by the retailer handlers.
//!
//! Everything here operates on text already pulled out of the page: title
//! cleaning, format detection and the small regex extractors for author,
//! ISBN and price fields. None of these functions touch the document.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static FULLWIDTH_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"（[^（）]*）").expect("hardcoded regex pattern is valid"));
static LENTICULAR_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"【[^【】]*】").expect("hardcoded regex pattern is valid"));
static ASCII_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]*\)").expect("hardcoded regex pattern is valid"));
static TODAY_BOOKLIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*今日.*書單").expect("hardcoded regex pattern is valid"));
static HYREAD_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^HyRead\s*").expect("hardcoded regex pattern is valid"));
static READMOO_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Readmoo\s*讀墨\s*").expect("hardcoded regex pattern is valid"));
static PUBU_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*（Pubu電子書）").expect("hardcoded regex pattern is valid"));
static KOBO_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(Kob/電子書\)").expect("hardcoded regex pattern is valid"));

static AUTHOR_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"追蹤作者|新功能介紹|[ 修改]").expect("hardcoded regex pattern is valid"));
static AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"作者：\s*(.+)").expect("hardcoded regex pattern is valid"));
static ISBN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ISBN/ISSN：\s*(\d+)|ISBN：\s*(\d+)").expect("hardcoded regex pattern is valid")
});
static PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*元|\$(\d+)|NT\$\s*(\d+)").expect("hardcoded regex pattern is valid")
});
static STAR_RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Rated ([\d.]+) out of 5 stars\s*(with (\d+) ratings)?")
        .expect("hardcoded regex pattern is valid")
});
static PRICE_AND_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(NT)?\$(\d+(?:\.\d+)?)\s*([A-Za-z0-9_]+)?")
        .expect("hardcoded regex pattern is valid")
});

static NON_LETTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\x{4E00}-\x{9FFF}\x{3400}-\x{4DBF}a-zA-Z]").expect("hardcoded regex pattern is valid")
});
static ALL_CHINESE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\x{4E00}-\x{9FFF}\x{3400}-\x{4DBF}]+$").expect("hardcoded regex pattern is valid")
});
static ALL_ENGLISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("hardcoded regex pattern is valid"));
static ANY_CHINESE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{4E00}-\x{9FFF}]").expect("hardcoded regex pattern is valid"));

/// Physical shape of a book as inferred from its title or breadcrumb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Physical,
    Digital,
    SecondHand,
    Audio,
}

impl BookFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Physical => "physical",
            BookFormat::Digital => "digital",
            BookFormat::SecondHand => "second-hand",
            BookFormat::Audio => "audio",
        }
    }

    /// Format string reported on listings: only two values exist there
    pub fn listing_format(&self) -> &'static str {
        match self {
            BookFormat::Digital => crate::domain::FORMAT_EBOOK,
            _ => crate::domain::FORMAT_PHYSICAL,
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn clean_once(title: &str) -> String {
    let cleaned = FULLWIDTH_PARENS.replace_all(title, "");
    let cleaned = LENTICULAR_BRACKETS.replace_all(&cleaned, "");
    let cleaned = ASCII_PARENS.replace_all(&cleaned, "");
    let cleaned = TODAY_BOOKLIST.replace_all(&cleaned, "");
    let cleaned = HYREAD_PREFIX.replace_all(&cleaned, "");
    let cleaned = READMOO_PREFIX.replace_all(&cleaned, "");
    let cleaned = PUBU_SUFFIX.replace_all(&cleaned, "");
    let cleaned = KOBO_SUFFIX.replace_all(&cleaned, "");
    cleaned.trim().to_string()
}

/// Strip bracketed annotations and store-specific prefixes from a title.
///
/// Rules are applied until the title stops changing, so nested brackets and
/// prefixes exposed by trimming are removed too and the result is idempotent.
pub fn clean_book_title(title: &str) -> String {
    let mut current = clean_once(title);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

pub fn resolve_is_digital(title: &str) -> bool {
    title.contains("電子書")
}

pub fn resolve_is_second_hand(title: &str) -> bool {
    title.contains("二手")
}

pub fn resolve_book_format(title: &str) -> BookFormat {
    if resolve_is_digital(title) {
        BookFormat::Digital
    } else if resolve_is_second_hand(title) {
        BookFormat::SecondHand
    } else {
        BookFormat::Physical
    }
}

/// Pull the author out of a `作者：...` info line
pub fn extract_author_from_book_info(info: &str) -> Option<String> {
    let info = AUTHOR_NOISE.replace_all(info, "");
    let info = info.replace('\n', " ");
    let info = info.trim();

    AUTHOR
        .captures(info)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_isbn_from_book_info(info: &str) -> Option<String> {
    let caps = ISBN.captures(info)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Price digits from the last price-looking token in `info`
pub fn extract_price_from_book_info(info: &str) -> Option<String> {
    PRICE
        .captures_iter(info)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        })
        .last()
}

/// Parse `Rated 4.5 out of 5 stars with 12 ratings` style labels
pub fn extract_rating_and_num_ratings(label: &str) -> Option<(f64, Option<u64>)> {
    if label.is_empty() {
        return None;
    }

    let caps = STAR_RATING.captures(label)?;
    let rating = parse_float_prefix(caps.get(1)?.as_str())?;
    let num_ratings = caps.get(3).and_then(|m| m.as_str().parse::<u64>().ok());
    Some((rating, num_ratings))
}

/// Price and currency from texts like `NT$350` or `$12.99 USD`.
///
/// Currency defaults to `NTD` when the amount has no trailing code.
pub fn extract_price_and_currency(subtext: &str) -> (Option<f64>, Option<String>) {
    if subtext.is_empty() {
        return (None, None);
    }

    match PRICE_AND_CURRENCY.captures(subtext) {
        Some(caps) => {
            let price = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
            let currency = caps
                .get(3)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| "NTD".to_string());
            (price, Some(currency))
        }
        None => (None, None),
    }
}

pub fn contains_chinese(s: &str) -> bool {
    ANY_CHINESE.is_match(s)
}

/// True when every letter in `s` is a CJK ideograph
pub fn is_chinese(s: &str) -> bool {
    let letters = NON_LETTER.replace_all(s, "");
    ALL_CHINESE.is_match(&letters)
}

/// True when every letter in `s` is ASCII latin
pub fn is_english(s: &str) -> bool {
    let letters = NON_LETTER.replace_all(s, "");
    ALL_ENGLISH.is_match(&letters)
}

/// Leading integer of `s`, the way `parseInt(s, 10)` reads it
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Leading decimal number of `s`, the way `parseFloat` reads it
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut seen_dot = false;
    let end = s
        .char_indices()
        .find(|&(_, c)| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                false
            } else {
                !c.is_ascii_digit()
            }
        })
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].trim_end_matches('.').parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_book_title_removes_brackets() {
        assert_eq!(clean_book_title("被討厭的勇氣（二版）"), "被討厭的勇氣");
        assert_eq!(clean_book_title("【獨家書衣版】原子習慣"), "原子習慣");
        assert_eq!(clean_book_title("Atomic Habits (Paperback)"), "Atomic Habits");
    }

    #[test]
    fn test_clean_book_title_store_prefixes() {
        assert_eq!(clean_book_title("HyRead 原子習慣"), "原子習慣");
        assert_eq!(clean_book_title("Readmoo 讀墨 原子習慣"), "原子習慣");
        assert_eq!(clean_book_title("原子習慣 (Kob/電子書)"), "原子習慣");
        assert_eq!(clean_book_title("原子習慣（Pubu電子書）"), "原子習慣");
        assert_eq!(clean_book_title("週末今日推薦書單"), "");
    }

    #[test]
    fn test_clean_book_title_is_idempotent() {
        let samples = [
            "被討厭的勇氣（二版）",
            "a（b（c）d）",
            " HyRead HyRead 書名 ",
            "【限量】【親簽版】書名(平裝)",
            "plain title",
            "",
        ];
        for sample in samples {
            let once = clean_book_title(sample);
            assert_eq!(clean_book_title(&once), once, "not idempotent for {:?}", sample);
        }
        assert_eq!(clean_book_title("a（b（c）d）"), "a");
    }

    #[test]
    fn test_resolve_book_format() {
        assert_eq!(resolve_book_format("原子習慣 (電子書)"), BookFormat::Digital);
        assert_eq!(resolve_book_format("二手書 原子習慣"), BookFormat::SecondHand);
        assert_eq!(resolve_book_format("原子習慣"), BookFormat::Physical);
        assert_eq!(BookFormat::SecondHand.listing_format(), "physical");
        assert_eq!(BookFormat::Digital.listing_format(), "ebook");
    }

    #[test]
    fn test_extract_author() {
        assert_eq!(
            extract_author_from_book_info("作者： 岸見一郎 追蹤作者 新功能介紹"),
            Some("岸見一郎".to_string())
        );
        assert_eq!(
            extract_author_from_book_info("\n作者：James Clear\n"),
            Some("JamesClear".to_string())
        );
        assert_eq!(extract_author_from_book_info("譯者：葉妍伶"), None);
    }

    #[test]
    fn test_extract_isbn() {
        assert_eq!(
            extract_isbn_from_book_info("ISBN：9789861371955"),
            Some("9789861371955".to_string())
        );
        assert_eq!(
            extract_isbn_from_book_info("ISBN/ISSN： 9789861371955 規格"),
            Some("9789861371955".to_string())
        );
        assert_eq!(extract_isbn_from_book_info("EAN 123"), None);
    }

    #[test]
    fn test_extract_price_takes_last_match() {
        assert_eq!(extract_price_from_book_info("定價：450元 優惠價：79折356元"), Some("356".to_string()));
        assert_eq!(extract_price_from_book_info("NT$ 299"), Some("299".to_string()));
        assert_eq!(extract_price_from_book_info("$350"), Some("350".to_string()));
        assert_eq!(extract_price_from_book_info("免運"), None);
    }

    #[test]
    fn test_extract_rating_and_num_ratings() {
        assert_eq!(
            extract_rating_and_num_ratings("Rated 4.5 out of 5 stars with 12 ratings"),
            Some((4.5, Some(12)))
        );
        assert_eq!(
            extract_rating_and_num_ratings("Rated 3 out of 5 stars"),
            Some((3.0, None))
        );
        assert_eq!(extract_rating_and_num_ratings(""), None);
        assert_eq!(extract_rating_and_num_ratings("no stars"), None);
    }

    #[test]
    fn test_extract_price_and_currency() {
        assert_eq!(extract_price_and_currency("NT$350"), (Some(350.0), Some("NTD".into())));
        assert_eq!(extract_price_and_currency("$12.99 usd"), (Some(12.99), Some("USD".into())));
        assert_eq!(extract_price_and_currency(""), (None, None));
        assert_eq!(extract_price_and_currency("free"), (None, None));
    }

    #[test]
    fn test_language_detection() {
        assert!(contains_chinese("原子習慣 Atomic Habits"));
        assert!(!contains_chinese("Atomic Habits"));
        assert!(is_chinese("原子習慣：細微改變帶來巨大成就"));
        assert!(!is_chinese("原子習慣 Atomic"));
        assert!(is_english("Atomic Habits: 2nd ed."));
        assert!(!is_english("Atomic 習慣"));
    }

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(parse_int_prefix("1234"), Some(1234));
        assert_eq!(parse_int_prefix("  356元"), Some(356));
        assert_eq!(parse_int_prefix("-5"), Some(-5));
        assert_eq!(parse_int_prefix("NT356"), None);
        assert_eq!(parse_float_prefix("4.25"), Some(4.25));
        assert_eq!(parse_float_prefix("4.5."), Some(4.5));
        assert_eq!(parse_float_prefix("."), None);
    }
}
