//! Rating widget markup.
//!
//! Widgets are produced as HTML strings and grafted into the page by
//! [`crate::dom::Page::insert_adjacent_html`]. Every dynamic value goes
//! through `html_escape` before it lands in the markup.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::domain::GoodreadsRating;

/// Class of the div every inserted widget is wrapped in
pub const WRAPPER_CLASS: &str = "bra-rating-wrapper";
pub const WRAPPER_SELECTOR: &str = ".bra-rating-wrapper";

const MAX_RATING: u32 = 5;

#[derive(Debug, Clone, Default)]
pub struct RatingConfig {
    pub include_icon: bool,
    pub container_classes: Vec<String>,
}

impl RatingConfig {
    pub fn with_icon() -> Self {
        Self {
            include_icon: true,
            ..Default::default()
        }
    }
}

/// `toFixed`-style formatting with halves rounded away from zero
fn to_fixed(value: f64, digits: usize) -> String {
    let factor = 10f64.powi(digits as i32);
    format!("{:.*}", digits, (value * factor).round() / factor)
}

/// Short form of a count: `1.5m`, `5.0k`, `12k`, `999`
pub fn format_number_km(num: u64) -> String {
    if num >= 1_000_000 {
        format!("{}m", to_fixed(num as f64 / 1_000_000.0, 1))
    } else if num >= 1_000 {
        let digits = if num > 10_000 { 0 } else { 1 };
        format!("{}k", to_fixed(num as f64 / 1_000.0, digits))
    } else {
        num.to_string()
    }
}

/// Comma-grouped count: `1,234,567`
pub fn format_thousands(num: u64) -> String {
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn star_span(fill: u32) -> String {
    format!(
        r#"<span class="bra-star-interactive bra-star p{}" role="presentation"></span>"#,
        fill
    )
}

fn icon_span() -> &'static str {
    r#"<span class="bra-goodreads-icon"></span>"#
}

/// Numeric widget: one full star, the score and the short rating count
pub fn rating_div_in_numbers(rating: &GoodreadsRating, config: &RatingConfig) -> String {
    let score = rating.display_rating();
    let count = format_number_km(rating.num_ratings.unwrap_or_default());

    let mut classes = String::from("bra-rating-content");
    for class in &config.container_classes {
        classes.push(' ');
        classes.push_str(class);
    }

    let mut html = format!(
        r#"<div class="{}" aria-label="Rated {} out of 5 stars" translate="no">"#,
        encode_double_quoted_attribute(&classes),
        encode_double_quoted_attribute(&score)
    );
    if config.include_icon {
        html.push_str(icon_span());
    }
    html.push_str(&star_span(10));
    html.push_str(&format!(
        r#"<span class="bra-rating-score">{}</span><span class="bra-rating-count">{}</span></div>"#,
        encode_text(&score),
        encode_text(&count)
    ));
    html
}

/// Numeric widget prefixed with the Goodreads icon, linking to the book page
pub fn rating_with_link(rating: &GoodreadsRating) -> String {
    let inner = rating_div_in_numbers(rating, &RatingConfig::with_icon());
    let title = format!(
        "{} {} avg rating — {} ratings",
        rating.title.as_deref().unwrap_or_default(),
        rating.display_rating(),
        format_number_km(rating.num_ratings.unwrap_or_default())
    );

    format!(
        r#"<a class="bra-rating-link-wrapper" href="{}" title="{}" target="_blank">{}</a>"#,
        encode_double_quoted_attribute(rating.url.as_deref().unwrap_or_default()),
        encode_double_quoted_attribute(&title),
        inner
    )
}

/// Partial-star class for the fractional part of a rating
fn partial_fill(fraction: f64) -> u32 {
    let tenths = fraction * 10.0;
    if tenths <= 1.5 {
        0
    } else if tenths <= 4.5 {
        3
    } else if tenths <= 8.0 {
        6
    } else {
        10
    }
}

/// Five-star widget used on Kobo book blocks
pub fn rating_all_stars(rating: &GoodreadsRating) -> String {
    let value = rating.rating.unwrap_or_default().clamp(0.0, MAX_RATING as f64);
    let full = value.floor() as u32;
    let fraction = value % 1.0;
    let has_partial = fraction != 0.0;

    let mut html = format!(
        r#"<div class="kobo star-rating bra-rating-content" role="img" aria-label="Rated {} out of 5 stars" translate="no">"#,
        encode_double_quoted_attribute(&rating.display_rating())
    );
    for _ in 0..full {
        html.push_str(&star_span(10));
    }
    if has_partial {
        html.push_str(&star_span(partial_fill(fraction)));
    }
    let filled = full + u32::from(has_partial);
    for _ in filled..MAX_RATING {
        html.push_str(&star_span(0));
    }
    html.push_str(icon_span());
    html.push_str("</div>");
    html
}

/// One-line `4.3 (12,345)` widget used on dense PChome grids
pub fn rating_compact(rating: &GoodreadsRating) -> String {
    let text = format!(
        "{} ({})",
        to_fixed(rating.rating.unwrap_or_default(), 1),
        format_thousands(rating.num_ratings.unwrap_or_default())
    );
    format!(
        r#"<div class="bra-rating-content bra-rating-compact">{}<span class="rating-text">{}</span></div>"#,
        icon_span(),
        encode_text(&text)
    )
}

pub fn wrapper(inner: &str, classes: &[&str]) -> String {
    format!(
        r#"<div class="{}">{}</div>"#,
        encode_double_quoted_attribute(&classes.join(" ")),
        inner
    )
}

/// The standard widget every handler inserts
pub fn standard_widget(rating: &GoodreadsRating) -> String {
    wrapper(&rating_with_link(rating), &[WRAPPER_CLASS])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rating() -> GoodreadsRating {
        GoodreadsRating {
            found: true,
            title: Some("Atomic Habits".to_string()),
            url: Some("https://www.goodreads.com/book/show/40121378".to_string()),
            rating: Some(4.38),
            num_ratings: Some(1_234_567),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_number_km() {
        assert_eq!(format_number_km(1_500_000), "1.5m");
        assert_eq!(format_number_km(5_000), "5.0k");
        assert_eq!(format_number_km(10_000), "10.0k");
        assert_eq!(format_number_km(12_345), "12k");
        assert_eq!(format_number_km(1_250), "1.3k");
        assert_eq!(format_number_km(999), "999");
        assert_eq!(format_number_km(0), "0");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_rating_div_in_numbers() {
        let html = rating_div_in_numbers(&sample_rating(), &RatingConfig::default());
        assert!(html.starts_with(r#"<div class="bra-rating-content" aria-label="Rated 4.38 out of 5 stars" translate="no">"#));
        assert!(!html.contains("bra-goodreads-icon"));
        assert!(html.contains(r#"<span class="bra-rating-score">4.38</span>"#));
        assert!(html.contains(r#"<span class="bra-rating-count">1.2m</span>"#));

        let config = RatingConfig {
            include_icon: true,
            container_classes: vec!["extra".to_string()],
        };
        let html = rating_div_in_numbers(&sample_rating(), &config);
        assert!(html.contains(r#"class="bra-rating-content extra""#));
        assert!(html.contains("bra-goodreads-icon"));
    }

    #[test]
    fn test_rating_with_link_escapes_values() {
        let mut rating = sample_rating();
        rating.title = Some(r#"Tom & "Jerry""#.to_string());
        let html = rating_with_link(&rating);
        assert!(html.starts_with(r#"<a class="bra-rating-link-wrapper" href="https://www.goodreads.com/book/show/40121378""#));
        assert!(html.contains("Tom &amp; &quot;Jerry&quot; 4.38 avg rating — 1.2m ratings"));
        assert!(html.contains(r#"target="_blank""#));
    }

    #[test]
    fn test_rating_all_stars() {
        let mut rating = sample_rating();
        rating.rating = Some(3.5);
        let html = rating_all_stars(&rating);
        assert_eq!(html.matches("bra-star p10").count(), 3);
        assert_eq!(html.matches("bra-star p6").count(), 1);
        assert_eq!(html.matches("bra-star p0").count(), 1);

        rating.rating = Some(4.0);
        let html = rating_all_stars(&rating);
        assert_eq!(html.matches("bra-star p10").count(), 4);
        assert_eq!(html.matches("bra-star p0").count(), 1);
    }

    #[test]
    fn test_rating_compact_and_wrapper() {
        let html = wrapper(&rating_compact(&sample_rating()), &[WRAPPER_CLASS]);
        assert!(html.starts_with(r#"<div class="bra-rating-wrapper">"#));
        assert!(html.contains(r#"<span class="rating-text">4.4 (1,234,567)</span>"#));
    }

    #[test]
    fn test_rating_compact_rounds_halves_up() {
        let mut rating = sample_rating();
        rating.num_ratings = Some(10);
        for (value, shown) in [(4.25, "4.3 (10)"), (2.25, "2.3 (10)"), (3.75, "3.8 (10)")] {
            rating.rating = Some(value);
            assert!(rating_compact(&rating).contains(shown), "{} should show as {}", value, shown);
        }
    }
}
