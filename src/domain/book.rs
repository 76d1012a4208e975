use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const FORMAT_EBOOK: &str = "ebook";
pub const FORMAT_PHYSICAL: &str = "physical";

/// Retailer a listing was scraped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retailer {
    Kobo,
    Pchome,
    Bokelai,
    Taaze,
}

impl Retailer {
    pub const ALL: [Retailer; 4] = [
        Retailer::Kobo,
        Retailer::Pchome,
        Retailer::Bokelai,
        Retailer::Taaze,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Retailer::Kobo => "kobo",
            Retailer::Pchome => "pchome",
            Retailer::Bokelai => "bokelai",
            Retailer::Taaze => "taaze",
        }
    }

    /// Server-side table holding this retailer's listings
    pub fn table(&self) -> &'static str {
        match self {
            Retailer::Kobo => "kobo_book",
            Retailer::Pchome => "pchome_book",
            Retailer::Bokelai => "bokelai_book",
            Retailer::Taaze => "taaze_book",
        }
    }
}

impl fmt::Display for Retailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Retailer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kobo" => Ok(Retailer::Kobo),
            "pchome" => Ok(Retailer::Pchome),
            "bokelai" | "books.com.tw" => Ok(Retailer::Bokelai),
            "taaze" => Ok(Retailer::Taaze),
            other => Err(format!("Unknown retailer: {}", other)),
        }
    }
}

/// A book listing as observed on a retailer page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Retailer>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ratings: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

impl BookData {
    pub fn new(source: Retailer, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn display_title(&self) -> String {
        match self.subtitle.as_deref() {
            Some(sub) if !sub.is_empty() => format!("{} ({})", self.title, sub),
            _ => self.title.clone(),
        }
    }
}
