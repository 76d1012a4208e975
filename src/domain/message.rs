use serde::{Deserialize, Serialize};

use crate::domain::{BookData, GoodreadsRating, Retailer};

/// Reply to a rating request
pub type RatingResponse = GoodreadsRating;

/// Messages understood by the background rating service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    FetchRatingWithBookTitle(FetchRatingRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRatingRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book: Option<BookData>,
}

impl FetchRatingRequest {
    pub fn from_book(book: &BookData) -> Self {
        Self {
            title: book.title.clone(),
            subtitle: book.subtitle.clone(),
            book: Some(book.clone()),
        }
    }

    /// Cache key: the title, suffixed with `-subtitle` when one is present
    pub fn storage_key(&self) -> String {
        match self.subtitle.as_deref() {
            Some(sub) if !sub.is_empty() => format!("{}-{}", self.title, sub),
            _ => self.title.clone(),
        }
    }
}

/// Body of `POST /api/book`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookPostBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goodreads: Option<GoodreadsRating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kobo: Option<BookData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pchome: Option<BookData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bokelai: Option<BookData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taaze: Option<BookData>,
}

impl BookPostBody {
    pub fn goodreads(rating: GoodreadsRating) -> Self {
        Self {
            goodreads: Some(rating),
            ..Default::default()
        }
    }

    /// Body carrying a single listing under its source's key
    pub fn listing(book: BookData) -> Option<Self> {
        let mut body = Self::default();
        match book.source? {
            Retailer::Kobo => body.kobo = Some(book),
            Retailer::Pchome => body.pchome = Some(book),
            Retailer::Bokelai => body.bokelai = Some(book),
            Retailer::Taaze => body.taaze = Some(book),
        }
        Some(body)
    }

    pub fn listings(&self) -> impl Iterator<Item = (Retailer, &BookData)> {
        [
            (Retailer::Kobo, self.kobo.as_ref()),
            (Retailer::Pchome, self.pchome.as_ref()),
            (Retailer::Bokelai, self.bokelai.as_ref()),
            (Retailer::Taaze, self.taaze.as_ref()),
        ]
        .into_iter()
        .filter_map(|(retailer, book)| book.map(|b| (retailer, b)))
    }

    /// First title in the body, for log lines
    pub fn first_title(&self) -> Option<&str> {
        self.goodreads
            .as_ref()
            .and_then(|g| g.title.as_deref())
            .or_else(|| self.listings().next().map(|(_, b)| b.title.as_str()))
    }
}
