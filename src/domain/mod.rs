pub mod book;
pub mod message;
pub mod rating;

pub use book::{BookData, Retailer, FORMAT_EBOOK, FORMAT_PHYSICAL};
pub use message::{BookPostBody, FetchRatingRequest, Message, RatingResponse};
pub use rating::GoodreadsRating;
