//! URL → retailer handler dispatch.

use tracing::info;

use crate::app::{BookrateError, Result};
use crate::retailers::{BokelaiHandler, KoboHandler, PchomeHandler, RetailerHandler, TaazeHandler};

/// Ordered list of retailer handlers; the first one whose `matches` accepts
/// a URL handles that page
#[derive(Default)]
pub struct ContentRouter {
    handlers: Vec<Box<dyn RetailerHandler>>,
}

impl ContentRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with every supported retailer registered
    pub fn with_default_handlers() -> Self {
        Self {
            handlers: vec![
                Box::new(KoboHandler::new()),
                Box::new(PchomeHandler::new()),
                Box::new(BokelaiHandler::new()),
                Box::new(TaazeHandler::new()),
            ],
        }
    }

    pub fn register(&mut self, handler: Box<dyn RetailerHandler>) -> Result<()> {
        if self.handlers.iter().any(|h| h.name() == handler.name()) {
            return Err(BookrateError::DuplicateHandler(handler.name().to_string()));
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        match self.handlers.iter().position(|h| h.name() == name) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn registered_handlers(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn route(&self, url: &str) -> Option<&dyn RetailerHandler> {
        match self.handlers.iter().find(|h| h.matches(url)) {
            Some(handler) => {
                info!("Handling {} page: {}", handler.name(), url);
                Some(handler.as_ref())
            }
            None => {
                info!("No handler found for URL: {}", url);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;
    use crate::domain::GoodreadsRating;
    use crate::retailers::Listing;

    struct StubHandler {
        name: &'static str,
        pattern: &'static str,
    }

    impl RetailerHandler for StubHandler {
        fn name(&self) -> &str {
            self.name
        }

        fn matches(&self, url: &str) -> bool {
            url.contains(self.pattern)
        }

        fn extract(&self, _page: &mut Page) -> Vec<Listing> {
            Vec::new()
        }

        fn render(&self, _page: &mut Page, _listing: &Listing, _rating: &GoodreadsRating) -> Result<bool> {
            Ok(false)
        }
    }

    fn stub(name: &'static str, pattern: &'static str) -> Box<dyn RetailerHandler> {
        Box::new(StubHandler { name, pattern })
    }

    fn router() -> ContentRouter {
        let mut router = ContentRouter::new();
        router.register(stub("Kobo", "kobo.com")).unwrap();
        router.register(stub("PChome", "pchome.com.tw")).unwrap();
        router.register(stub("Bokelai", "books.com.tw")).unwrap();
        router
    }

    #[test]
    fn test_register() {
        let router = router();
        assert_eq!(router.handler_count(), 3);
        assert_eq!(router.registered_handlers(), vec!["Kobo", "PChome", "Bokelai"]);
    }

    #[test]
    fn test_register_duplicate_name_fails() {
        let mut router = router();
        let err = router.register(stub("Kobo", "other")).unwrap_err();
        assert_eq!(err.to_string(), "Handler with name \"Kobo\" is already registered");
        assert_eq!(router.handler_count(), 3);

        router.register(stub("Kobo 2", "kobo.com")).unwrap();
        assert_eq!(router.handler_count(), 4);
    }

    #[test]
    fn test_unregister_and_clear() {
        let mut router = router();
        assert!(router.unregister("PChome"));
        assert_eq!(router.registered_handlers(), vec!["Kobo", "Bokelai"]);
        assert!(!router.unregister("Missing"));
        assert_eq!(router.handler_count(), 2);

        router.clear();
        assert_eq!(router.handler_count(), 0);
        assert!(router.registered_handlers().is_empty());
        assert!(!ContentRouter::new().unregister("Kobo"));
    }

    #[test]
    fn test_route_picks_first_match() {
        let mut router = router();
        router.register(stub("Kobo fallback", "kobo.com")).unwrap();

        let handler = router.route("https://www.kobo.com/tw/zh/ebook/x").unwrap();
        assert_eq!(handler.name(), "Kobo");
        let handler = router.route("https://24h.pchome.com.tw/books/").unwrap();
        assert_eq!(handler.name(), "PChome");
        assert!(router.route("https://www.amazon.com/").is_none());
        assert!(ContentRouter::new().route("https://www.kobo.com/").is_none());
    }

    #[test]
    fn test_default_handlers() {
        let router = ContentRouter::with_default_handlers();
        assert_eq!(
            router.registered_handlers(),
            vec!["Kobo", "PChome", "Bokelai (博客來)", "Taaze (讀冊)"]
        );
        let routes = [
            ("https://www.kobo.com/tw/zh", "Kobo"),
            ("https://24h.pchome.com.tw/books/prod/DJAV0A", "PChome"),
            ("https://activity.books.com.tw/crosscat/show", "Bokelai (博客來)"),
            ("https://www.taaze.tw/usedList.html", "Taaze (讀冊)"),
        ];
        for (url, expected) in routes {
            assert_eq!(router.route(url).map(|h| h.name()), Some(expected));
        }
    }
}
