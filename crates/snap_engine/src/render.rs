use std::sync::Arc;
use std::time::Duration;

use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

use crate::decode::decode_output;
use crate::fetch::HttpTransport;
use crate::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("listing never became ready: {0}")]
    NotReady(String),
    #[error("rendering timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid link selector {0:?}")]
    InvalidSelector(String),
    #[error("listing fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// A rendering session over one listing surface.
///
/// The session is stateful: the set of rendered links grows as
/// [`render_more`](PageRenderer::render_more) is called, like an infinitely
/// scrolling page.
#[async_trait::async_trait]
pub trait PageRenderer: Send {
    /// Loads the listing and waits until item links are rendered.
    async fn open(&mut self, url: &str) -> Result<(), RenderError>;

    /// `href` of every item link currently rendered, in page order.
    async fn item_links(&mut self) -> Result<Vec<String>, RenderError>;

    /// Triggers further rendering (next page / scroll).
    async fn render_more(&mut self) -> Result<(), RenderError>;

    async fn close(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub page_timeout: Duration,
    /// Query parameter selecting a listing page.
    pub page_param: String,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(10),
            page_param: "page".to_string(),
        }
    }
}

/// Renders a paginated listing over plain HTTP. Each `render_more` fetches
/// the next page and appends its links to what is already rendered.
pub struct HttpListingRenderer {
    transport: Arc<dyn HttpTransport>,
    selector: Selector,
    settings: ListingSettings,
    base: Option<Url>,
    page: u32,
    rendered: Vec<String>,
}

impl HttpListingRenderer {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        link_selector: &str,
        settings: ListingSettings,
    ) -> Result<Self, RenderError> {
        let selector = Selector::parse(link_selector)
            .map_err(|_| RenderError::InvalidSelector(link_selector.to_string()))?;
        Ok(Self {
            transport,
            selector,
            settings,
            base: None,
            page: 0,
            rendered: Vec::new(),
        })
    }

    fn page_url(&self, page: u32) -> Option<String> {
        let mut url = self.base.clone()?;
        if page > 1 {
            url.query_pairs_mut()
                .append_pair(&self.settings.page_param, &page.to_string());
        }
        Some(url.to_string())
    }

    async fn load_page(&self, url: &str) -> Result<Vec<String>, RenderError> {
        let output = self.transport.get(url, self.settings.page_timeout).await?;
        let html = decode_output(&output)?;
        Ok(extract_links(&html, &self.selector))
    }
}

fn extract_links(html: &str, selector: &Selector) -> Vec<String> {
    Html::parse_document(html)
        .select(selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

#[async_trait::async_trait]
impl PageRenderer for HttpListingRenderer {
    async fn open(&mut self, url: &str) -> Result<(), RenderError> {
        let base = Url::parse(url).map_err(|err| RenderError::NotReady(err.to_string()))?;
        self.base = Some(base);
        self.page = 1;
        self.rendered.clear();

        let links = self.load_page(url).await?;
        if links.is_empty() {
            return Err(RenderError::NotReady(format!("no item links on {url}")));
        }
        self.rendered = links;
        Ok(())
    }

    async fn item_links(&mut self) -> Result<Vec<String>, RenderError> {
        Ok(self.rendered.clone())
    }

    async fn render_more(&mut self) -> Result<(), RenderError> {
        let next = self.page + 1;
        let Some(url) = self.page_url(next) else {
            return Err(RenderError::NotReady("listing not opened".to_string()));
        };
        let links = self.load_page(&url).await?;
        self.page = next;
        self.rendered.extend(links);
        Ok(())
    }
}
