use scraper::{Html, Selector};
use serde_json::Value;
use snap_core::{ItemId, Source};

use crate::filename::asset_filename;
use crate::source::{MediaSlot, ParseError, SourceAdapter};
use crate::ItemPayload;

pub const PLATFORM: &str = "MUSINSA";

const SITE_BASE: &str = "https://www.musinsa.com";
const CONTENT_API_BASE: &str = "https://content.musinsa.com";
const SNAP_QUERY_KEY: &str = "contentAPI.getApi2SnapSnapsByIdV1";
const RELATED_FIELD: &str = "goods_detail_list";

/// Musinsa snap feed: `/snap/{id}` pages carrying a Next.js data blob.
#[derive(Debug, Clone)]
pub struct MusinsaAdapter {
    source: Source,
    site_base: String,
    content_base: String,
    listing_url: String,
}

impl MusinsaAdapter {
    pub fn new() -> Self {
        Self::with_hosts(SITE_BASE, CONTENT_API_BASE)
    }

    /// Point the adapter at other hosts, e.g. a local mock server.
    pub fn with_hosts(site_base: &str, content_base: &str) -> Self {
        let site_base = site_base.trim_end_matches('/').to_string();
        Self {
            source: Source::new(PLATFORM),
            listing_url: format!("{site_base}/snap/main/recommend?gf=A&sort=NEWEST"),
            site_base,
            content_base: content_base.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for MusinsaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for MusinsaAdapter {
    fn source(&self) -> &Source {
        &self.source
    }

    fn listing_url(&self) -> &str {
        &self.listing_url
    }

    fn item_link_selector(&self) -> &str {
        "a[href*='/snap/']"
    }

    fn item_id_from_href(&self, href: &str) -> Option<ItemId> {
        let tail = href.rsplit("/snap/").next()?;
        let raw = tail.split(['?', '#', '/']).next()?;
        ItemId::parse(raw).ok()
    }

    fn item_url(&self, item_id: &ItemId) -> String {
        format!("{}/snap/{}", self.site_base, item_id)
    }

    fn extract_payload(&self, item_id: &ItemId, page: &str) -> Result<ItemPayload, ParseError> {
        let blob = next_data_blob(page)
            .ok_or_else(|| ParseError::new(format!("snap {item_id}: __NEXT_DATA__ missing")))?;
        let root: Value = serde_json::from_str(&blob)
            .map_err(|err| ParseError::new(format!("snap {item_id}: bad __NEXT_DATA__: {err}")))?;

        let queries = root
            .pointer("/props/pageProps/dehydratedState/queries")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        queries
            .iter()
            .filter(|query| has_query_key(query, SNAP_QUERY_KEY))
            .filter_map(|query| query.pointer("/state/data/data").and_then(Value::as_object))
            .find(|data| !data.is_empty())
            .cloned()
            .ok_or_else(|| ParseError::new(format!("snap {item_id}: detail record not found")))
    }

    fn related_ids(&self, payload: &ItemPayload) -> Vec<String> {
        let Some(goods) = payload.get("goods").and_then(Value::as_array) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = Vec::new();
        for id in goods.iter().filter_map(|g| g.get("goodsNo").and_then(goods_no)) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    fn related_lookup_url(&self, ids: &[String]) -> Option<String> {
        if ids.is_empty() {
            return None;
        }
        let formatted = ids
            .iter()
            .map(|id| format!("{PLATFORM}:{id}"))
            .collect::<Vec<_>>()
            .join(",");
        Some(format!(
            "{}/api2/content/snap/v1/goods?goodsIds={}",
            self.content_base, formatted
        ))
    }

    fn parse_related(&self, body: &str) -> Result<Vec<Value>, ParseError> {
        let root: Value = serde_json::from_str(body)
            .map_err(|err| ParseError::new(format!("goods lookup: {err}")))?;
        Ok(root
            .pointer("/data/list")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    fn attach_related(&self, payload: &mut ItemPayload, related: Vec<Value>) {
        payload.insert(RELATED_FIELD.to_string(), Value::Array(related));
    }

    fn media_slots(&self, item_id: &ItemId, payload: &ItemPayload) -> Vec<MediaSlot> {
        let mut slots = Vec::new();

        if let Some(medias) = payload.get("medias").and_then(Value::as_array) {
            for (index, media) in medias.iter().enumerate() {
                let is_image = media.get("type").and_then(Value::as_str) == Some("IMAGE");
                let path = media.get("path").and_then(Value::as_str).unwrap_or_default();
                if !is_image || path.is_empty() {
                    continue;
                }
                slots.push(MediaSlot {
                    owner: format!("/medias/{index}"),
                    key_field: "s3Key".to_string(),
                    url: path.to_string(),
                    target_key: format!("musinsa/snaps/{item_id}/{}", asset_filename(path)),
                });
            }
        }

        if let Some(goods) = payload.get(RELATED_FIELD).and_then(Value::as_array) {
            for (index, detail) in goods.iter().enumerate() {
                let image = detail.get("imageUrl").and_then(Value::as_str).unwrap_or_default();
                if image.is_empty() {
                    continue;
                }
                let goods_no = detail
                    .get("goodsNo")
                    .and_then(goods_no)
                    .unwrap_or_else(|| "unknown".to_string());
                slots.push(MediaSlot {
                    owner: format!("/{RELATED_FIELD}/{index}"),
                    key_field: "s3ImageKey".to_string(),
                    url: image.to_string(),
                    target_key: format!("musinsa/goods/{goods_no}/{}", asset_filename(image)),
                });
            }
        }

        slots
    }
}

fn next_data_blob(page: &str) -> Option<String> {
    let document = Html::parse_document(page);
    let selector = Selector::parse("script#__NEXT_DATA__").ok()?;
    let script = document.select(&selector).next()?;
    let text: String = script.text().collect();
    (!text.trim().is_empty()).then_some(text)
}

fn has_query_key(query: &Value, key: &str) -> bool {
    query
        .get("queryKey")
        .and_then(Value::as_array)
        .is_some_and(|parts| parts.iter().any(|part| part.as_str() == Some(key)))
}

fn goods_no(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_u64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}
