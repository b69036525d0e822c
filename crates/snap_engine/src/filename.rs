use sha2::{Digest, Sha256};
use url::Url;

const MAX_FILENAME_LEN: usize = 120;

/// Deterministic object-key filename for a media URL: the last path segment,
/// sanitized. URLs without a usable segment get `image-{short_hash(url)}.jpg`.
pub fn asset_filename(url: &str) -> String {
    let segment = Url::parse(&absolute_url(url))
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let sanitized = sanitize_segment(&segment);
    if sanitized.is_empty() {
        format!("image-{}.jpg", short_hash(url))
    } else {
        sanitized
    }
}

/// Protocol-relative CDN references (`//host/path`) are served over https.
pub fn absolute_url(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => trimmed.to_string(),
    }
}

fn sanitize_segment(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.len() > MAX_FILENAME_LEN {
        let mut end = MAX_FILENAME_LEN;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }
    cleaned
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' | '\0'..='\u{1F}'
    )
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
