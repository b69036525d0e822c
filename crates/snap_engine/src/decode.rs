use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::{FailureKind, FetchError, FetchOutput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
}

/// Decode a fetched body into UTF-8: BOM -> Content-Type charset -> chardetng guess.
pub fn decode_text(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedText, FetchError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

/// Shorthand for decoding a whole [`FetchOutput`].
pub fn decode_output(output: &FetchOutput) -> Result<String, FetchError> {
    decode_text(&output.bytes, output.metadata.content_type.as_deref()).map(|d| d.text)
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches([' ', '"', '\'']).to_string())
    })
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedText, FetchError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(FetchError::new(
            FailureKind::Decode,
            format!("invalid {} byte sequence", enc.name()),
        ));
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}
