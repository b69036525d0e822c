//! Built-in source adapters, selected by name from configuration.
mod musinsa;

use std::sync::Arc;

pub use musinsa::MusinsaAdapter;

use crate::source::SourceAdapter;

/// Names accepted by [`adapter_for`].
pub const KNOWN_SOURCES: &[&str] = &[musinsa::PLATFORM];

pub fn adapter_for(name: &str) -> Option<Arc<dyn SourceAdapter>> {
    if name.trim().eq_ignore_ascii_case(musinsa::PLATFORM) {
        return Some(Arc::new(MusinsaAdapter::new()));
    }
    None
}
