//! Bitrate ladder policy.

use serde::{Deserialize, Serialize};

use hf_core::config::TIER_NAMES;
use hf_core::Resolution;

/// Bitrate floors in kbps, per tier.
const FLOORS_KBPS: [u32; 3] = [100, 300, 600];

/// One resolution/bitrate variant derived for a single ingestion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub name: String,
    pub resolution: Resolution,
    pub bitrate_kbps: u32,
}

/// Derive the rendition ladder for a source bitrate.
///
/// Tiers are `low = max(100, s/3)`, `medium = max(300, s)` and
/// `high = max(600, 3s)`, paired with `resolutions` in order. An unknown
/// source bitrate is treated as 0, which yields the floors. Resolutions
/// beyond the third are ignored.
pub fn ladder_for(source_kbps: Option<u32>, resolutions: &[Resolution]) -> Vec<Rendition> {
    let source = source_kbps.unwrap_or(0);
    let derived = [source / 3, source, source.saturating_mul(3)];

    TIER_NAMES
        .iter()
        .zip(resolutions)
        .enumerate()
        .map(|(tier, (name, resolution))| Rendition {
            name: (*name).to_string(),
            resolution: *resolution,
            bitrate_kbps: derived[tier].max(FLOORS_KBPS[tier]),
        })
        .collect()
}
