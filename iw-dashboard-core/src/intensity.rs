use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipCell {
    pub zip: String,
    pub value: f64,
    /// Position on the `[0, upper_limit]` scale, clamped to `0..=1`.
    pub ratio: f64,
}

/// Linear per-zip scale used to shade the zip table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipIntensity {
    pub upper_limit: f64,
    pub cells: Vec<ZipCell>,
}

impl ZipIntensity {
    /// Missing values count as zero. The scale never collapses to `[0, 0]`.
    pub fn from_values(values: &BTreeMap<String, Option<f64>>) -> Self {
        let max = values.values().map(|v| v.unwrap_or(0.0)).fold(f64::NEG_INFINITY, f64::max);
        let upper_limit = if max.is_finite() { max.floor().max(1.0) } else { 1.0 };
        let cells = values
            .iter()
            .map(|(zip, v)| {
                let value = v.unwrap_or(0.0);
                ZipCell { zip: zip.clone(), value, ratio: (value / upper_limit).clamp(0.0, 1.0) }
            })
            .collect();
        Self { upper_limit, cells }
    }

    pub fn from_counts(counts: &BTreeMap<String, u64>) -> Self {
        let values = counts.iter().map(|(k, v)| (k.clone(), Some(*v as f64))).collect();
        Self::from_values(&values)
    }

    pub fn get(&self, zip: &str) -> Option<&ZipCell> {
        self.cells.iter().find(|c| c.zip == zip)
    }
}

/// Interpolate between two RGB colours.
pub fn lerp_rgb(min: (u8, u8, u8), max: (u8, u8, u8), ratio: f64) -> (u8, u8, u8) {
    let t = ratio.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    (mix(min.0, max.0), mix(min.1, max.1), mix(min.2, max.2))
}
