//! Tag cloud weighting.
//!
//! Each tag's font size and colour are interpolated linearly between two
//! endpoints according to where its count sits between the smallest and
//! largest count in the set.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::TagCloudConfig;

/// An RGB colour with fractional channels, so increments can be scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexColour {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl HexColour {
    /// Parse `#rrggbb` (leading `#` optional).
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::validation(format!(
                "colour '{s}' is not of the form #rrggbb"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map(f64::from)
                .map_err(|e| AppError::validation(format!("colour '{s}': {e}")))
        };
        Ok(Self {
            red: channel(0..2)?,
            green: channel(2..4)?,
            blue: channel(4..6)?,
        })
    }

    fn offset(self, step: HexColour, times: f64) -> Self {
        Self {
            red: self.red + step.red * times,
            green: self.green + step.green * times,
            blue: self.blue + step.blue * times,
        }
    }
}

impl fmt::Display for HexColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let byte = |v: f64| v.clamp(0.0, 255.0) as u8;
        write!(
            f,
            "#{:02x}{:02x}{:02x}",
            byte(self.red),
            byte(self.green),
            byte(self.blue)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagCloudOptions {
    pub size_start: f64,
    pub size_end: f64,
    pub colour_start: HexColour,
    pub colour_end: HexColour,
}

impl TagCloudOptions {
    pub fn from_config(config: &TagCloudConfig) -> Result<Self> {
        Ok(Self {
            size_start: config.size_start,
            size_end: config.size_end,
            colour_start: HexColour::parse(&config.colour_start)?,
            colour_end: HexColour::parse(&config.colour_end)?,
        })
    }
}

/// Rendering hints for one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagCloudEntry {
    pub size: f64,
    /// `#rrggbb`
    pub colour: String,
}

/// Compute the size and colour of every tag in `counts`.
pub fn build_tag_cloud(
    counts: &BTreeMap<String, u64>,
    options: &TagCloudOptions,
) -> BTreeMap<String, TagCloudEntry> {
    let (Some(&min), Some(&max)) = (counts.values().min(), counts.values().max()) else {
        return BTreeMap::new();
    };

    // Equal counts would divide by zero; every tag then gets the start values.
    let range = match max - min {
        0 => 1.0,
        r => r as f64,
    };

    let size_step = (options.size_end - options.size_start) / range;
    let colour_step = HexColour {
        red: (options.colour_end.red - options.colour_start.red) / range,
        green: (options.colour_end.green - options.colour_start.green) / range,
        blue: (options.colour_end.blue - options.colour_start.blue) / range,
    };

    counts
        .iter()
        .map(|(tag, &count)| {
            let weighting = (count - min) as f64;
            let entry = TagCloudEntry {
                size: options.size_start + size_step * weighting,
                colour: options.colour_start.offset(colour_step, weighting).to_string(),
            };
            (tag.clone(), entry)
        })
        .collect()
}
