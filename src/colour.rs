//! Node colourings
//!
//! Every metadata column that can be coloured yields one colour per plotted
//! node, in the figure's node order. Categorical columns draw from a fixed
//! qualitative palette; date columns use a continuous gradient from the
//! newest sample (blue) to the oldest (dark red).

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use log::debug;
use serde::Serialize;

use crate::dates::parse_date;
use crate::metadata::{ID_COLUMN, Metadata};

/// Plotly's Dark24 qualitative palette
pub const DARK24: [&str; 24] = [
    "#2E91E5", "#E15F99", "#1CA71C", "#FB0D0D", "#DA16FF", "#222A2A", "#B68100", "#750D86",
    "#EB663B", "#511CFB", "#00A08B", "#FB00D1", "#FC0080", "#B2828D", "#6C7C32", "#778AAE",
    "#862A16", "#A777F1", "#620042", "#1616A7", "#DA60CA", "#6C4516", "#0D2A63", "#AF0038",
];

/// Plotly's Light24 qualitative palette
pub const LIGHT24: [&str; 24] = [
    "#FD3216", "#00FE35", "#6A76FC", "#FED4C4", "#FE00CE", "#0DF9FF", "#F6F926", "#FF9616",
    "#479B55", "#EEA6FB", "#DC587D", "#D626FF", "#6E899C", "#00B5F7", "#B68E00", "#C9FBE5",
    "#FF0092", "#22FFA7", "#E3EE9E", "#86CE00", "#BC7196", "#7E7DCD", "#FC6955", "#E48F72",
];

/// Jet colourscale stops
const JET: [(f64, [f64; 3]); 6] = [
    (0.0, [0.0, 0.0, 131.0]),
    (0.125, [0.0, 60.0, 170.0]),
    (0.375, [5.0, 255.0, 255.0]),
    (0.625, [255.0, 255.0, 0.0]),
    (0.875, [250.0, 0.0, 0.0]),
    (1.0, [128.0, 0.0, 0.0]),
];

pub const DEFAULT_INTERNAL_NODE_COLOUR: &str = "rgb(100,100,100)";
pub const DEFAULT_MAX_CATEGORIES: usize = 48;
pub const MISSING_DATE_COLOUR: &str = "rgb(0, 0, 0)";

/// Colouring knobs, filled from the `[colours]` config section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColourSettings {
    pub max_categories: usize,
    pub internal_node_colour: String,
}

impl Default for ColourSettings {
    fn default() -> Self {
        Self {
            max_categories: DEFAULT_MAX_CATEGORIES,
            internal_node_colour: DEFAULT_INTERNAL_NODE_COLOUR.to_string(),
        }
    }
}

/// One entry of the colour dropdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColourOption {
    pub column: String,
    pub colours: Vec<String>,
}

/// The 48 categorical colours, Dark24 then Light24
pub fn palette() -> impl Iterator<Item = &'static str> + Clone {
    DARK24.into_iter().chain(LIGHT24)
}

/// Columns whose name mentions a date get a gradient
pub fn is_date_column(name: &str) -> bool {
    name.to_lowercase().contains("date")
}

/// Sample the Jet colourscale at `t` in `[0, 1]`
pub fn jet(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let upper = JET.iter().position(|&(stop, _)| stop >= t).unwrap_or(JET.len() - 1);
    let rgb = if upper == 0 {
        JET[0].1
    } else {
        let (lo_stop, lo) = JET[upper - 1];
        let (hi_stop, hi) = JET[upper];
        let f = (t - lo_stop) / (hi_stop - lo_stop);
        [0, 1, 2].map(|c| lo[c] + f * (hi[c] - lo[c]))
    };
    format!(
        "rgb({}, {}, {})",
        rgb[0].round() as u8,
        rgb[1].round() as u8,
        rgb[2].round() as u8
    )
}

/// Paint every node whose name is a metadata ID with `colour_of(value)`;
/// everything else gets `internal`.
fn paint<'a>(
    metadata: &'a Metadata,
    column: &str,
    nodes: &[Option<&str>],
    internal: &str,
    colour_of: impl Fn(&'a str) -> String,
) -> Vec<String> {
    nodes
        .iter()
        .map(|node| {
            node.and_then(|name| metadata.get(name))
                .and_then(|record| record.get(column))
                .map(&colour_of)
                .unwrap_or_else(|| internal.to_string())
        })
        .collect()
}

/// Categorical colours for `column`, or `None` if it has more distinct
/// values than `settings.max_categories`.
///
/// Distinct values are sorted so the same data always gets the same colours.
pub fn categorical_colours(
    metadata: &Metadata,
    column: &str,
    nodes: &[Option<&str>],
    settings: &ColourSettings,
) -> Option<Vec<String>> {
    let values: BTreeSet<&str> = metadata.column_values(column)?.into_iter().collect();
    if values.len() > settings.max_categories {
        debug!(
            "Column '{}' has {} distinct values; too many to colour",
            column,
            values.len()
        );
        return None;
    }

    let lookup: HashMap<&str, &str> = values.into_iter().zip(palette().cycle()).collect();
    Some(paint(
        metadata,
        column,
        nodes,
        &settings.internal_node_colour,
        |value| lookup.get(value).copied().unwrap_or(MISSING_DATE_COLOUR).to_string(),
    ))
}

/// Gradient colours for a date column. Samples without a readable date are
/// black, as is every sample when no date in the column parses.
pub fn date_colours(
    metadata: &Metadata,
    column: &str,
    nodes: &[Option<&str>],
    settings: &ColourSettings,
) -> Vec<String> {
    let dates: Vec<NaiveDate> = metadata
        .column_values(column)
        .unwrap_or_default()
        .into_iter()
        .filter_map(parse_date)
        .collect();

    let (Some(&newest), Some(&oldest)) = (dates.iter().max(), dates.iter().min()) else {
        debug!("No parseable dates in column '{}'", column);
        return paint(metadata, column, nodes, &settings.internal_node_colour, |_| {
            MISSING_DATE_COLOUR.to_string()
        });
    };

    let span = match (newest - oldest).num_days() {
        0 => 1,
        days => days,
    };

    paint(metadata, column, nodes, &settings.internal_node_colour, |value| {
        match parse_date(value) {
            Some(date) => jet((newest - date).num_days() as f64 / span as f64),
            None => MISSING_DATE_COLOUR.to_string(),
        }
    })
}

/// First column after the ID with few enough distinct values to colour
pub fn default_colour_column<'a>(metadata: &'a Metadata, settings: &ColourSettings) -> Option<&'a str> {
    metadata
        .columns()
        .iter()
        .filter(|c| c.as_str() != ID_COLUMN)
        .find(|c| metadata.distinct_count(c) <= settings.max_categories)
        .map(String::as_str)
}

/// Colourings for every date column and every categorical column with few
/// enough values, in column order
pub fn colour_options(
    metadata: &Metadata,
    nodes: &[Option<&str>],
    settings: &ColourSettings,
) -> Vec<ColourOption> {
    metadata
        .columns()
        .iter()
        .filter_map(|column| {
            let colours = if is_date_column(column) {
                date_colours(metadata, column, nodes, settings)
            } else {
                categorical_colours(metadata, column, nodes, settings)?
            };
            Some(ColourOption {
                column: column.clone(),
                colours,
            })
        })
        .collect()
}
