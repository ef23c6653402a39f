//! Plotly figure for the tree
//!
//! The figure is plain serde data handed to `Plotly.newPlot` in the
//! report. Trace 0 holds the node markers with hover text, trace 1 the
//! (initially hidden) labels, and the branches are drawn as one SVG path
//! shape below the markers.

use serde::Serialize;

use crate::colour::{ColourOption, ColourSettings, colour_options, default_colour_column};
use crate::labels::{LabelSettings, hover_text, initial_labels};
use crate::layout::{TreeLayout, branch_lines, svg_path};
use crate::metadata::Metadata;
use crate::tree::Tree;

pub const DEFAULT_PLOT_HEIGHT: u32 = 900;
pub const MARKER_SIZE: u32 = 10;
const BRANCH_COLOUR: &str = "rgb(25,25,25)";
const PLOT_BACKGROUND: &str = "rgb(250,250,250)";

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mode: &'static str,
    pub text: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoverinfo: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub color: Vec<String>,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub title: Title,
    pub font: Font,
    pub showlegend: bool,
    pub autosize: bool,
    pub height: u32,
    pub xaxis: XAxis,
    pub yaxis: YAxis,
    pub hovermode: &'static str,
    pub plot_bgcolor: &'static str,
    pub margin: Margin,
    pub shapes: Vec<Shape>,
    pub updatemenus: Vec<UpdateMenu>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub text: String,
    pub yanchor: &'static str,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Font {
    pub family: &'static str,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct XAxis {
    pub showline: bool,
    pub zeroline: bool,
    pub showgrid: bool,
    pub ticklen: u32,
    pub showticklabels: bool,
    pub title: AxisTitle,
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisTitle {
    pub text: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct YAxis {
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Margin {
    pub l: u32,
    pub t: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub path: String,
    pub line: ShapeLine,
    pub layer: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeLine {
    pub color: &'static str,
    pub width: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateMenu {
    pub buttons: Vec<MenuButton>,
    pub active: usize,
    pub direction: &'static str,
    pub pad: Pad,
    pub showactive: bool,
    pub x: f64,
    pub xanchor: &'static str,
    pub y: f64,
    pub yanchor: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pad {
    pub r: u32,
    pub t: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuButton {
    pub label: String,
    pub method: &'static str,
    pub args: serde_json::Value,
}

impl MenuButton {
    /// Recolour the markers of trace 0 only. `update` rather than `restyle`
    /// so the page can tell dropdown changes from its own highlighting.
    fn recolour(option: ColourOption) -> Self {
        Self {
            label: option.column,
            method: "update",
            args: serde_json::json!([{ "marker.color": [option.colours] }, {}, [0]]),
        }
    }
}

/// Everything about the figure that is not derived from the data
#[derive(Debug, Clone)]
pub struct FigureSettings {
    pub title: String,
    pub plot_height: u32,
    pub colours: ColourSettings,
    pub labels: LabelSettings,
}

impl Default for FigureSettings {
    fn default() -> Self {
        Self {
            title: String::new(),
            plot_height: DEFAULT_PLOT_HEIGHT,
            colours: ColourSettings::default(),
            labels: LabelSettings::default(),
        }
    }
}

/// Build the Plotly figure for a laid-out tree. Nodes are plotted in
/// preorder.
pub fn build_figure(
    tree: &Tree,
    layout: &TreeLayout,
    metadata: &Metadata,
    settings: &FigureSettings,
) -> Figure {
    let order = tree.preorder();
    let nodes: Vec<Option<&str>> = order
        .iter()
        .map(|&id| tree.clade(id).name.as_deref())
        .collect();
    let x: Vec<f64> = order.iter().map(|&id| layout.x[id]).collect();
    let y: Vec<f64> = order.iter().map(|&id| layout.y[id]).collect();

    let options = colour_options(metadata, &nodes, &settings.colours);
    let default_column = default_colour_column(metadata, &settings.colours);
    let active = default_column
        .and_then(|column| options.iter().position(|o| o.column == column))
        .unwrap_or(0);
    let initial_colours = options
        .get(active)
        .map(|o| o.colours.clone())
        .unwrap_or_else(|| vec![settings.colours.internal_node_colour.clone(); nodes.len()]);

    let markers = Trace {
        kind: "scattergl",
        x: x.clone(),
        y: y.clone(),
        mode: "markers",
        text: hover_text(metadata, &nodes),
        marker: Some(Marker {
            color: initial_colours,
            size: MARKER_SIZE,
        }),
        opacity: Some(1.0),
        hoverinfo: Some("text"),
        textposition: None,
        visible: None,
    };

    let labels = Trace {
        kind: "scattergl",
        x,
        y,
        mode: "text",
        text: initial_labels(metadata, &nodes, &settings.labels),
        marker: None,
        opacity: None,
        hoverinfo: None,
        textposition: Some("middle right"),
        visible: Some(false),
    };

    let menu = UpdateMenu {
        buttons: options.into_iter().map(MenuButton::recolour).collect(),
        active,
        direction: "down",
        pad: Pad { r: 10, t: 10 },
        showactive: true,
        x: 1.01,
        xanchor: "right",
        y: 1.075,
        yanchor: "top",
    };

    let layout = Layout {
        title: Title {
            text: format!("{}; (n={})", settings.title, tree.count_terminals()),
            yanchor: "top",
            y: 0.95,
        },
        font: Font {
            family: "Arial",
            size: 14,
        },
        showlegend: false,
        autosize: true,
        height: settings.plot_height,
        xaxis: XAxis {
            showline: true,
            zeroline: false,
            showgrid: false,
            ticklen: 4,
            showticklabels: true,
            title: AxisTitle {
                text: "Branch Length",
            },
        },
        yaxis: YAxis { visible: false },
        hovermode: "closest",
        plot_bgcolor: PLOT_BACKGROUND,
        margin: Margin { l: 10, t: 150 },
        shapes: vec![Shape {
            kind: "path",
            path: svg_path(&branch_lines(tree, layout)),
            line: ShapeLine {
                color: BRANCH_COLOUR,
                width: 1,
            },
            layer: "below",
        }],
        updatemenus: vec![menu],
    };

    Figure {
        data: vec![markers, labels],
        layout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DEFAULT_LEAF_SPACING;
    use crate::table::parse_table;
    use crate::tree::newick;

    fn figure() -> Figure {
        let tree = newick::parse("(A:0.1,(B:0.2,C:0.3)E:0.5)F;").unwrap();
        let layout = TreeLayout::compute(&tree, DEFAULT_LEAF_SPACING);
        let metadata = Metadata::from_table(
            parse_table("ID,country,date\nA,UK,2024-01-01\nB,FR,2024-02-01\nC,UK,\n").unwrap(),
            None,
        )
        .unwrap();
        let settings = FigureSettings {
            title: "Outbreak".into(),
            ..Default::default()
        };
        build_figure(&tree, &layout, &metadata, &settings)
    }

    #[test]
    fn test_traces_follow_preorder() {
        let fig = figure();
        let markers = &fig.data[0];
        assert_eq!(markers.x.len(), 5);
        assert_eq!(markers.text[0], "F");
        assert!(markers.text[1].starts_with("A<br>ID: A<br>"));
        assert_eq!(markers.text[2], "E");

        let labels = &fig.data[1];
        assert_eq!(labels.mode, "text");
        assert_eq!(labels.visible, Some(false));
        assert_eq!(labels.text[1], "\t\t\tA");
    }

    #[test]
    fn test_default_colouring() {
        let fig = figure();
        let menu = &fig.layout.updatemenus[0];
        let labels: Vec<&str> = menu.buttons.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["ID", "country", "date"]);
        // first column after the ID
        assert_eq!(menu.active, 1);

        let colours = &fig.data[0].marker.as_ref().unwrap().color;
        assert_eq!(colours[0], "rgb(100,100,100)");
        // FR sorts before UK
        assert_eq!(colours[1], "#E15F99");
        assert_eq!(colours[3], "#2E91E5");
    }

    #[test]
    fn test_layout() {
        let fig = figure();
        assert_eq!(fig.layout.title.text, "Outbreak; (n=3)");
        assert_eq!(fig.layout.height, DEFAULT_PLOT_HEIGHT);
        assert!(fig.layout.shapes[0].path.starts_with("M 0 "));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(figure()).unwrap();
        assert_eq!(json["data"][0]["type"], "scattergl");
        assert!(json["data"][1].get("marker").is_none());
        assert_eq!(json["layout"]["shapes"][0]["type"], "path");
        assert_eq!(json["layout"]["shapes"][0]["layer"], "below");

        let button = &json["layout"]["updatemenus"][0]["buttons"][1];
        assert_eq!(button["method"], "update");
        assert_eq!(button["args"][2], serde_json::json!([0]));
        assert_eq!(button["args"][0]["marker.color"][0].as_array().unwrap().len(), 5);
    }
}
