//! Hover text and node labels
//!
//! The browser rebuilds labels when the user changes fields, so the rules
//! here must agree with `showLabels` in `web-assets/main.js`.

use std::fmt::Write as _;

use crate::metadata::{CELL_LINE_BREAK, ID_COLUMN, Metadata, Record};

/// Left padding that keeps labels clear of the marker
pub const LABEL_PADDING: &str = "\t\t\t";

pub const DEFAULT_LABEL_SEPARATOR: &str = " | ";

/// Label settings, filled from the `[labels]` config section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSettings {
    /// Placed between built label fields
    pub separator: String,
    /// Fields joined into each label; empty means label by `label_by`
    pub fields: Vec<String>,
    pub label_by: String,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            separator: DEFAULT_LABEL_SEPARATOR.to_string(),
            fields: Vec::new(),
            label_by: ID_COLUMN.to_string(),
        }
    }
}

/// Hover text per node: the node name, followed by every metadata field
/// when the name is a sample ID.
pub fn hover_text(metadata: &Metadata, nodes: &[Option<&str>]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| {
            let Some(name) = node else {
                return String::new();
            };
            let mut text = name.to_string();
            if let Some(record) = metadata.get(name) {
                text.push_str(CELL_LINE_BREAK);
                for (column, value) in record.fields() {
                    let _ = write!(text, "{column}: {value}{CELL_LINE_BREAK}");
                }
            }
            text
        })
        .collect()
}

/// Label for one sample: the built fields joined by the separator, or the
/// single `label_by` field when nothing has been built.
pub fn build_label(record: &Record<'_>, settings: &LabelSettings) -> String {
    let body = if settings.fields.is_empty() {
        record.get(&settings.label_by).unwrap_or_default().to_string()
    } else {
        settings
            .fields
            .iter()
            .map(|field| record.get(field).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(&settings.separator)
    };
    format!("{LABEL_PADDING}{body}")
}

/// Text for the label trace as first rendered.
///
/// With configured fields every sample gets its built label and other
/// nodes stay blank; otherwise each named node shows its name.
pub fn initial_labels(
    metadata: &Metadata,
    nodes: &[Option<&str>],
    settings: &LabelSettings,
) -> Vec<String> {
    nodes
        .iter()
        .map(|node| match node {
            None => String::new(),
            Some(name) if settings.fields.is_empty() => format!("{LABEL_PADDING}{name}"),
            Some(name) => metadata
                .get(name)
                .map(|record| build_label(&record, settings))
                .unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::DistanceMatrix;
    use crate::table::parse_table;

    fn metadata() -> Metadata {
        let text = "ID,name,last\n\
                    A,Ashley,Anon\n\
                    D,Deborah,Doe\n\
                    D1,Dmitri,Dunn\n";
        Metadata::from_table(parse_table(text).unwrap(), None).unwrap()
    }

    #[test]
    fn test_hover_text() {
        let md = metadata();
        let text = hover_text(&md, &[Some("A"), None, Some("F")]);
        assert_eq!(text[0], "A<br>ID: A<br>name: Ashley<br>last: Anon<br>");
        assert_eq!(text[1], "");
        assert_eq!(text[2], "F");
    }

    #[test]
    fn test_hover_text_matches_exactly() {
        let md = metadata();
        let text = hover_text(&md, &[Some("D1")]);
        assert_eq!(text[0], "D1<br>ID: D1<br>name: Dmitri<br>last: Dunn<br>");
    }

    #[test]
    fn test_hover_text_with_neighbours() {
        let mut md = metadata();
        let matrix = DistanceMatrix::from_table(
            parse_table(",A,D,D1\nA,0,1,1\nD,1,0,2\nD1,1,2,0\n").unwrap(),
        )
        .unwrap();
        md.add_nearest_neighbours(&matrix);
        let text = hover_text(&md, &[Some("A")]);
        assert!(text[0].ends_with("Nearest_neighbour: D=1<br>D1=1<br>"));
    }

    #[test]
    fn test_build_label() {
        let md = metadata();
        let record = md.get("A").unwrap();

        let by_name = LabelSettings {
            label_by: "name".into(),
            ..Default::default()
        };
        assert_eq!(build_label(&record, &by_name), "\t\t\tAshley");

        let built = LabelSettings {
            fields: vec!["name".into(), "last".into(), "missing".into()],
            ..Default::default()
        };
        assert_eq!(build_label(&record, &built), "\t\t\tAshley | Anon | ");
    }

    #[test]
    fn test_initial_labels() {
        let md = metadata();
        let nodes = [Some("A"), None, Some("internal")];

        let plain = initial_labels(&md, &nodes, &LabelSettings::default());
        assert_eq!(plain, ["\t\t\tA", "", "\t\t\tinternal"]);

        let built = LabelSettings {
            fields: vec!["ID".into(), "name".into()],
            separator: "/".into(),
            ..Default::default()
        };
        assert_eq!(initial_labels(&md, &nodes, &built), ["\t\t\tA/Ashley", "", ""]);
    }
}
