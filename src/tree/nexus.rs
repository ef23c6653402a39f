//! NEXUS tree block reader
//!
//! Only the `TREES` block is read: the first `TREE` statement is parsed
//! as Newick and leaf labels are mapped through `TRANSLATE` if present.

use std::collections::HashMap;

use super::{Tree, TreeError, newick};

pub fn parse(input: &str) -> Result<Tree, TreeError> {
    if !input.trim_start().to_ascii_uppercase().starts_with("#NEXUS") {
        return Err(TreeError::SyntaxError {
            position: 0,
            message: "missing #NEXUS header".into(),
        });
    }

    let block = trees_block(input).ok_or(TreeError::Empty)?;
    let statements = split_statements(block);

    let mut translate = HashMap::new();
    for statement in &statements {
        let trimmed = statement.trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some(body) = strip_keyword(trimmed, &upper, "TRANSLATE") {
            translate = parse_translate(body);
        } else if let Some(body) = strip_keyword(trimmed, &upper, "TREE") {
            let newick_text = body
                .split_once('=')
                .map(|(_, rhs)| rhs)
                .ok_or_else(|| TreeError::SyntaxError {
                    position: 0,
                    message: "TREE statement without '='".into(),
                })?;
            let mut tree = newick::parse(newick_text)?;
            apply_translation(&mut tree, &translate);
            return Ok(tree);
        }
    }

    Err(TreeError::Empty)
}

/// Text between `BEGIN TREES;` and the matching `END;`
fn trees_block(input: &str) -> Option<&str> {
    let upper = input.to_ascii_uppercase();
    let begin = upper.find("BEGIN TREES")?;
    let body_start = begin + upper[begin..].find(';')? + 1;
    let body_len = upper[body_start..]
        .find("END;")
        .or_else(|| upper[body_start..].find("ENDBLOCK;"))
        .unwrap_or(input.len() - body_start);
    Some(&input[body_start..body_start + body_len])
}

/// Split on `;` outside quotes and comments
fn split_statements(block: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut comment_depth = 0usize;

    for (i, c) in block.char_indices() {
        match c {
            '\'' if comment_depth == 0 => in_quote = !in_quote,
            '[' if !in_quote => comment_depth += 1,
            ']' if !in_quote => comment_depth = comment_depth.saturating_sub(1),
            ';' if !in_quote && comment_depth == 0 => {
                statements.push(&block[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !block[start..].trim().is_empty() {
        statements.push(&block[start..]);
    }
    statements
}

fn strip_keyword<'a>(statement: &'a str, upper: &str, keyword: &str) -> Option<&'a str> {
    let rest = upper.strip_prefix(keyword)?;
    // keyword must be a whole word
    if rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(&statement[keyword.len()..])
}

fn parse_translate(body: &str) -> HashMap<String, String> {
    body.split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let key = parts.next()?;
            let value = parts.collect::<Vec<_>>().join(" ");
            let value = value.trim_matches('\'').to_string();
            (!value.is_empty()).then(|| (key.to_string(), value))
        })
        .collect()
}

fn apply_translation(tree: &mut Tree, translate: &HashMap<String, String>) {
    if translate.is_empty() {
        return;
    }
    for id in tree.terminals() {
        let clade = tree.clade_mut(id);
        if let Some(name) = clade.name.as_ref().and_then(|n| translate.get(n)) {
            clade.name = Some(name.clone());
        }
    }
}
