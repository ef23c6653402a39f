//! Newick parser
//!
//! Single pass over the raw text with an explicit stack of open clades. Supports quoted labels,
//! `[...]` comments, internal node names and branch lengths. Numeric
//! internal labels are read as confidence values, not names.

use super::{Clade, CladeId, Tree, TreeError};

/// Parse a single Newick tree.
///
/// The trailing `;` is optional; anything after it is ignored.
pub fn parse(input: &str) -> Result<Tree, TreeError> {
    let mut parser = Parser::new(input);
    parser.skip_trivia()?;
    if parser.at_end() {
        return Err(TreeError::Empty);
    }

    let root = parser.parse_clade()?;
    parser.skip_trivia()?;
    match parser.peek() {
        None | Some(b';') => {}
        Some(c) => {
            return Err(parser.error(format!("unexpected '{}' after tree", c as char)));
        }
    }

    Ok(Tree::from_parts(parser.clades, root))
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    clades: Vec<Clade>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            clades: Vec::new(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> TreeError {
        TreeError::SyntaxError {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Skip whitespace and bracketed comments
    fn skip_trivia(&mut self) -> Result<(), TreeError> {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b'[' {
                let start = self.pos;
                match self.input[self.pos..].find(']') {
                    Some(offset) => self.pos += offset + 1,
                    None => {
                        return Err(TreeError::SyntaxError {
                            position: start,
                            message: "unterminated comment".into(),
                        });
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Parse one clade and everything below it. Open parentheses are kept
    /// on an explicit stack so nesting depth is not limited by the call
    /// stack.
    fn parse_clade(&mut self) -> Result<CladeId, TreeError> {
        // children collected so far for each unclosed '('
        let mut open: Vec<Vec<CladeId>> = Vec::new();

        loop {
            while self.peek() == Some(b'(') {
                self.pos += 1;
                open.push(Vec::new());
                self.skip_trivia()?;
            }

            let mut children = Vec::new();
            loop {
                let id = self.finish_clade(children)?;
                let Some(mut siblings) = open.pop() else {
                    return Ok(id);
                };
                siblings.push(id);

                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                        self.skip_trivia()?;
                        open.push(siblings);
                        break;
                    }
                    Some(b')') => {
                        self.pos += 1;
                        self.skip_trivia()?;
                        children = siblings;
                    }
                    Some(c) => {
                        return Err(self.error(format!("expected ',' or ')', found '{}'", c as char)));
                    }
                    None => return Err(self.error("unexpected end of input inside clade")),
                }
            }
        }
    }

    /// Read the label and branch length following a clade's children
    fn finish_clade(&mut self, children: Vec<CladeId>) -> Result<CladeId, TreeError> {
        let label = self.parse_label()?;
        self.skip_trivia()?;

        let branch_length = if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_trivia()?;
            Some(self.parse_number()?)
        } else {
            None
        };
        self.skip_trivia()?;

        let (name, confidence) = match label {
            Some(text) if !children.is_empty() => match text.parse::<f64>() {
                Ok(value) => (None, Some(value)),
                Err(_) => (Some(text), None),
            },
            other => (other, None),
        };

        self.clades.push(Clade {
            name,
            branch_length,
            confidence,
            children,
        });
        Ok(self.clades.len() - 1)
    }

    fn parse_label(&mut self) -> Result<Option<String>, TreeError> {
        match self.peek() {
            Some(quote @ (b'\'' | b'"')) => self.parse_quoted(quote).map(Some),
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if matches!(c, b'(' | b')' | b',' | b':' | b';' | b'[') || c.is_ascii_whitespace()
                    {
                        break;
                    }
                    self.pos += 1;
                }
                let text = &self.input[start..self.pos];
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
        }
    }

    fn parse_quoted(&mut self, quote: u8) -> Result<String, TreeError> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        loop {
            let rest = &self.input[self.pos..];
            let Some(offset) = rest.find(quote as char) else {
                return Err(TreeError::SyntaxError {
                    position: start,
                    message: "unterminated quoted label".into(),
                });
            };
            text.push_str(&rest[..offset]);
            self.pos += offset + 1;
            // doubled quote is an escaped quote
            if self.peek() == Some(quote) {
                text.push(quote as char);
                self.pos += 1;
            } else {
                return Ok(text);
            }
        }
    }

    fn parse_number(&mut self) -> Result<f64, TreeError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, b'.' | b'-' | b'+' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>().map_err(|_| TreeError::SyntaxError {
            position: start,
            message: format!("invalid branch length '{}'", text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let tree = parse("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;").unwrap();
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.clade(tree.root()).name.as_deref(), Some("F"));

        let e = tree.find("E").unwrap();
        assert_eq!(tree.clade(e).branch_length, Some(0.5));
        assert_eq!(tree.clade(e).children.len(), 2);
    }

    #[test]
    fn test_parse_without_semicolon() {
        let tree = parse("(A,B)").unwrap();
        assert_eq!(tree.terminal_names(), ["A", "B"]);
    }

    #[test]
    fn test_parse_quoted_and_comments() {
        let tree = parse("('sample one':1[&comment],'it''s':2e-1)[root];").unwrap();
        assert_eq!(tree.terminal_names(), ["sample one", "it's"]);
        let leaf = tree.find("it's").unwrap();
        assert_eq!(tree.clade(leaf).branch_length, Some(0.2));
    }

    #[test]
    fn test_parse_bootstrap_labels() {
        let tree = parse("((A:1,B:1)95:0.5,C:2);").unwrap();
        let internal = tree.clade(tree.root()).children[0];
        assert_eq!(tree.clade(internal).name, None);
        assert_eq!(tree.clade(internal).confidence, Some(95.0));
    }

    #[test]
    fn test_parse_multiline() {
        let tree = parse("(\n  A:1,\n  B:2\n);\n").unwrap();
        assert_eq!(tree.count_terminals(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(""), Err(TreeError::Empty)));
        assert!(matches!(parse("(A,B"), Err(TreeError::SyntaxError { .. })));
        assert!(matches!(parse("(A:x,B)"), Err(TreeError::SyntaxError { .. })));
        assert!(matches!(parse("(A,B)C D"), Err(TreeError::SyntaxError { .. })));
        assert!(matches!(parse("((A,B),C"), Err(TreeError::SyntaxError { .. })));
    }

    #[test]
    fn test_parse_empty_leaves() {
        let tree = parse("(,(,));").unwrap();
        assert_eq!(tree.count_terminals(), 3);
        assert!(tree.terminal_names().is_empty());
    }

    #[test]
    fn test_parse_deep_ladder() {
        let depth = 100_000;
        let mut text = "(".repeat(depth);
        text.push_str("L0:1");
        for i in 1..=depth {
            text.push_str(&format!(",L{}:1)", i));
        }
        text.push(';');

        let tree = parse(&text).unwrap();
        assert_eq!(tree.count_terminals(), depth + 1);
        assert_eq!(tree.len(), 2 * depth + 1);
        assert_eq!(tree.terminal_names()[0], "L0");
    }
}
