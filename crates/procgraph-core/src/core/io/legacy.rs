//! Reader for the legacy line-oriented procedure format.
//!
//! ```text
//! Procedure
//!   Parameters 'Params'
//!     Parameter rho 0.1
//!   EndParameters
//!   Add
//!     Species 'Water'
//!     Population '50*2'
//!   EndAdd
//! EndProcedure
//! ```
//!
//! The reader only recovers the block structure. Interpreting keyword arguments is left
//! to the node types, which is why the reader needs a [`LegacyGrammar`] to tell node
//! lines from keyword lines.

use super::error::DocumentError;

/// Knowledge about node types needed to split a legacy file into blocks.
pub trait LegacyGrammar {
    /// Returns the canonical tag if `word` names a node type.
    fn node_tag(&self, word: &str) -> Option<String>;
    /// Returns the branch keyword of the node type `tag`, if it has a branch.
    fn branch_keyword(&self, tag: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyKeyword {
    pub name: String,
    pub args: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyNode {
    pub tag: String,
    pub name: Option<String>,
    pub line: usize,
    pub keywords: Vec<LegacyKeyword>,
    pub branch: Vec<LegacyNode>,
}

/// Splits a line into tokens. Quotes group words and `#` outside quotes starts a comment.
pub fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;
    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '#' => break,
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() || c == ',' => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

struct Lines {
    lines: Vec<(usize, Vec<String>)>,
    cursor: usize,
}

impl Lines {
    fn next(&mut self) -> Option<(usize, Vec<String>)> {
        let next = self.lines.get(self.cursor).cloned();
        self.cursor += 1;
        next
    }
}

/// Parses a legacy procedure into its top-level nodes.
///
/// # Errors
///
/// Returns [`DocumentError::Legacy`] with the 1-based line number for unknown node
/// types, lines outside the `Procedure` block, unterminated blocks and bad quoting.
pub fn parse_legacy(
    text: &str,
    grammar: &dyn LegacyGrammar,
) -> Result<Vec<LegacyNode>, DocumentError> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let tokens = tokenize_line(raw).map_err(|message| DocumentError::Legacy {
            line: index + 1,
            message,
        })?;
        if !tokens.is_empty() {
            lines.push((index + 1, tokens));
        }
    }
    let mut lines = Lines { lines, cursor: 0 };

    let (line, tokens) = lines.next().ok_or(DocumentError::Legacy {
        line: 1,
        message: "expected 'Procedure'".to_string(),
    })?;
    if !tokens[0].eq_ignore_ascii_case("Procedure") {
        return Err(DocumentError::Legacy {
            line,
            message: format!("expected 'Procedure', found '{}'", tokens[0]),
        });
    }
    let nodes = parse_sequence(&mut lines, grammar, "EndProcedure", ("Procedure", line))?;
    if let Some((line, tokens)) = lines.next() {
        return Err(DocumentError::Legacy {
            line,
            message: format!("unexpected '{}' after 'EndProcedure'", tokens[0]),
        });
    }
    Ok(nodes)
}

fn parse_sequence(
    lines: &mut Lines,
    grammar: &dyn LegacyGrammar,
    terminator: &str,
    opened_by: (&str, usize),
) -> Result<Vec<LegacyNode>, DocumentError> {
    let mut nodes = Vec::new();
    loop {
        let Some((line, tokens)) = lines.next() else {
            return Err(unterminated(opened_by));
        };
        let word = &tokens[0];
        if word.eq_ignore_ascii_case(terminator) {
            return Ok(nodes);
        }
        let tag = grammar.node_tag(word).ok_or_else(|| DocumentError::Legacy {
            line,
            message: format!("unknown node type '{}'", word),
        })?;
        let name = match tokens.len() {
            1 => None,
            2 => Some(tokens[1].clone()),
            _ => {
                return Err(DocumentError::Legacy {
                    line,
                    message: format!("too many arguments to node '{}'", tag),
                });
            }
        };
        nodes.push(parse_node(lines, grammar, tag, name, line)?);
    }
}

fn parse_node(
    lines: &mut Lines,
    grammar: &dyn LegacyGrammar,
    tag: String,
    name: Option<String>,
    start: usize,
) -> Result<LegacyNode, DocumentError> {
    let terminator = format!("End{}", tag);
    let branch_keyword = grammar.branch_keyword(&tag);
    let mut node = LegacyNode {
        tag,
        name,
        line: start,
        keywords: Vec::new(),
        branch: Vec::new(),
    };
    loop {
        let Some((line, mut tokens)) = lines.next() else {
            return Err(unterminated((node.tag.as_str(), start)));
        };
        if tokens[0].eq_ignore_ascii_case(&terminator) {
            return Ok(node);
        }
        if let Some(branch) = &branch_keyword {
            if tokens[0].eq_ignore_ascii_case(branch) {
                let end = format!("End{}", branch);
                node.branch
                    .extend(parse_sequence(lines, grammar, &end, (branch.as_str(), line))?);
                continue;
            }
        }
        let name = tokens.remove(0);
        node.keywords.push(LegacyKeyword {
            name,
            args: tokens,
            line,
        });
    }
}

fn unterminated((block, line): (&str, usize)) -> DocumentError {
    DocumentError::Legacy {
        line,
        message: format!("block '{}' is never closed", block),
    }
}
