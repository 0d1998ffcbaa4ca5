//! Mermaid markup checks
//!
//! Catches the mistakes models make most often before the markup reaches a
//! renderer: a missing or misspelt diagram declaration, a bad flowchart
//! direction, and unbalanced brackets.

use serde::Serialize;

use super::error::RenderError;

const FLOWCHART_DIRECTIONS: [&str; 5] = ["TB", "TD", "BT", "RL", "LR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Gantt,
    Pie,
    Journey,
    Mindmap,
    Timeline,
}

impl DiagramKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        let kind = match keyword {
            "graph" | "flowchart" => DiagramKind::Flowchart,
            "sequenceDiagram" => DiagramKind::Sequence,
            "classDiagram" | "classDiagram-v2" => DiagramKind::Class,
            "stateDiagram" | "stateDiagram-v2" => DiagramKind::State,
            "erDiagram" => DiagramKind::EntityRelationship,
            "gantt" => DiagramKind::Gantt,
            "pie" => DiagramKind::Pie,
            "journey" => DiagramKind::Journey,
            "mindmap" => DiagramKind::Mindmap,
            "timeline" => DiagramKind::Timeline,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::State => "state",
            DiagramKind::EntityRelationship => "entity_relationship",
            DiagramKind::Gantt => "gantt",
            DiagramKind::Pie => "pie",
            DiagramKind::Journey => "journey",
            DiagramKind::Mindmap => "mindmap",
            DiagramKind::Timeline => "timeline",
        }
    }
}

impl std::fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identify the diagram type and check the markup for obvious syntax errors
pub fn check_diagram(markup: &str) -> Result<DiagramKind, RenderError> {
    let mut lines = markup
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with("%%"));

    let Some((line_no, header)) = lines.next() else {
        return Err(RenderError::diagram_syntax("Diagram is empty"));
    };

    // Statements may end with ';', headers included
    let mut words = header
        .split(|c: char| c.is_whitespace() || c == ';')
        .filter(|word| !word.is_empty());
    let keyword = words.next().unwrap_or_default();
    let kind = DiagramKind::from_keyword(keyword).ok_or_else(|| {
        RenderError::diagram_syntax(format!(
            "Unknown diagram type '{}' on line {}",
            keyword, line_no
        ))
    })?;

    if kind == DiagramKind::Flowchart {
        if let Some(direction) = words.next() {
            if !FLOWCHART_DIRECTIONS.contains(&direction) {
                return Err(RenderError::diagram_syntax(format!(
                    "Invalid flowchart direction '{}' on line {}",
                    direction, line_no
                )));
            }
        }
        check_brackets(markup)?;
    }

    Ok(kind)
}

/// Brackets outside double-quoted and `|edge|` labels must pair up
///
/// The asymmetric shape `id>label]` opens with `>` directly after a node id
/// at the top level; arrows such as `-->` never do.
fn check_brackets(markup: &str) -> Result<(), RenderError> {
    let mut open: Vec<(char, usize)> = Vec::new();

    for (n, line) in markup.lines().enumerate() {
        let line_no = n + 1;
        if line.trim_start().starts_with("%%") {
            continue;
        }
        let mut quoted = false;
        let mut edge_label = false;
        let mut prev = ' ';
        for c in line.chars() {
            match c {
                '"' => quoted = !quoted,
                _ if quoted => {}
                '|' if open.is_empty() => edge_label = !edge_label,
                _ if edge_label => {}
                '>' if open.is_empty() && (prev.is_alphanumeric() || prev == '_') => {
                    open.push(('>', line_no))
                }
                '[' | '(' | '{' => open.push((c, line_no)),
                ']' | ')' | '}' => {
                    let expected: &[char] = match c {
                        ']' => &['[', '>'],
                        ')' => &['('],
                        _ => &['{'],
                    };
                    match open.pop() {
                        Some((opener, _)) if expected.contains(&opener) => {}
                        _ => {
                            return Err(RenderError::diagram_syntax(format!(
                                "Unexpected '{}' on line {}",
                                c, line_no
                            )));
                        }
                    }
                }
                _ => {}
            }
            prev = c;
        }
    }

    match open.pop() {
        Some((opener, line_no)) => Err(RenderError::diagram_syntax(format!(
            "Unclosed '{}' opened on line {}",
            opener, line_no
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderErrorKind;

    #[test]
    fn test_flowchart() {
        let markup = "graph TD\n  A[Ingest] --> B(Release)\n  B --> C{Spike?}";
        assert_eq!(check_diagram(markup).unwrap(), DiagramKind::Flowchart);
        assert_eq!(check_diagram("flowchart LR\nA-->B").unwrap(), DiagramKind::Flowchart);
        assert_eq!(check_diagram("graph\nA-->B").unwrap(), DiagramKind::Flowchart);
    }

    #[test]
    fn test_leading_comments_and_blank_lines_skipped() {
        let markup = "\n%% signaling\n\nsequenceDiagram\n  Pituitary->>Liver: GH";
        assert_eq!(check_diagram(markup).unwrap(), DiagramKind::Sequence);
    }

    #[test]
    fn test_other_kinds() {
        assert_eq!(check_diagram("pie title Split\n\"A\" : 1").unwrap(), DiagramKind::Pie);
        assert_eq!(check_diagram("stateDiagram-v2\n[*] --> Fed").unwrap(), DiagramKind::State);
        assert_eq!(check_diagram("erDiagram").unwrap(), DiagramKind::EntityRelationship);
        assert_eq!(check_diagram("timeline\n  title Cycle").unwrap(), DiagramKind::Timeline);
    }

    #[test]
    fn test_unknown_type() {
        let err = check_diagram("this is not a diagram").unwrap_err();
        assert_eq!(err.kind, RenderErrorKind::DiagramSyntax);
        assert_eq!(err.message, "Unknown diagram type 'this' on line 1");
    }

    #[test]
    fn test_empty() {
        assert!(check_diagram("").is_err());
        assert!(check_diagram("  \n%% only a comment\n").is_err());
    }

    #[test]
    fn test_bad_direction() {
        let err = check_diagram("graph XY\nA-->B").unwrap_err();
        assert!(err.message.contains("'XY'"));
    }

    #[test]
    fn test_unclosed_bracket() {
        let err = check_diagram("graph TD\nA[Start --> B").unwrap_err();
        assert_eq!(err.message, "Unclosed '[' opened on line 2");
    }

    #[test]
    fn test_mismatched_bracket() {
        let err = check_diagram("graph TD\nA[Start) --> B").unwrap_err();
        assert_eq!(err.message, "Unexpected ')' on line 2");
    }

    #[test]
    fn test_statement_semicolons() {
        assert_eq!(check_diagram("graph TD;\nA-->B;").unwrap(), DiagramKind::Flowchart);
        assert_eq!(check_diagram("flowchart LR ;\nA-->B").unwrap(), DiagramKind::Flowchart);
        assert_eq!(check_diagram("graph;\nA-->B").unwrap(), DiagramKind::Flowchart);

        let err = check_diagram("graph XY;\nA-->B").unwrap_err();
        assert_eq!(err.message, "Invalid flowchart direction 'XY' on line 1");
    }

    #[test]
    fn test_asymmetric_node_shape() {
        let markup = "graph TD\nA>Ingest] --> B[Release]\nB -->|peak > 5| C>Spike]";
        assert_eq!(check_diagram(markup).unwrap(), DiagramKind::Flowchart);

        let err = check_diagram("graph TD\nA>Ingest --> B").unwrap_err();
        assert_eq!(err.message, "Unclosed '>' opened on line 2");
    }

    #[test]
    fn test_html_break_inside_label() {
        let markup = "graph TD\nA[Line one<br>two] --> B";
        assert_eq!(check_diagram(markup).unwrap(), DiagramKind::Flowchart);
    }

    #[test]
    fn test_brackets_in_quotes_ignored() {
        let markup = "graph TD\nA[\"Dose (mg\"] --> B";
        assert_eq!(check_diagram(markup).unwrap(), DiagramKind::Flowchart);
    }
}
