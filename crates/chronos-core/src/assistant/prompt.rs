//! System prompt assembly
//!
//! The fenced formats described in the visualization protocol are the ones
//! `crate::extraction` recognizes; change them together.

use crate::knowledge::{KnowledgeCorpus, KnowledgeEntry};
use crate::retrieval::RetrievalResult;

/// Written in place of the context block when nothing was retrieved
pub const NO_CONTEXT_FALLBACK: &str = "NO ARCHIVE MATCHES. RELY ON GENERAL TRAINING.";

/// Closes every rendered context node
const NODE_SEPARATOR: &str = "------------------------------------------------";

/// Shown for a node that links nowhere
const END_NODE: &str = "End Node";

const PERSONA: &str = "You are Chronos, the central intelligence for \"Ascend to Peak\".";

const DIRECTIVES: &str = r#"DIRECTIVES:
1. **Use the Neural Data**: You MUST reference the provided [NEURAL_NODE_ID] data in your answer. The user expects you to use this specific knowledge base.
2. **Synthesize**: Do not just repeat the data. Look at the [CONNECTED_CONCEPTS] and explain *how* Node A relates to Node B if relevant.
3. **Investigate**: If the data shows a chain (e.g. MK-677 -> GH -> Sleep), walk the user through that biological pathway.
4. **Safety**: If discussing 'Compounds' or 'Peptides', YOU MUST APPEND: "Disclaimer: For laboratory research purposes only. Not for human consumption."
5. **Tone**: Clinical, High-Tech, "Cyber-Medical".
6. **Markdown**: Use proper markdown formatting for your text responses (headings, lists, bold, italic, etc.)"#;

const VISUALIZATION_PROTOCOL: &str = r#"--- VISUALIZATION PROTOCOLS ---
You can generate Rich Media responses. Use these specific formats when helpful:

[GRAPHS - CRITICAL: VALID JSON ONLY]
To display a chart, output STRICTLY VALID JSON inside a json code block.
"type" must be one of "line", "bar" or "area". DO NOT use trailing commas.

Example BAR CHART:
```json
{
  "type": "bar",
  "title": "Growth Hormone Levels by Compound",
  "xAxisLabel": "Compound",
  "yAxisLabel": "GH Increase (%)",
  "data": [
    { "name": "Baseline", "value": 100 },
    { "name": "MK-677", "value": 250 },
    { "name": "CJC-1295", "value": 180 }
  ]
}
```

Example LINE CHART:
```json
{
  "type": "line",
  "title": "GH Pulse Over 24 Hours",
  "xAxisLabel": "Time (hours)",
  "yAxisLabel": "GH Level (ng/mL)",
  "data": [
    { "name": "0h", "value": 0.5 },
    { "name": "4h", "value": 8.4 },
    { "name": "8h", "value": 6.2 }
  ]
}
```

[FLOW DIAGRAMS]
To display a flow diagram, output STRICTLY VALID JSON inside a json code block.
The JSON must have 'nodes' and 'edges' arrays. "direction" is "TB" or "LR".

Example FLOW DIAGRAM:
```json
{
  "nodes": [
    { "id": "1", "label": "MK-677 Ingestion" },
    { "id": "2", "label": "Ghrelin Receptor Activation" },
    { "id": "3", "label": "GH Release" }
  ],
  "edges": [
    { "source": "1", "target": "2", "label": "Ingest" },
    { "source": "2", "target": "3", "label": "Stimulate" }
  ],
  "direction": "TB"
}
```

[SEQUENCE AND OTHER DIAGRAMS]
For sequence, state or timeline diagrams only, use a mermaid code block with valid Mermaid syntax.

[IMAGES]
To show an image, use Markdown image syntax: ![Alt Text](URL)
Only use valid external image URLs ending in .jpg, .png, .gif, .webp

IMPORTANT: Your response will be parsed to extract charts, diagrams, and images. These will be rendered separately.
Write your text explanation in markdown, and the visualizations will appear inline automatically."#;

/// Render one retrieved entry as a context node
pub fn render_context_node(entry: &KnowledgeEntry, corpus: &KnowledgeCorpus) -> String {
    let related = corpus.related_titles(entry);
    let connections = if related.is_empty() {
        END_NODE.to_string()
    } else {
        related.join(" -> ")
    };

    format!(
        "[NEURAL_NODE_ID: {}]\nTYPE: {}\nTITLE: {}\nDATA: {}\nCONNECTED_CONCEPTS: {}\n{}",
        entry.id, entry.category, entry.title, entry.content, connections, NODE_SEPARATOR
    )
}

/// Build the system instruction for one turn from its retrieval result
pub fn build_system_prompt(result: &RetrievalResult<'_>, corpus: &KnowledgeCorpus) -> String {
    let context = if result.is_empty() {
        NO_CONTEXT_FALLBACK.to_string()
    } else {
        result
            .entries()
            .map(|entry| render_context_node(entry, corpus))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "{}\n\nACCESSING NEURAL ARCHIVE...\n{} DATA NODES FOUND.\n\nCONTEXTUAL DATA STREAM:\n{}\n\n{}\n\n{}",
        PERSONA,
        result.len(),
        context,
        DIRECTIVES,
        VISUALIZATION_PROTOCOL
    )
}
