//! Knowledge entries
//!
//! An entry is one hand-authored unit of domain knowledge. Its `keywords`
//! stand in for a semantic embedding and its `related_ids` are the directed
//! edges of the knowledge graph.

use serde::{Deserialize, Serialize};

/// Display grouping for knowledge entries; never used for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Protocol,
    Compound,
    Philosophy,
    Safety,
    Biology,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Protocol,
        Category::Compound,
        Category::Philosophy,
        Category::Safety,
        Category::Biology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Protocol => "Protocol",
            Category::Compound => "Compound",
            Category::Philosophy => "Philosophy",
            Category::Safety => "Safety",
            Category::Biology => "Biology",
        }
    }

    /// Case-insensitive parse
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of retrievable domain knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique, stable identifier
    pub id: String,
    /// Short human-readable label
    pub title: String,
    pub category: Category,
    /// Free-text body handed to the model
    pub content: String,
    /// Directed links to other entries; ids missing from the corpus are ignored
    #[serde(default, alias = "relatedIds")]
    pub related_ids: Vec<String>,
    /// Lexical anchors matched against query vocabulary
    #[serde(default, alias = "vector_sim")]
    pub keywords: Vec<String>,
}

impl KnowledgeEntry {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: Category,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category,
            content: content.into(),
            related_ids: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_related<I, S>(mut self, related_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_ids = related_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn links_to(&self, id: &str) -> bool {
        self.related_ids.iter().any(|related| related == id)
    }
}
