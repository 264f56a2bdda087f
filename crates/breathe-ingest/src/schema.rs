//! Record schema shared by the fetcher, the CSV writer and the converter

use serde::{Deserialize, Serialize};

/// Column names in projection, CSV header and JSON key order.
pub const FIELDS: [&str; 6] = [
    "id",
    "title",
    "abstract",
    "authors",
    "keywords",
    "organization_affiliated",
];

/// One paper row. Every column is text; `None` is SQL NULL or a column the
/// CSV header lacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub authors: Option<String>,
    pub keywords: Option<String>,
    pub organization_affiliated: Option<String>,
}

/// Ordered rows as returned by one fetch.
pub type RecordBatch = Vec<Record>;

impl Record {
    /// Build from values in [`FIELDS`] order.
    ///
    /// Returns None if the number of values does not match the schema.
    pub fn from_values(values: Vec<Option<String>>) -> Option<Self> {
        let [id, title, abstract_text, authors, keywords, organization_affiliated]: [Option<String>;
            6] = values.try_into().ok()?;
        Some(Self {
            id,
            title,
            abstract_text,
            authors,
            keywords,
            organization_affiliated,
        })
    }

    /// Whether every field is present (what the query filter guarantees).
    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|f| f.is_some())
    }

    fn fields(&self) -> [&Option<String>; 6] {
        [
            &self.id,
            &self.title,
            &self.abstract_text,
            &self.authors,
            &self.keywords,
            &self.organization_affiliated,
        ]
    }

    /// Apply `f` to every field, keeping column positions.
    pub fn map_fields(&self, mut f: impl FnMut(Option<&str>) -> Option<String>) -> Self {
        Self {
            id: f(self.id.as_deref()),
            title: f(self.title.as_deref()),
            abstract_text: f(self.abstract_text.as_deref()),
            authors: f(self.authors.as_deref()),
            keywords: f(self.keywords.as_deref()),
            organization_affiliated: f(self.organization_affiliated.as_deref()),
        }
    }
}
