//! Data types for documents and search results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form document metadata (title, link, publication date, ...).
pub type Metadata = Map<String, Value>;

/// A document as produced by an ingestion source, before it is embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDocument {
    /// Unique identifier assigned by the caller.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
}

/// An embedded document ready to be stored.
///
/// Documents are immutable once stored and identified by `id`. The embedding
/// length must stay constant for the lifetime of a store; the store itself
/// does not check it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier assigned by the caller.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// The vector embedding of `text`.
    pub embedding: Vec<f32>,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Attach an embedding to a raw document.
    pub fn from_raw(raw: RawDocument, embedding: Vec<f32>) -> Self {
        Self { id: raw.id, text: raw.text, embedding, metadata: raw.metadata }
    }
}

/// The metadata projection carried by a [`SearchResult`].
///
/// Well-known news fields are lifted out; everything else ends up in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultMetadata {
    /// Article title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Link to the original article.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Publication date as reported by the feed.
    #[serde(rename = "pubDate", skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    /// Name of the feed or site the article came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Any remaining metadata fields.
    #[serde(flatten)]
    pub extra: Metadata,
}

impl ResultMetadata {
    /// Project stored metadata into a result's metadata.
    ///
    /// A well-known key whose value is not a string stays in `extra`; a
    /// null well-known key is dropped.
    pub fn project<'a>(fields: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Self {
        let mut out = Self::default();
        for (key, value) in fields {
            let slot = match key.as_str() {
                "title" => &mut out.title,
                "link" => &mut out.link,
                "pubDate" => &mut out.pub_date,
                "source" => &mut out.source,
                _ => {
                    out.extra.insert(key.clone(), value.clone());
                    continue;
                }
            };
            match value {
                Value::String(s) => *slot = Some(s.clone()),
                Value::Null => {}
                other => {
                    out.extra.insert(key.clone(), other.clone());
                }
            }
        }
        out
    }
}

/// A retrieved document paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The stored document's identifier.
    pub id: String,
    /// The stored document's text.
    pub text: String,
    /// The similarity score (higher is more relevant).
    pub score: f32,
    /// Projected document metadata.
    pub metadata: ResultMetadata,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn projection_lifts_news_fields_and_keeps_extras() {
        let fields = json!({
            "title": "Rust 2024",
            "link": "https://example.com/rust",
            "pubDate": "Mon, 01 Jan 2024 00:00:00 GMT",
            "source": "example",
            "category": "tech",
            "views": 12
        });
        let meta = ResultMetadata::project(fields.as_object().unwrap());

        assert_eq!(meta.title.as_deref(), Some("Rust 2024"));
        assert_eq!(meta.link.as_deref(), Some("https://example.com/rust"));
        assert_eq!(meta.pub_date.as_deref(), Some("Mon, 01 Jan 2024 00:00:00 GMT"));
        assert_eq!(meta.source.as_deref(), Some("example"));
        assert_eq!(meta.extra.len(), 2);
        assert_eq!(meta.extra["views"], json!(12));
    }

    #[test]
    fn non_string_known_field_goes_to_extra() {
        let fields = json!({ "title": 42, "link": null });
        let meta = ResultMetadata::project(fields.as_object().unwrap());

        assert!(meta.title.is_none());
        assert!(meta.link.is_none());
        assert_eq!(meta.extra["title"], json!(42));
        assert!(!meta.extra.contains_key("link"));
    }

    #[test]
    fn serializes_pub_date_camel_case_and_flattens_extra() {
        let meta = ResultMetadata {
            pub_date: Some("2024-01-01".into()),
            extra: json!({ "lang": "en" }).as_object().unwrap().clone(),
            ..Default::default()
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, json!({ "pubDate": "2024-01-01", "lang": "en" }));
    }
}
