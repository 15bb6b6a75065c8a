//! Index document resolver
//!
//! The FIRDS file register is a Solr search response. Each `<doc>` describes
//! one downloadable file through named `<str>` fields:
//!
//! ```xml
//! <response>
//!   <result name="response" numFound="2" start="0">
//!     <doc>
//!       <str name="file_name">DLTINS_20210117_01of01.zip</str>
//!       <str name="file_type">DLTINS</str>
//!       <str name="download_link">http://firds.esma.europa.eu/firds/DLTINS_20210117_01of01.zip</str>
//!       <date name="publication_date">2021-01-17T00:00:00Z</date>
//!     </doc>
//!   </result>
//! </response>
//! ```
//!
//! The resolver returns the first `doc`, in document order, whose `file_type`
//! equals the target code and whose `download_link` is non-empty.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// File type of the full reference data files
pub const DEFAULT_FILE_TYPE: &str = "DLTINS";

const FIELD_DOWNLOAD_LINK: &str = "download_link";
const FIELD_FILE_TYPE: &str = "file_type";
const FIELD_FILE_NAME: &str = "file_name";
const FIELD_CHECKSUM: &str = "checksum";
const FIELD_PUBLICATION_DATE: &str = "publication_date";

/// Result type for index resolution
pub type Result<T> = std::result::Result<T, IndexError>;

/// Error types for index resolution
///
/// A well-formed document without a qualifying entry is not an error; see
/// [`IndexResolver::resolve_str`].
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Failed to parse index document: {0}")]
    Parse(#[from] quick_xml::DeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Solr response root
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "doc", default)]
    docs: Vec<ResultDoc>,
}

#[derive(Debug, Deserialize)]
struct ResultDoc {
    #[serde(rename = "str", default)]
    strings: Vec<NamedField>,
    #[serde(rename = "date", default)]
    dates: Vec<NamedField>,
}

/// `<str name="...">value</str>` and friends
#[derive(Debug, Deserialize)]
struct NamedField {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

impl ResultDoc {
    /// Last non-empty `<str>` value with this name (later fields overwrite earlier ones)
    fn field(&self, name: &str) -> Option<&str> {
        last_value(&self.strings, name)
    }

    fn date(&self, name: &str) -> Option<&str> {
        last_value(&self.dates, name)
    }
}

fn last_value<'a>(fields: &'a [NamedField], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .filter(|field| field.name.as_deref() == Some(name))
        .map(|field| field.value.trim())
        .filter(|value| !value.is_empty())
        .last()
}

/// One candidate file from the index document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub file_type: String,
    pub download_link: String,
    pub file_name: Option<String>,
    pub checksum: Option<String>,
    pub publication_date: Option<String>,
}

/// Finds the download link for a file type in an index document
#[derive(Debug, Clone)]
pub struct IndexResolver {
    target_file_type: String,
}

impl Default for IndexResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_TYPE)
    }
}

impl IndexResolver {
    pub fn new(target_file_type: impl Into<String>) -> Self {
        Self {
            target_file_type: target_file_type.into(),
        }
    }

    pub fn target_file_type(&self) -> &str {
        &self.target_file_type
    }

    /// Resolve from an in-memory document
    ///
    /// Returns `Ok(None)` when the document parses but holds no qualifying
    /// entry, and [`IndexError::Parse`] when it is not well-formed.
    pub fn resolve_str(&self, xml: &str) -> Result<Option<IndexEntry>> {
        let response: SearchResponse = quick_xml::de::from_str(xml)?;
        Ok(self.select(response))
    }

    /// Resolve from a buffered reader
    pub fn resolve_reader<R: BufRead>(&self, reader: R) -> Result<Option<IndexEntry>> {
        let response: SearchResponse = quick_xml::de::from_reader(reader)?;
        Ok(self.select(response))
    }

    /// Resolve from a file on disk
    pub fn resolve_file(&self, path: &Path) -> Result<Option<IndexEntry>> {
        debug!(path = %path.display(), "Parsing index document");
        let file = File::open(path)?;
        self.resolve_reader(BufReader::new(file)).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "Index document could not be parsed");
        })
    }

    fn select(&self, response: SearchResponse) -> Option<IndexEntry> {
        let docs = response.result.map(|result| result.docs).unwrap_or_default();
        debug!(entries = docs.len(), "Index document parsed");

        for doc in &docs {
            let file_type = doc.field(FIELD_FILE_TYPE);
            let link = doc.field(FIELD_DOWNLOAD_LINK);
            debug!(file_type = ?file_type, download_link = ?link, "Index entry");

            if let (Some(file_type), Some(link)) = (file_type, link) {
                if file_type == self.target_file_type {
                    info!(
                        download_link = %link,
                        file_type = %file_type,
                        "Found download link for target file type"
                    );
                    return Some(IndexEntry {
                        file_type: file_type.to_string(),
                        download_link: link.to_string(),
                        file_name: doc.field(FIELD_FILE_NAME).map(str::to_string),
                        checksum: doc.field(FIELD_CHECKSUM).map(str::to_string),
                        publication_date: doc.date(FIELD_PUBLICATION_DATE).map(str::to_string),
                    });
                }
            }
        }

        info!(file_type = %self.target_file_type, "No index entry matches file type");
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <lst name="responseHeader">
    <int name="status">0</int>
    <lst name="params">
      <str name="q">*</str>
    </lst>
  </lst>
  <result name="response" numFound="3" start="0">
    <doc>
      <str name="checksum">aaa</str>
      <str name="download_link">http://example.org/files/FULINS_E.zip</str>
      <date name="publication_date">2021-01-17T00:00:00Z</date>
      <str name="file_name">FULINS_E.zip</str>
      <str name="file_type">FULINS</str>
    </doc>
    <doc>
      <str name="checksum">bbb</str>
      <str name="download_link">http://example.org/files/DLTINS_X.zip</str>
      <date name="publication_date">2021-01-18T00:00:00Z</date>
      <str name="file_name">DLTINS_X.zip</str>
      <str name="file_type">DLTINS</str>
    </doc>
    <doc>
      <str name="download_link">http://example.org/files/DLTINS_Y.zip</str>
      <str name="file_type">DLTINS</str>
    </doc>
  </result>
</response>"#;

    #[test]
    fn test_first_matching_entry_wins() {
        let entry = IndexResolver::default().resolve_str(INDEX).unwrap().unwrap();

        assert_eq!(entry.download_link, "http://example.org/files/DLTINS_X.zip");
        assert_eq!(entry.file_type, "DLTINS");
        assert_eq!(entry.file_name.as_deref(), Some("DLTINS_X.zip"));
        assert_eq!(entry.checksum.as_deref(), Some("bbb"));
        assert_eq!(entry.publication_date.as_deref(), Some("2021-01-18T00:00:00Z"));
    }

    #[test]
    fn test_other_target_file_type() {
        let entry = IndexResolver::new("FULINS").resolve_str(INDEX).unwrap().unwrap();
        assert_eq!(entry.download_link, "http://example.org/files/FULINS_E.zip");
    }

    #[test]
    fn test_no_matching_entry() {
        assert_eq!(IndexResolver::new("FULCAN").resolve_str(INDEX).unwrap(), None);
    }

    #[test]
    fn test_empty_link_is_skipped() {
        let xml = r#"<response><result>
            <doc><str name="file_type">DLTINS</str><str name="download_link"></str></doc>
            <doc><str name="file_type">DLTINS</str><str name="download_link">http://example.org/b.zip</str></doc>
        </result></response>"#;

        let entry = IndexResolver::default().resolve_str(xml).unwrap().unwrap();
        assert_eq!(entry.download_link, "http://example.org/b.zip");
    }

    #[test]
    fn test_link_does_not_leak_between_entries() {
        let xml = r#"<response><result>
            <doc><str name="file_type">FULINS</str><str name="download_link">http://example.org/a.zip</str></doc>
            <doc><str name="file_type">DLTINS</str></doc>
        </result></response>"#;

        assert_eq!(IndexResolver::default().resolve_str(xml).unwrap(), None);
    }

    #[test]
    fn test_document_without_results() {
        assert_eq!(IndexResolver::default().resolve_str("<response/>").unwrap(), None);
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let xml = r#"<response><result><doc><str name="file_type">DLTINS</doc></result></response>"#;

        let err = IndexResolver::default().resolve_str(xml).unwrap_err();
        assert!(matches!(err, IndexError::Parse(_)));
    }

    #[test]
    fn test_unnamed_fields_are_ignored() {
        let xml = r#"<response><result><doc>
            <str>orphan</str>
            <str name="file_type">DLTINS</str>
            <date>2021-01-17T00:00:00Z</date>
            <str name="download_link">http://x/a.zip</str>
        </doc></result></response>"#;

        let entry = IndexResolver::default().resolve_str(xml).unwrap().unwrap();
        assert_eq!(entry.file_type, "DLTINS");
        assert_eq!(entry.download_link, "http://x/a.zip");
        assert_eq!(entry.publication_date, None);
    }
}
