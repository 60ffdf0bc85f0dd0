//! Markdown corpus loading
//!
//! Turns a directory tree of `*.md` files into ingest items: the file
//! contents are embedded, `path` and `contents` go into the payload.

use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::pipeline::IngestItem;
use crate::store::{CollectionSchema, FieldKind, RecordKey};

/// Payload field holding the file path
pub const PATH_FIELD: &str = "path";
/// Payload field holding the article text
pub const CONTENTS_FIELD: &str = "contents";

/// Schema for collections of markdown articles
pub fn article_schema(dimensions: usize) -> CollectionSchema {
    CollectionSchema::new(dimensions)
        .filterable_field(PATH_FIELD, FieldKind::Text)
        .field(CONTENTS_FIELD, FieldKind::Text)
}

/// Recursively load every `*.md` file under `root`, sorted by path.
///
/// Each item gets a random key.
pub fn load_markdown_dir(root: impl AsRef<Path>) -> Result<Vec<IngestItem>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("corpus directory not found: {}", root.display()),
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "md") {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(&path)?;
        let contents = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), "Markdown file is not valid UTF-8, replacing invalid bytes");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        debug!(path = %path.display(), bytes = contents.len(), "Loaded markdown file");
        let path_text = path.display().to_string();
        items.push(
            IngestItem::new(contents.clone())
                .with_key(RecordKey::generate())
                .with_field(PATH_FIELD, path_text)
                .with_field(CONTENTS_FIELD, contents),
        );
    }

    info!(root = %root.display(), files = items.len(), "Loaded markdown corpus");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_markdown_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("guides")).unwrap();
        std::fs::write(dir.path().join("b.md"), "# B").unwrap();
        std::fs::write(dir.path().join("guides/a.md"), "# A").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let items = load_markdown_dir(dir.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "# B");
        assert_eq!(items[1].text, "# A");
        assert!(items[1].payload[PATH_FIELD]
            .as_text()
            .unwrap()
            .ends_with("a.md"));
        assert!(items.iter().all(|i| i.key.is_some()));
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), b"caf\xe9 menu").unwrap();
        std::fs::write(dir.path().join("b.md"), "# B").unwrap();

        let items = load_markdown_dir(dir.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "caf\u{FFFD} menu");
        assert_eq!(items[1].text, "# B");
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_markdown_dir(dir.path().join("nope"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_article_schema_accepts_items() {
        let schema = article_schema(4);
        assert_eq!(schema.dimensions(), 4);
        assert!(schema.payload_field(PATH_FIELD).unwrap().filterable);
    }
}
