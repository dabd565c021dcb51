//! Rendering of code-unit records into retrievable documents and chunks.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::record::CodeUnitRecord;

/// Provenance of a document, surfaced to callers as an answer source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub class: String,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A bounded slice of a document's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    /// Position within the parent document.
    pub index: usize,
}

/// Build one document per record, in input order.
///
/// # Errors
///
/// Returns `IndexError::MissingField` for the first record lacking `className`,
/// `filePath` or a method's `methodName`.
pub fn build_documents(records: &[CodeUnitRecord]) -> Result<Vec<Document>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| build_document(index, record))
        .collect()
}

fn build_document(index: usize, record: &CodeUnitRecord) -> Result<Document> {
    let class_name = record
        .class_name
        .as_deref()
        .ok_or(IndexError::MissingField {
            field: "className",
            index,
        })?;
    let file_path = record
        .file_path
        .as_deref()
        .ok_or(IndexError::MissingField {
            field: "filePath",
            index,
        })?;
    let methods = record
        .methods
        .iter()
        .map(|m| {
            m.method_name.as_deref().ok_or(IndexError::MissingField {
                field: "methodName",
                index,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Document {
        content: render(class_name, file_path, &methods, &record.comments),
        metadata: DocumentMetadata {
            class: class_name.to_owned(),
            file_path: file_path.to_owned(),
        },
    })
}

/// Line-oriented rendering. Header lines are always present, even with no bullets.
fn render(class_name: &str, file_path: &str, methods: &[&str], comments: &[String]) -> String {
    let mut lines = Vec::with_capacity(4 + methods.len() + comments.len());
    lines.push(format!("Class: {class_name}"));
    lines.push(format!("File: {file_path}"));
    lines.push("Methods:".to_owned());
    lines.extend(methods.iter().map(|m| format!("  - {m}")));
    lines.push("Comments:".to_owned());
    lines.extend(comments.iter().map(|c| format!("  - {c}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MethodInfo;

    fn foo_record() -> CodeUnitRecord {
        CodeUnitRecord {
            class_name: Some("Foo".into()),
            file_path: Some("Foo.java".into()),
            methods: vec![MethodInfo::named("bar")],
            comments: vec!["does stuff".into()],
        }
    }

    #[test]
    fn renders_exact_template() {
        let docs = build_documents(&[foo_record()]).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].content,
            "Class: Foo\nFile: Foo.java\nMethods:\n  - bar\nComments:\n  - does stuff"
        );
        assert_eq!(
            docs[0].metadata,
            DocumentMetadata {
                class: "Foo".into(),
                file_path: "Foo.java".into(),
            }
        );
    }

    #[test]
    fn empty_lists_keep_headers() {
        let record = CodeUnitRecord {
            methods: vec![],
            comments: vec![],
            ..foo_record()
        };
        let docs = build_documents(&[record]).unwrap();
        assert_eq!(docs[0].content, "Class: Foo\nFile: Foo.java\nMethods:\nComments:");
    }

    #[test]
    fn rendering_is_deterministic() {
        let records = vec![foo_record(), foo_record()];
        let first = build_documents(&records).unwrap();
        let second = build_documents(&records).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].content, first[1].content);
    }

    #[test]
    fn preserves_input_order() {
        let mut other = foo_record();
        other.class_name = Some("Bar".into());
        let docs = build_documents(&[foo_record(), other]).unwrap();
        assert_eq!(docs[0].metadata.class, "Foo");
        assert_eq!(docs[1].metadata.class, "Bar");
    }

    #[test]
    fn missing_class_name_reports_index() {
        let mut broken = foo_record();
        broken.class_name = None;
        let err = build_documents(&[foo_record(), broken]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::MissingField {
                field: "className",
                index: 1
            }
        ));
    }

    #[test]
    fn missing_method_name_reports_field() {
        let mut broken = foo_record();
        broken.methods.push(MethodInfo::default());
        let err = build_documents(&[broken]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::MissingField {
                field: "methodName",
                index: 0
            }
        ));
    }

    #[test]
    fn no_records_no_documents() {
        assert!(build_documents(&[]).unwrap().is_empty());
    }
}
