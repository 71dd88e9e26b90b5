//! Narrow, typed accessors over [`bson::Document`] values.
//!
//! The change-stream core touches exactly a handful of paths in server replies: the resume
//! token, the post-batch resume token, and the operation time. Rather than exposing a generic
//! dynamic-document walker, this module gives each of those paths its own named accessor (spec
//! §9, "Dynamic document reflection").

use bson::{Bson, Document, Timestamp};

/// Look up a dotted path in `doc` and return it as a [`Document`], if present and document-typed.
pub(crate) fn lookup_document(doc: &Document, path: &str) -> Option<Document> {
    lookup_bson(doc, path).and_then(Bson::as_document).cloned()
}

/// Look up a dotted path in `doc` and return it as a [`Timestamp`], if present and timestamp-typed.
pub(crate) fn lookup_timestamp(doc: &Document, path: &str) -> Option<Timestamp> {
    lookup_bson(doc, path).and_then(Bson::as_timestamp)
}

fn lookup_bson<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = current.as_document()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod test {
    use super::*;
    use bson::doc;

    #[test]
    fn nested_lookup() {
        let doc = doc! {
            "cursor": {
                "postBatchResumeToken": { "_data": "82..." },
                "id": 123_i64,
            },
            "operationTime": Timestamp { time: 5, increment: 1 },
        };
        assert_eq!(
            lookup_document(&doc, "cursor.postBatchResumeToken"),
            Some(doc! { "_data": "82..." })
        );
        assert_eq!(
            lookup_timestamp(&doc, "operationTime"),
            Some(Timestamp { time: 5, increment: 1 })
        );
        assert_eq!(lookup_document(&doc, "cursor.missing"), None);
    }
}
