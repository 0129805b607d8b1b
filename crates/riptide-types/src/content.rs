use serde::{Deserialize, Serialize};

/// Tagged content classification, replacing a dynamic map of per-type
/// callables with a single dispatch switch in the indexer. Only `Webpage`
/// is fully indexed by this crate; the other variants exist so a caller can
/// branch on classification without the indexer itself growing media/news
/// handling, which is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Webpage,
    Image,
    Video,
    News,
    Document,
}

impl ContentKind {
    /// Classify from a `Content-Type` header value.
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.split(';').next().unwrap_or("").trim();
        match ct {
            t if t.starts_with("text/html") || t.starts_with("application/xhtml") => {
                ContentKind::Webpage
            }
            t if t.starts_with("image/") => ContentKind::Image,
            t if t.starts_with("video/") => ContentKind::Video,
            t if t == "application/pdf" || t.starts_with("application/msword") => {
                ContentKind::Document
            }
            _ => ContentKind::Webpage,
        }
    }

    pub fn is_indexable(self) -> bool {
        matches!(self, ContentKind::Webpage)
    }
}
