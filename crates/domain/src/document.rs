//! Documents and their append-only version chains.
//!
//! A [`Document`] is mutated only by the version store; a [`DocumentVersion`]
//! is immutable once written. Title and document-type derivation are pure
//! functions over the first version's content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConversationId, DocumentId, HandlerLabel, Timestamp, VersionNumber};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// How a version came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// First version of a new document.
    Create,
    /// Free-form revision.
    Edit,
    /// Lengthen and deepen the content.
    Expand,
    /// Shorten while keeping the key points.
    Compress,
    /// Improve wording without changing meaning.
    Polish,
}

impl OperationKind {
    /// Operations accepted by the explicit edit endpoint.
    pub const EDITS: [OperationKind; 4] = [Self::Expand, Self::Compress, Self::Polish, Self::Edit];

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Expand => "expand",
            Self::Compress => "compress",
            Self::Polish => "polish",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "edit" => Ok(Self::Edit),
            "expand" => Ok(Self::Expand),
            "compress" => Ok(Self::Compress),
            "polish" => Ok(Self::Polish),
            other => Err(format!("unknown operation '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A logical document owned by a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Store-assigned identifier.
    pub id: DocumentId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Title derived from the first version.
    pub title: String,
    /// Type derived from the origin handler and content.
    pub document_type: String,
    /// Highest version number written. Always `>= 1`.
    pub current_version: VersionNumber,
    /// When version 1 was written.
    pub created_at: Timestamp,
    /// When the latest version was written.
    pub updated_at: Timestamp,
}

/// One immutable entry in a document's version chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    /// Document this version belongs to.
    pub document_id: DocumentId,
    /// Position in the chain.
    pub version: VersionNumber,
    /// Content as generated.
    pub content: String,
    /// Plain-text projection of `content`.
    pub plain_text_content: String,
    /// Operation that produced this version.
    pub operation: OperationKind,
    /// Free-text note (the edit instruction, for explicit edits).
    pub note: Option<String>,
    /// Operation-specific metadata.
    pub metadata: Map<String, Value>,
    /// When this version was written.
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

const UNTITLED: &str = "Untitled document";
const MAX_TITLE_CHARS: usize = 80;
const MAX_TITLE_LINE_CHARS: usize = 100;

/// Derives a title from content.
///
/// Uses the first level-one heading (`# Title`) if present; otherwise the
/// first non-empty line shorter than 100 characters with markup characters
/// removed; otherwise `"Untitled document"`. The result is at most 80
/// characters.
pub fn derive_title(content: &str) -> String {
    let heading = content.lines().find_map(|line| {
        let rest = line.strip_prefix('#')?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let title = rest.trim();
        (!title.is_empty()).then_some(title)
    });
    if let Some(title) = heading {
        return truncate_chars(title, MAX_TITLE_CHARS);
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().count() < MAX_TITLE_LINE_CHARS)
        .map(|line| {
            line.chars()
                .filter(|c| !matches!(c, '#' | '*' | '`' | '_' | '[' | ']' | '(' | ')'))
                .collect::<String>()
        })
        .map(|cleaned| cleaned.trim().to_string())
        .find(|cleaned| !cleaned.is_empty())
        .map(|title| truncate_chars(&title, MAX_TITLE_CHARS))
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Keyword refinements per base type, first match wins.
const REFINEMENTS: &[(&str, &[(&[&str], &str)])] = &[
    (
        "speech",
        &[
            (&["动员", "mobilization"], "mobilization speech"),
            (&["年会", "annual meeting"], "annual meeting speech"),
            (&["党会", "party meeting"], "party meeting speech"),
        ],
    ),
    (
        "press release",
        &[
            (&["产品", "product launch"], "product launch press release"),
            (&["合作", "partnership"], "partnership press release"),
        ],
    ),
    (
        "official document",
        &[
            (&["通知", "notice"], "notice"),
            (&["请示", "request for instructions"], "request for instructions"),
            (&["报告", "report"], "report"),
        ],
    ),
];

/// Derives a document type from the origin handler, refined by content keywords.
pub fn detect_document_type(origin: &HandlerLabel, content: &str) -> String {
    let base = match origin.as_str() {
        "speech_writer" => "speech",
        "news_writer" => "press release",
        "official_document" => "official document",
        "research_report" => "research report",
        "code_assistant" => "code documentation",
        "data_analysis" => "data analysis report",
        HandlerLabel::GENERALIST => "Q&A",
        _ => "document",
    };

    let lowered = content.to_lowercase();
    REFINEMENTS
        .iter()
        .find(|(b, _)| *b == base)
        .and_then(|(_, refinements)| {
            refinements
                .iter()
                .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
                .map(|(_, refined)| *refined)
        })
        .unwrap_or(base)
        .to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
