//! Error types for the editor

use blockcode_language::LanguageError;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Language error: {0}")]
    Language(#[from] LanguageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No document is loaded")]
    NotLoaded,

    #[error("Nothing is selected")]
    NothingSelected,

    #[error("Clipboard has no blockcode content")]
    EmptyClipboard,
}
