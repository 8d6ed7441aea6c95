use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid archive format in {}: {reason}\n\n\
             Hint: Only containers with the BIGF signature can be mounted.\n\
             The file may be truncated, compressed, or belong to a different game.",
             path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Corrupt archive entry '{name}' in {}: {reason}", path.display())]
    CorruptEntry {
        path: PathBuf,
        name: String,
        reason: String,
    },

    #[error("Asset not found: {0}\n\n\
             Hint: The name is not present in any mounted archive.\n\
             Run: modbridge list --archive <PATH> to see what is indexed.")]
    NotFound(String),

    #[error("Malformed definition text: {0}")]
    MalformedInput(String),

    #[error("{0}")]
    Other(String),
}
