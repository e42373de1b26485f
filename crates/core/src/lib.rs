//! Core shared types: load errors and the bounded LRU cache used by the asset manager.

use thiserror::Error;

pub mod lru;

pub use lru::LruCache;

/// Errors that abort a model load. Nothing is cached when one of these is returned.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("invalid model path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("unsupported model format '{extension}': {path}")]
    UnsupportedFormat { path: String, extension: String },

    #[error("failed to parse {path} (line {line}): {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("failed to import {path}: {message}")]
    Import { path: String, message: String },
}

impl LoadError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn import(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Import {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Path of the model the error refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::InvalidPath { path, .. }
            | Self::UnsupportedFormat { path, .. }
            | Self::Parse { path, .. }
            | Self::Import { path, .. } => path,
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
