use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerErrorKind {
    TemplateParse,
    Directory,
    FileOpen,
    Render,
    Write,
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Couldn't parse CNI config template {path:?}! Reason: {source}")]
    TemplateParse { path: PathBuf, source: TemplateError },
    #[error("Couldn't create CNI config directory {path:?}! Reason: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("Couldn't open CNI config file {path:?}! Reason: {source}")]
    FileOpen { path: PathBuf, source: io::Error },
    #[error("Couldn't generate CNI config file {path:?}! Reason: {source}")]
    Render { path: PathBuf, source: TemplateError },
    #[error("Couldn't write CNI config file {path:?}! Reason: {source}")]
    Write { path: PathBuf, source: io::Error },
}

impl ReconcilerError {
    pub fn kind(&self) -> ReconcilerErrorKind {
        match self {
            ReconcilerError::TemplateParse { .. } => ReconcilerErrorKind::TemplateParse,
            ReconcilerError::Directory { .. } => ReconcilerErrorKind::Directory,
            ReconcilerError::FileOpen { .. } => ReconcilerErrorKind::FileOpen,
            ReconcilerError::Render { .. } => ReconcilerErrorKind::Render,
            ReconcilerError::Write { .. } => ReconcilerErrorKind::Write,
        }
    }

    /// The template, directory or file the failing step was working on.
    pub fn path(&self) -> &Path {
        match self {
            ReconcilerError::TemplateParse { path, .. }
            | ReconcilerError::Directory { path, .. }
            | ReconcilerError::FileOpen { path, .. }
            | ReconcilerError::Render { path, .. }
            | ReconcilerError::Write { path, .. } => path,
        }
    }
}
