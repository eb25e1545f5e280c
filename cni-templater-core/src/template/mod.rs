use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

pub mod field;

pub const POD_CIDR_FIELD: &str = "PodCIDR";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Couldn't read template {path:?}! Reason: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Template syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("Template references an unknown field '{0}'!")]
    UnknownField(String),
    #[error("Couldn't write rendered template! Reason: {0}")]
    Write(#[from] io::Error),
}

/// Values substituted into a CNI config template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub pod_cidr: String,
}

impl RenderContext {
    pub fn new(pod_cidr: impl Into<String>) -> Self {
        Self {
            pod_cidr: pod_cidr.into(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            POD_CIDR_FIELD => Some(&self.pod_cidr),
            _ => None,
        }
    }
}

pub trait TemplateRenderer {
    type Template: ConfigTemplate;

    fn parse(&self, path: &Path) -> Result<Self::Template, TemplateError>;
}

pub trait ConfigTemplate {
    fn execute<W: Write>(&self, writer: &mut W, context: &RenderContext)
        -> Result<(), TemplateError>;
}
