use std::{fs, io::Write, path::Path};

use log::debug;
use regex::Regex;

use super::{ConfigTemplate, RenderContext, TemplateError, TemplateRenderer};

const ACTION_PATTERN: &str = r"(?s)\{\{.*?\}\}";
// a field reference or a `/* comment */`, optionally wrapped in trim markers
const SUPPORTED_ACTION_PATTERN: &str = r"(?s)^(?P<ltrim>-\s+)?(?:\s*\.(?P<field>[A-Za-z_][A-Za-z0-9_]*)\s*|/\*.*?\*/)(?P<rtrim>\s+-)?$";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

/// Parsed template made of literal text and `{{ .Field }}` actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplate {
    segments: Vec<Segment>,
}

impl ConfigTemplate for FieldTemplate {
    fn execute<W: Write>(
        &self,
        writer: &mut W,
        context: &RenderContext,
    ) -> Result<(), TemplateError> {
        let mut rendered = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Field(name) => rendered.push_str(
                    context
                        .field(name)
                        .ok_or_else(|| TemplateError::UnknownField(name.to_owned()))?,
                ),
            }
        }

        writer.write_all(rendered.as_bytes())?;
        writer.flush()?;

        Ok(())
    }
}

/// Renderer for the `{{ .Field }}` subset of Go text templates, including
/// `{{/* comments */}}` and `{{-` / `-}}` whitespace trimming.
pub struct FieldTemplateRenderer {
    action: Regex,
    supported_action: Regex,
}

impl Default for FieldTemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldTemplateRenderer {
    pub fn new() -> Self {
        Self {
            action: Regex::new(ACTION_PATTERN).unwrap(),
            supported_action: Regex::new(SUPPORTED_ACTION_PATTERN).unwrap(),
        }
    }

    pub fn parse_str(&self, source: &str) -> Result<FieldTemplate, TemplateError> {
        let mut segments = Vec::new();
        let mut cursor = 0;
        let mut trim_next = false;

        for action in self.action.find_iter(source) {
            let mut text = &source[cursor..action.start()];
            ensure_no_open_action(source, cursor, text)?;

            let body = &source[action.start() + 2..action.end() - 2];
            let captures = self
                .supported_action
                .captures(body)
                .ok_or_else(|| TemplateError::Syntax {
                    line: line_of(source, action.start()),
                    message: format!("unsupported action '{}'", action.as_str()),
                })?;

            if trim_next {
                text = text.trim_start();
            }
            if captures.name("ltrim").is_some() {
                text = text.trim_end();
            }

            push_text(&mut segments, text);
            if let Some(field) = captures.name("field") {
                segments.push(Segment::Field(field.as_str().to_owned()));
            }

            trim_next = captures.name("rtrim").is_some();
            cursor = action.end();
        }

        let mut tail = &source[cursor..];
        ensure_no_open_action(source, cursor, tail)?;

        if trim_next {
            tail = tail.trim_start();
        }
        push_text(&mut segments, tail);

        Ok(FieldTemplate { segments })
    }
}

impl TemplateRenderer for FieldTemplateRenderer {
    type Template = FieldTemplate;

    fn parse(&self, path: &Path) -> Result<Self::Template, TemplateError> {
        let source = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_owned(),
            source,
        })?;

        debug!("Parsing template {path:?} ({} bytes)", source.len());

        self.parse_str(&source)
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_owned()));
    }
}

fn ensure_no_open_action(source: &str, offset: usize, text: &str) -> Result<(), TemplateError> {
    match text.find("{{") {
        Some(position) => Err(TemplateError::Syntax {
            line: line_of(source, offset + position),
            message: "unclosed action".to_owned(),
        }),
        None => Ok(()),
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}
