//! Splits template source into literal text and directives.

use super::settings::TemplateSettings;
use crate::error::TemplateError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DirectiveKind {
    Evaluate,
    Interpolate,
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Segment<'s> {
    Text(&'s str),
    Directive {
        kind: DirectiveKind,
        body: &'s str,
        /// Byte offset of `body` in the source.
        offset: usize,
    },
}

/// Scan `source` left to right. A directive ends at the first closing
/// delimiter after its opening one.
pub(crate) fn scan<'s>(
    source: &'s str,
    settings: &TemplateSettings,
) -> Result<Vec<Segment<'s>>, TemplateError> {
    let open = settings.open.as_str();
    let close = settings.close.as_str();
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some(found) = source[pos..].find(open) {
        let start = pos + found;
        if start > pos {
            segments.push(Segment::Text(&source[pos..start]));
        }

        let inner = start + open.len();
        let end = source[inner..]
            .find(close)
            .map(|i| inner + i)
            .ok_or(TemplateError::UnclosedDirective { offset: start })?;

        let raw = &source[inner..end];
        let (kind, skip) = match raw.chars().next() {
            Some(c) if c == settings.escape => (DirectiveKind::Escape, c.len_utf8()),
            Some(c) if c == settings.interpolate => (DirectiveKind::Interpolate, c.len_utf8()),
            _ => (DirectiveKind::Evaluate, 0),
        };
        let body = &raw[skip..];
        if body.trim().is_empty() {
            return Err(TemplateError::EmptyDirective { offset: start });
        }

        segments.push(Segment::Directive {
            kind,
            body,
            offset: inner + skip,
        });
        pos = end + close.len();
    }

    if pos < source.len() {
        segments.push(Segment::Text(&source[pos..]));
    }
    Ok(segments)
}
