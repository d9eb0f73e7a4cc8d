//! Micro-templates.
//!
//! A template mixes literal text with three directive forms:
//!
//! - `{{ code }}` evaluates a statement (`if`, `else`, `for`, `let`, `end`)
//! - `{{= expr }}` interpolates a value
//! - `{{- expr }}` interpolates a value with HTML escaping
//!
//! Templates compile once into a program that renders against any
//! [`Value`](crate::types::Value). Inside the template the data object is
//! bound to the scope name (`data` by default); bare names read its fields.
//!
//! ```
//! use serde_json::json;
//! use sudo_core::template::Template;
//!
//! let tpl = Template::compile("{{ for t in todos }}<li>{{- t.title }}</li>{{ end }}").unwrap();
//! let html = tpl.render(&json!({"todos": [{"title": "a<b"}]})).unwrap();
//! assert_eq!(html, "<li>a&lt;b</li>");
//! ```

mod ast;
mod cache;
mod lexer;
mod parser;
mod render;
mod scanner;
mod settings;

pub use cache::TemplateCache;
pub use render::escape_html;
pub use settings::TemplateSettings;

use crate::error::{RenderError, TemplateError};
use crate::types::Value;
use ast::Node;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

struct Program {
    scope: String,
    nodes: Vec<Node>,
    source: String,
    /// Bytes of literal text, used to size the output buffer.
    size_hint: usize,
}

/// A compiled template. Cloning shares the program.
#[derive(Clone)]
pub struct Template {
    program: Arc<Program>,
}

impl Template {
    /// Compile with the default settings.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        Self::compile_with_settings(source, &TemplateSettings::default())
    }

    /// Compile with the data object bound to `scope`.
    pub fn compile_with_scope(source: &str, scope: &str) -> Result<Self, TemplateError> {
        Self::compile_with_settings(source, &TemplateSettings::default().with_scope(scope))
    }

    pub fn compile_with_settings(
        source: &str,
        settings: &TemplateSettings,
    ) -> Result<Self, TemplateError> {
        settings.validate()?;
        let segments = scanner::scan(source, settings)?;
        let size_hint = segments
            .iter()
            .map(|segment| match segment {
                scanner::Segment::Text(text) => text.len(),
                scanner::Segment::Directive { .. } => 0,
            })
            .sum();
        let compiled = parser::compile(&segments, &settings.scope)?;

        debug!(
            len = source.len(),
            nodes = compiled.nodes.iter().map(Node::count).sum::<usize>(),
            scope = %settings.scope,
            "compiled template"
        );

        Ok(Self {
            program: Arc::new(Program {
                scope: settings.scope.clone(),
                nodes: compiled.nodes,
                source: compiled.source,
                size_hint,
            }),
        })
    }

    /// Render against `data`, which is bound to the scope name.
    pub fn render(&self, data: &Value) -> Result<String, RenderError> {
        render::render(&self.program.nodes, data, self.program.size_hint)
    }

    pub fn scope(&self) -> &str {
        &self.program.scope
    }

    /// Listing of the compiled program as a function of the scope name.
    pub fn source(&self) -> &str {
        &self.program.source
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("scope", &self.program.scope)
            .field("source", &self.program.source)
            .finish()
    }
}

/// Compile `source` and render it against `data` immediately.
pub fn template(source: &str, data: &Value, scope: Option<&str>) -> crate::Result<String> {
    let compiled = match scope {
        Some(scope) => Template::compile_with_scope(source, scope)?,
        None => Template::compile(source)?,
    };
    Ok(compiled.render(data)?)
}
