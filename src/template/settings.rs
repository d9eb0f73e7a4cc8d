//! Template delimiters and default scope name.

use super::lexer::{is_identifier, is_keyword};
use crate::error::TemplateError;
use serde::Deserialize;

/// Template syntax configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Opening delimiter. Default: `{{`
    pub open: String,

    /// Closing delimiter. Default: `}}`
    pub close: String,

    /// Marks an interpolation when it directly follows `open`. Default: `=`
    pub interpolate: char,

    /// Marks an HTML-escaped interpolation. Default: `-`
    pub escape: char,

    /// Name the data object is bound to inside the template. Default: `data`
    pub scope: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            open: "{{".to_string(),
            close: "}}".to_string(),
            interpolate: '=',
            escape: '-',
            scope: "data".to_string(),
        }
    }
}

impl TemplateSettings {
    /// Same settings with a different scope name.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), TemplateError> {
        if self.open.is_empty() || self.close.is_empty() {
            return Err(TemplateError::InvalidSettings(
                "delimiters must not be empty".to_string(),
            ));
        }
        if self.interpolate == self.escape {
            return Err(TemplateError::InvalidSettings(format!(
                "interpolate and escape markers are both {:?}",
                self.escape
            )));
        }
        if !is_identifier(&self.scope) || is_keyword(&self.scope) {
            return Err(TemplateError::InvalidScope(self.scope.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(TemplateSettings::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_scope() {
        for scope in ["", "1x", "if", "a.b"] {
            let settings = TemplateSettings::default().with_scope(scope);
            assert_eq!(
                settings.validate(),
                Err(TemplateError::InvalidScope(scope.to_string()))
            );
        }
    }

    #[test]
    fn test_invalid_markers() {
        let settings = TemplateSettings {
            escape: '=',
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(TemplateError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: TemplateSettings =
            serde_json::from_str(r#"{"open": "<%", "close": "%>"}"#).unwrap();
        assert_eq!(settings.open, "<%");
        assert_eq!(settings.scope, "data");
    }
}
