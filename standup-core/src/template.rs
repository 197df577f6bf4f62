//! Response templates loaded from a YAML file with two top-level maps:
//!
//! ```yaml
//! vars:
//!   foo: Foo
//!   bar: Bar
//! templates:
//!   firstTemplate:
//!     whatAreThese: ["%s is not a %s", "foo", "bar"]
//! ```
//!
//! Every value under `templates` is an array. An empty array renders as the
//! empty string. Otherwise the first element is the format string and the
//! remaining elements name vars whose values are substituted for `%s`
//! placeholders in order. `%%` renders a literal percent sign.
//!
//! All lookups happen at startup while the response bundles are built, so a
//! bad template fails the process before it talks to anyone.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Template {
    #[serde(default)]
    vars: HashMap<String, serde_yaml::Value>,
    #[serde(default)]
    templates: HashMap<String, HashMap<String, Vec<String>>>,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("while reading template file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("while parsing template YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("template group {0:?} was not found")]
    GroupNotFound(String),

    #[error("key {key:?} was not found in template group {group:?}")]
    KeyNotFound { group: String, key: String },

    #[error("template var {0:?} is not defined")]
    VarNotFound(String),

    #[error("template var {0:?} is not a scalar value")]
    VarNotScalar(String),
}

impl Template {
    /// Reads and parses a YAML template file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&source)
    }

    /// Parses a template from YAML source.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Resolves `group.key` into its final string.
    pub fn get(&self, group: &str, key: &str) -> Result<String, TemplateError> {
        let entries = self
            .templates
            .get(group)
            .ok_or_else(|| TemplateError::GroupNotFound(group.to_string()))?;

        let parts = entries.get(key).ok_or_else(|| TemplateError::KeyNotFound {
            group: group.to_string(),
            key: key.to_string(),
        })?;

        let Some((format, var_names)) = parts.split_first() else {
            return Ok(String::new());
        };

        let mut values = Vec::with_capacity(var_names.len());
        for name in var_names {
            values.push(self.var_as_string(name)?);
        }

        Ok(render(format, &values))
    }

    fn var_as_string(&self, name: &str) -> Result<String, TemplateError> {
        let value = self
            .vars
            .get(name)
            .ok_or_else(|| TemplateError::VarNotFound(name.to_string()))?;

        match value {
            serde_yaml::Value::String(s) => Ok(s.clone()),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            _ => Err(TemplateError::VarNotScalar(name.to_string())),
        }
    }
}

/// Substitutes `%s` placeholders with `values` in order; `%%` is a literal
/// percent. Placeholders beyond the provided values, and any other `%x`
/// pair, pass through untouched.
fn render(format: &str, values: &[String]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_value = values.iter();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }

        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') => match next_value.next() {
                Some(value) => {
                    chars.next();
                    out.push_str(value);
                }
                None => out.push('%'),
            },
            _ => out.push('%'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template::parse(
            r#"
vars:
  foo: Foo
  bar: Bar
  answer: 42
templates:
  first:
    whatAreThese: ["%s is not a %s", "foo", "bar"]
    plain: ["no placeholders here"]
    nothing: []
    counted: ["the answer is %s", "answer"]
  percent:
    string: ["%%s"]
    doubled: ["100%% of %s", "foo"]
"#,
        )
        .expect("template parses")
    }

    #[test]
    fn formats_with_vars_in_order() {
        assert_eq!(
            template().get("first", "whatAreThese").expect("resolves"),
            "Foo is not a Bar"
        );
    }

    #[test]
    fn single_element_is_returned_as_is() {
        assert_eq!(
            template().get("first", "plain").expect("resolves"),
            "no placeholders here"
        );
    }

    #[test]
    fn empty_array_renders_empty_string() {
        assert_eq!(template().get("first", "nothing").expect("resolves"), "");
    }

    #[test]
    fn numeric_vars_are_stringified() {
        assert_eq!(
            template().get("first", "counted").expect("resolves"),
            "the answer is 42"
        );
    }

    #[test]
    fn doubled_percent_is_literal() {
        assert_eq!(template().get("percent", "string").expect("resolves"), "%s");
        assert_eq!(
            template().get("percent", "doubled").expect("resolves"),
            "100% of Foo"
        );
    }

    #[test]
    fn missing_group_and_key_are_errors() {
        let template = template();

        assert!(matches!(
            template.get("absent", "plain"),
            Err(TemplateError::GroupNotFound(group)) if group == "absent"
        ));
        assert!(matches!(
            template.get("first", "absent"),
            Err(TemplateError::KeyNotFound { key, .. }) if key == "absent"
        ));
    }

    #[test]
    fn undefined_var_is_an_error() {
        let template = Template::parse(
            r#"
templates:
  group:
    broken: ["%s", "missing"]
"#,
        )
        .expect("template parses");

        assert!(matches!(
            template.get("group", "broken"),
            Err(TemplateError::VarNotFound(name)) if name == "missing"
        ));
    }
}
