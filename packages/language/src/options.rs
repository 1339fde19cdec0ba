use serde::{Deserialize, Serialize};

/// Names every loaded document can resolve without declaring them
pub const PYTHON_BUILTINS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "input", "abs", "min", "max", "sum", "sorted", "list", "dict",
    "set", "bool", "enumerate", "zip", "open", "type",
];

/// Options for an editing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Indentation unit used by Python export
    #[serde(default = "default_indent")]
    pub indent: String,

    /// Builtin names added to the global scope on load, after the standard ones
    #[serde(default)]
    pub builtins: Vec<String>,
}

fn default_indent() -> String {
    "    ".to_string()
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            builtins: Vec::new(),
        }
    }
}

impl SessionOptions {
    /// Standard builtins followed by the configured extras, without duplicates.
    pub fn all_builtins(&self) -> Vec<&str> {
        let mut names: Vec<&str> = PYTHON_BUILTINS.to_vec();
        for extra in &self.builtins {
            if !names.contains(&extra.as_str()) {
                names.push(extra);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let options: SessionOptions = serde_json::from_str(r#"{ "builtins": ["numpy"] }"#).unwrap();
        assert_eq!(options.indent, "    ");
        assert_eq!(options.builtins, vec!["numpy".to_string()]);
    }

    #[test]
    fn test_extras_are_deduplicated() {
        let options = SessionOptions {
            builtins: vec!["print".to_string(), "math".to_string()],
            ..Default::default()
        };
        let names = options.all_builtins();
        assert_eq!(names.len(), PYTHON_BUILTINS.len() + 1);
        assert_eq!(names.last(), Some(&"math"));
    }
}
