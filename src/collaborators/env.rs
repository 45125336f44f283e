//! # Environment configuration seam.
//!
//! [`DotenvLoader`] reads `KEY=VALUE` lines from a `.env` file in the
//! application directory. Loaded values are kept by the application and never
//! written into the process environment; process variables take precedence on
//! lookup (see [`AppContext::env`](crate::AppContext::env)).
//!
//! ## Accepted syntax
//! ```text
//! # comment
//! export APP_ENV=production
//! NAME = value            # trailing comment
//! QUOTED="multi\nline"    # \n, \t, \" and \\ are unescaped
//! RAW='kept as $is'
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::EnvError;

/// Loaded environment values.
pub type EnvVars = BTreeMap<String, String>;

/// Loads environment configuration for an application directory.
#[async_trait]
pub trait EnvLoader: Send + Sync + 'static {
    /// Loads configuration from `directory`.
    async fn load(&self, directory: &Path) -> Result<EnvVars, EnvError>;

    /// Fallback used when [`EnvLoader::load`] fails.
    async fn load_defaults(&self) -> EnvVars {
        EnvVars::new()
    }
}

/// Reads a dotenv file from the application directory.
#[derive(Clone, Debug)]
pub struct DotenvLoader {
    file_name: String,
    defaults: EnvVars,
}

impl Default for DotenvLoader {
    fn default() -> Self {
        Self {
            file_name: ".env".to_string(),
            defaults: EnvVars::new(),
        }
    }
}

impl DotenvLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `file_name` instead of `.env`.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Values returned when the file cannot be loaded.
    pub fn with_defaults(mut self, defaults: EnvVars) -> Self {
        self.defaults = defaults;
        self
    }
}

#[async_trait]
impl EnvLoader for DotenvLoader {
    async fn load(&self, directory: &Path) -> Result<EnvVars, EnvError> {
        let path = directory.join(&self.file_name);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EnvError::Missing { path });
            }
            Err(e) => return Err(e.into()),
        };
        parse_env(&text)
    }

    async fn load_defaults(&self) -> EnvVars {
        self.defaults.clone()
    }
}

/// Parses dotenv text. The first definition of a key wins.
pub fn parse_env(text: &str) -> Result<EnvVars, EnvError> {
    let mut vars = EnvVars::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let parse_err = |reason: &str| EnvError::Parse {
            line: idx + 1,
            reason: reason.to_string(),
        };

        let (key, value) = line.split_once('=').ok_or_else(|| parse_err("missing '='"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(parse_err("empty key"));
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return Err(parse_err("invalid key"));
        }

        let value = parse_value(value.trim()).ok_or_else(|| parse_err("unterminated quote"))?;
        vars.entry(key.to_string()).or_insert(value);
    }
    Ok(vars)
}

fn parse_value(value: &str) -> Option<String> {
    if let Some(rest) = value.strip_prefix('"') {
        let end = closing_quote(rest)?;
        return Some(unescape(&rest[..end]));
    }
    if let Some(rest) = value.strip_prefix('\'') {
        let end = rest.find('\'')?;
        return Some(rest[..end].to_string());
    }
    let unquoted = match value.find(" #") {
        Some(pos) => &value[..pos],
        None => value,
    };
    Some(unquoted.trim_end().to_string())
}

/// Byte offset of the first unescaped `"`.
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        let vars = parse_env(
            "# header\n\
             export APP_ENV=production\n\
             NAME = worker  # trailing\n\
             QUOTED=\"a\\nb \\\"c\\\"\"\n\
             RAW='$HOME # not a comment'\n\
             EMPTY=\n\
             APP_ENV=ignored\n",
        )
        .unwrap();

        assert_eq!(vars["APP_ENV"], "production");
        assert_eq!(vars["NAME"], "worker");
        assert_eq!(vars["QUOTED"], "a\nb \"c\"");
        assert_eq!(vars["RAW"], "$HOME # not a comment");
        assert_eq!(vars["EMPTY"], "");
        assert_eq!(vars.len(), 5);
    }

    #[test]
    fn reports_line_of_bad_entry() {
        let err = parse_env("OK=1\n\nnot a pair\n").unwrap_err();
        assert!(matches!(err, EnvError::Parse { line: 3, .. }));

        let err = parse_env("A=\"open\n").unwrap_err();
        assert!(matches!(err, EnvError::Parse { line: 1, .. }));
    }

    #[tokio::test]
    async fn missing_file_is_reported_and_defaults_apply() {
        let dir = std::env::temp_dir().join("provisor-env-missing");
        let loader = DotenvLoader::new()
            .with_defaults(EnvVars::from([("MODE".to_string(), "dev".to_string())]));

        let err = loader.load(&dir).await.unwrap_err();
        assert!(matches!(err, EnvError::Missing { .. }));
        assert_eq!(loader.load_defaults().await["MODE"], "dev");
    }

    #[tokio::test]
    async fn loads_file_from_directory() {
        let dir = std::env::temp_dir().join(format!("provisor-env-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("app.env"), "PORT=8080\n").await.unwrap();

        let vars = DotenvLoader::new()
            .with_file_name("app.env")
            .load(&dir)
            .await
            .unwrap();
        assert_eq!(vars["PORT"], "8080");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
