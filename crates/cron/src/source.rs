//! Recipient list sources.

use std::path::PathBuf;

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    serde::Deserialize,
};

use crate::types::BirthdayRecord;

/// Supplies the birthday list. Read fresh on every scheduled run so edits
/// to the underlying file take effect without a restart.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn load(&self) -> Result<Vec<BirthdayRecord>>;
}

#[derive(Debug, Deserialize)]
struct BirthdayFile {
    #[serde(default)]
    birthday: Vec<BirthdayRecord>,
}

/// `[[birthday]]` tables in a TOML file.
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecipientSource for TomlFileSource {
    async fn load(&self) -> Result<Vec<BirthdayRecord>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let file: BirthdayFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(file.birthday)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn loads_birthday_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[birthday]]
userId = "alice"
number = "9876543210"
name = "Grace"
date = "09-12"

[[birthday]]
userId = "bob"
number = "+91 91234 56789"
name = "Edsger"
date = "11-05"
"#
        )
        .unwrap();

        let records = TomlFileSource::new(file.path()).load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Grace");
        assert_eq!(records[1].user_id, "bob");
    }

    #[tokio::test]
    async fn empty_file_is_empty_list() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let records = TomlFileSource::new(file.path()).load().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = TomlFileSource::new("/nonexistent/birthdays.toml");
        assert!(source.load().await.is_err());
    }
}
