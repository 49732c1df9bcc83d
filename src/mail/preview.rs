//! Dry-run delivery: rendered reports land on disk instead of in inboxes.

use super::Mailer;
use crate::error::MailError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct PreviewMailer {
    dir: PathBuf,
}

impl PreviewMailer {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// File a report for `to_name` is written to.
    pub fn path_for(&self, to_name: &str) -> PathBuf {
        self.dir.join(format!("{}.html", slug(to_name)))
    }
}

/// Lower-case ASCII alphanumerics separated by single dashes.
fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }

    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug.to_string()
    }
}

fn write(path: &Path, html_body: &str) -> Result<(), MailError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| MailError::Preview {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, html_body).map_err(|source| MailError::Preview {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl Mailer for PreviewMailer {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let path = self.path_for(to_name);
        write(&path, html_body)?;

        info!(
            "Dry run: '{}' for {} <{}> written to {}",
            subject,
            to_name,
            to_email,
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Jane Smith"), "jane-smith");
        assert_eq!(slug("  O'Brien, Kate "), "o-brien-kate");
        assert_eq!(slug("test@example.com"), "test-example-com");
        assert_eq!(slug("日本"), "report");
    }

    #[tokio::test]
    async fn test_writes_report_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = PreviewMailer::new(dir.path().join("reports"));

        mailer
            .send("jane@example.com", "Jane Smith", "Summary", "<h1>Hi</h1>")
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("reports/jane-smith.html")).unwrap();
        assert_eq!(written, "<h1>Hi</h1>");
    }
}
