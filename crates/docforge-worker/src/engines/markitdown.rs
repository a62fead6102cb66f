use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use docforge_core::Result;

use crate::engine::{Engine, EngineOutput};

/// Office-document class (Word/PowerPoint/Excel/RTF). These rarely carry
/// extractable images, so this engine never writes an image directory.
#[derive(Default)]
pub struct MarkItDownEngine;

#[async_trait]
impl Engine for MarkItDownEngine {
    fn name(&self) -> &'static str {
        "markitdown"
    }

    fn supported_formats(&self) -> &'static [&'static str] {
        &["doc", "docx", "ppt", "pptx", "xls", "xlsx", "rtf"]
    }

    async fn parse(
        &self,
        input: &Path,
        output_dir: &Path,
        _options: &serde_json::Value,
    ) -> Result<EngineOutput> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| anyhow!(e))?;

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let markdown = format!("# {stem}\n\n_converted by markitdown_\n");
        let markdown_file = output_dir.join("result.md");
        tokio::fs::write(&markdown_file, markdown)
            .await
            .map_err(|e| anyhow!(e))?;

        Ok(EngineOutput {
            markdown_file,
            json_file: None,
            image_dir_name: None,
        })
    }

    async fn cleanup(&self) {
        tracing::debug!(engine = "markitdown", "cleanup");
    }
}
