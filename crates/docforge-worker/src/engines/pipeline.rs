use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use docforge_core::Result;

use crate::engine::{Engine, EngineOutput};

/// Document/image class (PDF and raster scans). Writes its images to
/// `imgs/` rather than `images/`, exercising the worker's directory
/// normalization step on every call.
#[derive(Default)]
pub struct PipelineEngine;

#[async_trait]
impl Engine for PipelineEngine {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn supported_formats(&self) -> &'static [&'static str] {
        &["pdf", "png", "jpg", "jpeg", "bmp", "tiff"]
    }

    async fn parse(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &serde_json::Value,
    ) -> Result<EngineOutput> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| anyhow!(e))?;

        let image_dir_name = "imgs";
        let image_dir = output_dir.join(image_dir_name);
        tokio::fs::create_dir_all(&image_dir)
            .await
            .map_err(|e| anyhow!(e))?;
        tokio::fs::write(image_dir.join("page_1.png"), b"")
            .await
            .map_err(|e| anyhow!(e))?;

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let lang = options.get("lang").and_then(|v| v.as_str()).unwrap_or("auto");
        let markdown = format!(
            "# {stem}\n\n_parsed by pipeline (lang={lang})_\n\n![page 1]({image_dir_name}/page_1.png)\n"
        );
        let markdown_file = output_dir.join("result.md");
        tokio::fs::write(&markdown_file, markdown)
            .await
            .map_err(|e| anyhow!(e))?;

        Ok(EngineOutput {
            markdown_file,
            json_file: None,
            image_dir_name: Some(image_dir_name.to_string()),
        })
    }

    async fn cleanup(&self) {
        tracing::debug!(engine = "pipeline", "cleanup");
    }
}
