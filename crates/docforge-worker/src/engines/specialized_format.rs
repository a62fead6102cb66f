use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use docforge_core::Result;
use serde_json::json;

use crate::engine::{Engine, EngineOutput};

/// Specialized scientific formats (FASTA/GenBank and similar). Counts
/// `>`-prefixed sequence headers as a stand-in for real parsing.
#[derive(Default)]
pub struct SpecializedFormatEngine;

#[async_trait]
impl Engine for SpecializedFormatEngine {
    fn name(&self) -> &'static str {
        "specialized-format"
    }

    fn supported_formats(&self) -> &'static [&'static str] {
        &["fasta", "fa", "gb", "gbk", "genbank"]
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

        let content = tokio::fs::read_to_string(input)
            .await
            .unwrap_or_default();
        let sequence_count = content.lines().filter(|l| l.starts_with('>')).count();

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sequence");
        let markdown_file = output_dir.join("result.md");
        tokio::fs::write(
            &markdown_file,
            format!("# {stem}\n\n{sequence_count} sequence(s) found.\n"),
        )
        .await
        .map_err(|e| anyhow!(e))?;

        let json_file = output_dir.join("result.json");
        tokio::fs::write(&json_file, json!({ "sequence_count": sequence_count }).to_string())
            .await
            .map_err(|e| anyhow!(e))?;

        Ok(EngineOutput {
            markdown_file,
            json_file: Some(json_file),
            image_dir_name: None,
        })
    }

    async fn cleanup(&self) {
        tracing::debug!(engine = "specialized-format", "cleanup");
    }
}
