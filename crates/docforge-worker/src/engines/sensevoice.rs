use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use docforge_core::Result;
use serde_json::json;

use crate::engine::{Engine, EngineOutput};

/// Audio class (speech transcription). Always emits a structured JSON
/// result alongside the Markdown transcript.
#[derive(Default)]
pub struct SenseVoiceEngine;

#[async_trait]
impl Engine for SenseVoiceEngine {
    fn name(&self) -> &'static str {
        "sensevoice"
    }

    fn supported_formats(&self) -> &'static [&'static str] {
        &["mp3", "wav", "flac", "m4a", "ogg"]
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

        let lang = options.get("lang").and_then(|v| v.as_str()).unwrap_or("auto");
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let transcript = format!("(transcript for {stem}, lang={lang})");

        let markdown_file = output_dir.join("result.md");
        tokio::fs::write(&markdown_file, format!("# {stem}\n\n{transcript}\n"))
            .await
            .map_err(|e| anyhow!(e))?;

        let json_file = output_dir.join("result.json");
        let payload = json!({
            "segments": [{ "start": 0.0, "end": 0.0, "text": transcript }],
            "lang": lang,
        });
        tokio::fs::write(&json_file, payload.to_string())
            .await
            .map_err(|e| anyhow!(e))?;

        Ok(EngineOutput {
            markdown_file,
            json_file: Some(json_file),
            image_dir_name: None,
        })
    }

    async fn cleanup(&self) {
        tracing::debug!(engine = "sensevoice", "cleanup");
    }
}
