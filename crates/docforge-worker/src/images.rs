//! Image directory normalization (resolves Open Question 3).
//!
//! Engines may write images under whatever directory name they please;
//! the worker renames it to `images/` on first write, or merges into an
//! existing `images/` (disambiguating name collisions) for multi-chunk
//! PDF jobs that process several sub-PDFs into the same output tree.

use std::path::Path;

use anyhow::anyhow;
use docforge_core::Result;

pub async fn normalize_image_dir(output_dir: &Path, written_dir_name: &str) -> Result<()> {
    if written_dir_name == "images" {
        return Ok(());
    }

    let src = output_dir.join(written_dir_name);
    if !src.exists() {
        return Ok(());
    }
    let dst = output_dir.join("images");

    if !dst.exists() {
        tokio::fs::rename(&src, &dst).await.map_err(|e| anyhow!(e))?;
        return Ok(());
    }

    let mut entries = tokio::fs::read_dir(&src).await.map_err(|e| anyhow!(e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| anyhow!(e))? {
        let file_name = entry.file_name();
        let mut target = dst.join(&file_name);

        if target.exists() {
            let stem = Path::new(&file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("file")
                .to_string();
            let ext = Path::new(&file_name)
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| format!(".{s}"))
                .unwrap_or_default();

            let mut n = 1;
            loop {
                let candidate = dst.join(format!("{stem}_{n}{ext}"));
                if !candidate.exists() {
                    target = candidate;
                    break;
                }
                n += 1;
            }
        }

        tokio::fs::rename(entry.path(), &target)
            .await
            .map_err(|e| anyhow!(e))?;
    }

    tokio::fs::remove_dir_all(&src).await.map_err(|e| anyhow!(e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn renames_when_no_existing_images_dir() {
        let dir = tempdir().unwrap();
        let imgs = dir.path().join("imgs");
        tokio::fs::create_dir(&imgs).await.unwrap();
        tokio::fs::write(imgs.join("a.png"), b"x").await.unwrap();

        normalize_image_dir(dir.path(), "imgs").await.unwrap();

        assert!(!imgs.exists());
        assert!(dir.path().join("images/a.png").exists());
    }

    #[tokio::test]
    async fn merges_with_disambiguation_on_collision() {
        let dir = tempdir().unwrap();
        let images = dir.path().join("images");
        tokio::fs::create_dir(&images).await.unwrap();
        tokio::fs::write(images.join("a.png"), b"existing").await.unwrap();

        let keyframes = dir.path().join("keyframes");
        tokio::fs::create_dir(&keyframes).await.unwrap();
        tokio::fs::write(keyframes.join("a.png"), b"incoming").await.unwrap();
        tokio::fs::write(keyframes.join("b.png"), b"new").await.unwrap();

        normalize_image_dir(dir.path(), "keyframes").await.unwrap();

        assert!(!keyframes.exists());
        assert!(images.join("a.png").exists());
        assert!(images.join("a_1.png").exists());
        assert!(images.join("b.png").exists());
        assert_eq!(
            tokio::fs::read(images.join("a.png")).await.unwrap(),
            b"existing"
        );
        assert_eq!(
            tokio::fs::read(images.join("a_1.png")).await.unwrap(),
            b"incoming"
        );
    }

    #[tokio::test]
    async fn no_op_when_already_named_images() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("images")).await.unwrap();
        normalize_image_dir(dir.path(), "images").await.unwrap();
        assert!(dir.path().join("images").exists());
    }
}
