//! Markdown image-reference rewriting (spec §4.4.1), grounded on
//! `original_source/backend/api_server.py`'s image-rewrite pass. A pure
//! function of its inputs — it never touches the filesystem unless
//! `upload_images` is true, in which case it uploads through the
//! `ObjectStore` port.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::objectstore::ObjectStore;

static MD_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"!\[([^\]]*)\]\(([^)\s]+)\)"#).unwrap());

static HTML_IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(<img\b[^>]*?\bsrc=")([^"]+)("[^>]*>)"#).unwrap());

#[derive(Debug, Clone, Copy)]
enum Shape {
    Markdown,
    HtmlImg,
}

struct Match {
    start: usize,
    end: usize,
    shape: Shape,
    prefix: String,
    path: String,
    suffix: String,
}

/// Percent-encodes everything except unreserved characters and `/`, so
/// path separators survive (spec §4.4.1 "URL encoding preserves `/`").
fn percent_encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for b in path.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

pub struct RewriteConfig<'a> {
    pub image_dir: &'a Path,
    pub output_root_relative_result_path: &'a str,
    pub upload_images: bool,
    pub object_store: Option<&'a dyn ObjectStore>,
    pub bucket: &'a str,
    pub secure: bool,
}

/// Rewrites `![alt](path)` and `<img src="path">` references. Returns
/// the rewritten Markdown and whether any image was uploaded to the
/// object store.
pub async fn rewrite_image_references(markdown: &str, cfg: &RewriteConfig<'_>) -> (String, bool) {
    let mut matches: Vec<Match> = Vec::new();

    for caps in MD_IMAGE.captures_iter(markdown) {
        let whole = caps.get(0).unwrap();
        matches.push(Match {
            start: whole.start(),
            end: whole.end(),
            shape: Shape::Markdown,
            prefix: format!("![{}](", &caps[1]),
            path: caps[2].to_string(),
            suffix: ")".to_string(),
        });
    }
    for caps in HTML_IMG_SRC.captures_iter(markdown) {
        let whole = caps.get(0).unwrap();
        matches.push(Match {
            start: whole.start(),
            end: whole.end(),
            shape: Shape::HtmlImg,
            prefix: caps[1].to_string(),
            path: caps[2].to_string(),
            suffix: caps[3].to_string(),
        });
    }
    matches.sort_by_key(|m| m.start);

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    let mut uploaded_any = false;

    for m in matches {
        if m.start < cursor {
            // Overlapping match (shouldn't happen for these two shapes);
            // skip to avoid corrupting already-written output.
            continue;
        }
        out.push_str(&markdown[cursor..m.start]);

        let basename = Path::new(&m.path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&m.path)
            .to_string();
        let resolved = cfg.image_dir.join(&basename);

        let new_path = if !resolved.exists() {
            m.path.clone()
        } else if cfg.upload_images {
            match upload_one(&resolved, &basename, cfg).await {
                Some(url) => {
                    uploaded_any = true;
                    url
                }
                None => local_url(cfg.output_root_relative_result_path, &basename),
            }
        } else {
            local_url(cfg.output_root_relative_result_path, &basename)
        };

        match m.shape {
            Shape::Markdown | Shape::HtmlImg => {
                out.push_str(&m.prefix);
                out.push_str(&new_path);
                out.push_str(&m.suffix);
            }
        }
        cursor = m.end;
    }
    out.push_str(&markdown[cursor..]);

    (out, uploaded_any)
}

fn local_url(result_path_relative: &str, basename: &str) -> String {
    format!(
        "/api/v1/files/output/{}/images/{}",
        percent_encode_path(result_path_relative),
        percent_encode_path(basename)
    )
}

async fn upload_one(resolved: &Path, basename: &str, cfg: &RewriteConfig<'_>) -> Option<String> {
    let object_store = cfg.object_store?;
    let ext = Path::new(basename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let key = format!("images/{}{ext}", Uuid::new_v4());

    let data = tokio::fs::read(resolved).await.ok()?;
    match object_store.put(cfg.bucket, &key, &data).await {
        Ok(()) => Some(object_store.url(cfg.bucket, &key, cfg.secure)),
        Err(e) => {
            tracing::warn!(error = %e, path = %resolved.display(), "image upload failed, falling back to local url");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectstore::LocalObjectStore;

    #[tokio::test]
    async fn rewrites_to_local_url_when_not_uploading() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        tokio::fs::create_dir(&image_dir).await.unwrap();
        tokio::fs::write(image_dir.join("x.png"), b"x").await.unwrap();

        let markdown = r#"![cap](figs/x.png) and <img src="figs/x.png" alt="y">"#;
        let cfg = RewriteConfig {
            image_dir: &image_dir,
            output_root_relative_result_path: "task-1",
            upload_images: false,
            object_store: None,
            bucket: "docs",
            secure: true,
        };

        let (rewritten, uploaded) = rewrite_image_references(markdown, &cfg).await;
        assert!(!uploaded);
        assert!(rewritten.contains("/api/v1/files/output/task-1/images/x.png"));
        assert!(rewritten.contains(r#"alt="y""#));
    }

    #[tokio::test]
    async fn leaves_reference_unchanged_when_image_missing() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        tokio::fs::create_dir(&image_dir).await.unwrap();

        let markdown = "![cap](figs/missing.png)";
        let cfg = RewriteConfig {
            image_dir: &image_dir,
            output_root_relative_result_path: "task-1",
            upload_images: false,
            object_store: None,
            bucket: "docs",
            secure: true,
        };

        let (rewritten, _) = rewrite_image_references(markdown, &cfg).await;
        assert_eq!(rewritten, markdown);
    }

    #[tokio::test]
    async fn uploads_to_object_store_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        tokio::fs::create_dir(&image_dir).await.unwrap();
        tokio::fs::write(image_dir.join("x.png"), b"x").await.unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(store_dir.path(), "minio.local:9000");

        let markdown = "![cap](figs/x.png)";
        let cfg = RewriteConfig {
            image_dir: &image_dir,
            output_root_relative_result_path: "task-1",
            upload_images: true,
            object_store: Some(&store),
            bucket: "docs",
            secure: true,
        };

        let (rewritten, uploaded) = rewrite_image_references(markdown, &cfg).await;
        assert!(uploaded);
        assert!(rewritten.starts_with("![cap](https://minio.local:9000/docs/images/"));
    }
}
