//! PDF chunk/split port (spec §4.2 step 3), grounded on
//! `original_source/backend/utils/pdf_utils.py` (`split_pdf_file`,
//! `get_pdf_page_count`). The actual rasterizer is an external
//! collaborator out of scope (spec.md §1) — this module documents the
//! exact contract a real implementation must honor and ships a
//! single-chunk default so the dispatch path above it is fully exercised
//! without depending on a PDF library.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docforge_core::Result;

/// A sub-PDF produced by a split, with its 1-based page range.
#[derive(Debug, Clone)]
pub struct PdfChunk {
    pub path: PathBuf,
    pub start_page: u32,
    pub end_page: u32,
}

#[async_trait]
pub trait PdfSplitter: Send + Sync {
    async fn page_count(&self, pdf_path: &Path) -> Result<u32>;

    /// Splits `pdf_path` into chunks of at most `chunk_size` pages,
    /// writing each chunk under `out_dir` as
    /// `<stem>_pages_<start>-<end>.pdf` (1-based, inclusive).
    async fn split(&self, pdf_path: &Path, chunk_size: u32, out_dir: &Path) -> Result<Vec<PdfChunk>>;
}

pub fn chunk_file_name(stem: &str, start_page: u32, end_page: u32) -> String {
    format!("{stem}_pages_{start_page}-{end_page}.pdf")
}

/// Default `PdfSplitter`: reports a single page and never actually
/// splits. Suitable as long as no PDF rasterizer is wired in; replace
/// with a real implementation (e.g. backed by a PDF library) to honor
/// chunking for documents above `CHUNK_SIZE` pages.
#[derive(Default)]
pub struct NoopPdfSplitter;

#[async_trait]
impl PdfSplitter for NoopPdfSplitter {
    async fn page_count(&self, _pdf_path: &Path) -> Result<u32> {
        Ok(1)
    }

    async fn split(&self, pdf_path: &Path, _chunk_size: u32, _out_dir: &Path) -> Result<Vec<PdfChunk>> {
        Ok(vec![PdfChunk {
            path: pdf_path.to_path_buf(),
            start_page: 1,
            end_page: 1,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_names_use_inclusive_one_based_ranges() {
        assert_eq!(chunk_file_name("report", 1, 20), "report_pages_1-20.pdf");
        assert_eq!(chunk_file_name("report", 21, 30), "report_pages_21-30.pdf");
    }

    #[tokio::test]
    async fn noop_splitter_reports_a_single_whole_file_chunk() {
        let splitter = NoopPdfSplitter;
        let chunks = splitter
            .split(Path::new("doc.pdf"), 20, Path::new("/tmp"))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_page, 1);
    }
}
