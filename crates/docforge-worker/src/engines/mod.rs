//! Concrete adapters for the five engine classes enumerated in spec §4.2
//! step 1 / `GET /api/v1/engines`. The actual OCR/ASR/video models are
//! external collaborators out of scope (spec.md §1); these are minimal,
//! deterministic stand-ins that honor the `Engine` contract so the
//! worker's dispatch, chunking, and normalization logic has something
//! real to drive against.

pub mod markitdown;
pub mod pipeline;
pub mod sensevoice;
pub mod specialized_format;
pub mod video;
