//! Pipeline stages for PDF → Arabic Word document conversion.
//!
//! Each submodule implements exactly one step; the batch orchestrator in
//! [`crate::batch`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ transform ──▶ build ──▶ compose | archive
//! (path/URL) (text)     (LLM)         (DOCX)    (merge)   (zip)
//! ```
//!
//! 1. [`input`]     — read a path or download a URL into a [`input::SourceFile`]
//! 2. [`extract`]   — text layer, then local OCR ([`render`] + [`ocr`]), then
//!    cloud OCR ([`cloud`]), stopping at the first non-empty result
//! 3. [`transform`] — one bounded LLM call, cleaned by [`postprocess`]
//! 4. [`build`]     — one right-to-left paragraph per line, or a placeholder
//! 5. [`compose`]   — splice documents with a page break between sources
//! 6. [`archive`]   — or zip the documents individually

pub mod archive;
pub mod build;
pub mod cloud;
pub mod compose;
pub mod extract;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod render;
pub mod transform;
