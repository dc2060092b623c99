//! Top-level pipeline error, `#[from]`-wrapping each stage's own error type
//! so a single `?`-chain runs the whole analysis (mirrors the starting
//! point's `GraphError`/`RegistryError`/`DataLoadError` layering, collapsed
//! to one top-level enum since this pipeline has a single linear entry
//! point rather than many independent mutation call sites).
//!
//! Per spec.md §7, data anomalies are not represented here at all — they
//! live in [`crate::diagnostics::Diagnostics`]. Only malformed input
//! reaches this type: the graph itself can never end up with a dangling
//! reference, since it is built in one pass from catalogs that only ever
//! name ids the builder itself just minted.

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[cfg(feature = "data-loader")]
    #[error("recipe database load failed: {0}")]
    RecipeLoad(#[from] crate::recipe::data_loader::RecipeLoadError),
    #[cfg(feature = "data-loader")]
    #[error("catalog load failed: {0}")]
    CatalogLoad(#[from] crate::ingest::CatalogLoadError),
}
