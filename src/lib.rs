//! formsync - versioned form and translation import
//!
//! Reconciles form definitions and their translations, fetched from a
//! form.io content source, into an append-only revisioned relational store,
//! and keeps a consistent "currently published" snapshot across forms and
//! global translations.

pub mod config;
pub mod normalize;
pub mod source;
pub mod storage;
pub mod sync;
pub mod utils;
