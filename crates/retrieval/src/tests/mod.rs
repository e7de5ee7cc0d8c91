//! Cross-component tests for the retrieval core.

mod scenarios;
mod support;
