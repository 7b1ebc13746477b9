//! AliExpress extractor — HTTP service that renders product pages in a
//! headless Chromium and returns their product data.
//!
//! This library crate exposes the service modules for integration testing.

pub mod browser;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rest;

pub use error::{ApiError, BrowserError};
