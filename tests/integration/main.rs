//! Integration tests for Shiori
//!
//! These tests stand up wiremock stub sites and drive the public crawler
//! API end-to-end against them.

mod common;
mod crawl_tests;
mod search_tests;
