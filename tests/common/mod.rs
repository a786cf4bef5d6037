//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeFormation, NOTES_FILE};
//!
//! #[tokio::test]
//! async fn test_browse_file() {
//!     let fake = FakeFormation::spawn().await;
//!     let client = fake.login_client();
//!     // ...
//! }
//! ```

#![allow(dead_code)]

mod browser;
mod constants;
mod fake_formation;

pub use browser::RecordingBrowser;
pub use constants::*;
pub use fake_formation::{status_body, FakeFormation, FakeOptions, RecordedRequest};
