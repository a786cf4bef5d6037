//! Shared constants for integration tests
//!
//! When fixture data of the fake service changes, update only this file.

// ============================================================================
// Credentials
// ============================================================================

pub const TEST_USER: &str = "alice";
pub const TEST_PASS: &str = "secret";

/// `Authorization` header value for TEST_USER:TEST_PASS.
pub const TEST_BASIC_AUTH: &str = "Basic YWxpY2U6c2VjcmV0";

/// Bearer token the fake service accepts without a login.
pub const STATIC_TOKEN: &str = "static-token";

// ============================================================================
// Apps
// ============================================================================

/// Interactive app with no required parameters.
pub const INTERACTIVE_APP_ID: &str = "jupyter-lab";

/// Interactive app requiring `input_file`.
pub const NEEDS_INPUT_APP_ID: &str = "needs-input";

/// Batch app.
pub const BATCH_APP_ID: &str = "word-count";

pub const SYSTEM_ID: &str = "de";

/// Analysis id handed out by every launch.
pub const LAUNCHED_ANALYSIS_ID: &str = "analysis-1";

pub const ANALYSIS_URL: &str = "https://a1.cyverse.run";

// ============================================================================
// Data store
// ============================================================================

pub const HOME_DIR: &str = "/iplant/home/alice";
pub const NOTES_FILE: &str = "/iplant/home/alice/notes.txt";
pub const NOTES_CONTENT: &str = "hello formation";
pub const PROJECT_DIR: &str = "/iplant/home/alice/my project";
pub const PROJECT_FILE: &str = "/iplant/home/alice/my project/data.csv";

// ============================================================================
// Timing
// ============================================================================

pub const FAST_POLL_MS: u64 = 20;
