// src/constants.rs
//
// Centralized constants for cvblob to avoid hardcoded values throughout the codebase

use std::time::Duration;

/// Default number of blobs fetched and uploaded together
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Fetch workers per logical CPU when `--workers` is not given.
/// Fetches are network-bound, so the pool is oversubscribed on purpose.
pub const WORKERS_PER_CPU: usize = 8;

/// Default per-fetch timeout (seconds)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Default per-fetch timeout as a `Duration`
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS);

// ============================================================================
// Training service limits
// ============================================================================

/// Maximum number of images accepted by one `images/files` call
pub const MAX_IMAGES_PER_UPLOAD: usize = 64;

/// Maximum size of a single training image (6 MiB)
pub const MAX_IMAGE_BYTES: usize = 6 * 1024 * 1024;

/// Training REST API version segment
pub const TRAINING_API_PATH: &str = "customvision/v3.3/training";

/// Header carrying the training key
pub const TRAINING_KEY_HEADER: &str = "Training-Key";

/// Tag type used for tags created during sync
pub const DEFAULT_TAG_TYPE: &str = "Regular";

/// Domain suffix appended to a bare region name
pub const COGNITIVE_SERVICES_DOMAIN: &str = "api.cognitive.microsoft.com";

// ============================================================================
// Process exit status
// ============================================================================

/// Exit status when a batch upload is rejected (`-1` as a status byte)
pub const UPLOAD_REJECTED_EXIT_CODE: u8 = 255;

/// Exit status for every other fatal error
pub const FATAL_EXIT_CODE: u8 = 1;

// ============================================================================
// Credentials
// ============================================================================

/// Default credentials file, relative to the working directory
pub const DEFAULT_KEYS_FILE: &str = "keys.json";

pub const ENV_STORAGE_KEY: &str = "CVBLOB_STORAGE_KEY";
pub const ENV_PROJECT_ID: &str = "CVBLOB_PROJECT_ID";
pub const ENV_TRAINING_KEY: &str = "CVBLOB_TRAINING_KEY";
