// src/batcher.rs
//
// Split a listing into fixed-size, order-preserving batches.

use crate::blob_store::BlobRef;
use crate::error::ConfigError;

/// One group of blobs processed through fetch-then-upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position in the run, as shown in progress output.
    pub number: usize,
    pub blobs: Vec<BlobRef>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Batch `i` (0-based) holds elements `[i*B, min((i+1)*B, N))` of the listing.
pub fn make_batches(blobs: Vec<BlobRef>, batch_size: usize) -> Result<Vec<Batch>, ConfigError> {
    if batch_size == 0 {
        return Err(ConfigError::ZeroBatchSize);
    }

    let mut batches = Vec::with_capacity(blobs.len().div_ceil(batch_size));
    let mut blobs = blobs.into_iter().peekable();
    while blobs.peek().is_some() {
        batches.push(Batch {
            number: batches.len() + 1,
            blobs: blobs.by_ref().take(batch_size).collect(),
        });
    }
    Ok(batches)
}
