//! Crate-wide error type.
//!
//! All failures the core can raise: configuration mistakes made before a
//! run starts, compute-backend failures raised during a run, and kernel
//! argument binding mistakes. All three are fatal at the call site — the
//! core never retries a failed dispatch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("device index out of range: platform {platform}, device {device}")]
    InvalidDeviceIndex { platform: u32, device: u32 },

    #[error("total size {total} is not a multiple of local work size {lws}")]
    SizeNotAligned { total: usize, lws: usize },

    #[error("chunk alignment remainder {remainder} for lws {lws}")]
    AlignmentRemainder { remainder: usize, lws: usize },

    #[error("proportion {value} for device {index} is out of (0,1)")]
    ProportionOutOfRange { index: usize, value: f32 },

    #[error("need at least {needed} proportions for {devices} devices, got {got}")]
    TooFewProportions {
        needed: usize,
        devices: usize,
        got: usize,
    },

    #[error("MIN_CHUNK_MULTIPLIER entry for device {device} is not a positive integer: {value:?}")]
    InvalidMinChunkMultiplier { device: usize, value: String },

    #[error("kernel argument at index {index} resolves to neither an input nor an output buffer and carries zero bytes")]
    UnresolvedVectorArg { index: u32 },

    #[error("compute backend failure during {phase}: {detail}")]
    Backend { phase: &'static str, detail: String },

    #[error("multi-dimensional global work size ({0:?}) cannot be split across devices")]
    UnsplittableRange(Vec<usize>),

    #[error("no devices configured")]
    NoDevices,

    #[error("dynamic scheduler requires chunk count > 0")]
    ZeroChunks,
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_failing_operation() {
        let err = EngineError::SizeNotAligned {
            total: 1000,
            lws: 128,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("128"));

        let err = EngineError::Backend {
            phase: "enqueue-kernel",
            detail: "CL_OUT_OF_RESOURCES".to_string(),
        };
        assert!(err.to_string().contains("enqueue-kernel"));
        assert!(err.to_string().contains("CL_OUT_OF_RESOURCES"));

        let err = EngineError::TooFewProportions {
            needed: 2,
            devices: 3,
            got: 1,
        };
        assert!(err.to_string().contains("need at least 2"));
    }
}
