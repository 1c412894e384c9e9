//! Codec configuration records carried in sample descriptions.

mod aac;
mod avc;

pub use aac::{AacConfig, AAC_SAMPLE_RATES};
pub use avc::{AvcConfig, ANNEXB_START_CODE};
