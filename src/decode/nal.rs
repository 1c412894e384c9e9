//! Length-prefixed (AVCC) to Annex-B rewriting.

use vidcore_media::codec::ANNEXB_START_CODE;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NalError {
    #[error("NAL length size must be 1-4 bytes, got {0}")]
    LengthSize(u8),

    #[error("NAL unit at byte {offset} declares {declared} bytes but only {remaining} remain")]
    Truncated {
        offset: usize,
        declared: usize,
        remaining: usize,
    },
}

/// Append `input`, a sequence of `length_size`-byte big-endian length
/// prefixed NAL units, to `out` with each prefix replaced by a four-byte
/// start code. Empty units are dropped.
///
/// Returns the number of NAL units written. On error `out` may hold a
/// partial rewrite.
pub fn length_prefixed_to_annexb(
    input: &[u8],
    length_size: u8,
    out: &mut Vec<u8>,
) -> Result<usize, NalError> {
    if !(1..=4).contains(&length_size) {
        return Err(NalError::LengthSize(length_size));
    }
    let prefix = length_size as usize;

    out.reserve(input.len() + input.len() / 8);
    let mut pos = 0;
    let mut units = 0;
    while pos < input.len() {
        let Some(header) = input.get(pos..pos + prefix) else {
            return Err(NalError::Truncated {
                offset: pos,
                declared: prefix,
                remaining: input.len() - pos,
            });
        };
        let declared = header.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
        let start = pos + prefix;
        let remaining = input.len() - start;
        if declared > remaining {
            return Err(NalError::Truncated {
                offset: pos,
                declared,
                remaining,
            });
        }

        if declared > 0 {
            out.extend_from_slice(&ANNEXB_START_CODE);
            out.extend_from_slice(&input[start..start + declared]);
            units += 1;
        }
        pos = start + declared;
    }

    Ok(units)
}
