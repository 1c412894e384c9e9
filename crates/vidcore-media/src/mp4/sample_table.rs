//! Sample table resolution.
//!
//! The `stbl` children describe samples in compressed run-length form:
//! - stts: decode durations
//! - stss: sync samples (absent means every sample is sync)
//! - stsc: sample-to-chunk runs
//! - stsz: sample sizes
//! - stco/co64: chunk offsets
//! - ctts: composition offsets
//!
//! [`SampleTableBuilder`] expands them into one [`SampleEntry`] per sample.

use crate::{Error, Result};
use std::collections::HashSet;

/// Upper bound on samples per track: 24 hours of 192 kHz audio in
/// 1024-sample frames.
pub const MAX_SAMPLES: usize = 16_200_000;

/// A fully resolved sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    /// Sample index (0-based).
    pub index: u32,
    /// Absolute stream offset of the sample bytes.
    pub offset: u64,
    pub size: u32,
    /// Decode timestamp in media timescale.
    pub dts: u64,
    /// Decode duration in media timescale.
    pub duration: u32,
    /// Composition offset, may be negative for version 1 `ctts`.
    pub cts_offset: i32,
    pub is_keyframe: bool,
}

impl SampleEntry {
    /// Presentation timestamp, clamped at zero.
    pub fn pts(&self) -> u64 {
        (self.dts as i64 + self.cts_offset as i64).max(0) as u64
    }
}

/// Resolved samples of one track, in decode order.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub samples: Vec<SampleEntry>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&SampleEntry> {
        self.samples.get(index as usize)
    }

    /// DTS just past the last sample.
    pub fn end_dts(&self) -> u64 {
        self.samples
            .last()
            .map(|s| s.dts + s.duration as u64)
            .unwrap_or(0)
    }

    /// Find the keyframe at or before the given sample index.
    pub fn find_keyframe_at_or_before(&self, index: u32) -> Option<u32> {
        let last = (index as usize).min(self.samples.len().checked_sub(1)?);
        self.samples[..=last]
            .iter()
            .rev()
            .find(|s| s.is_keyframe)
            .map(|s| s.index)
    }
}

/// Collects raw `stbl` entries and expands them.
#[derive(Debug, Default)]
pub struct SampleTableBuilder {
    /// (count, delta)
    stts_entries: Vec<(u32, u32)>,
    /// 1-based sample numbers
    sync_samples: Option<Vec<u32>>,
    /// (first_chunk, samples_per_chunk, description_index)
    stsc_entries: Vec<(u32, u32, u32)>,
    uniform_size: u32,
    sample_count: u32,
    sample_sizes: Vec<u32>,
    chunk_offsets: Vec<u64>,
    /// (count, offset)
    ctts_entries: Vec<(u32, i32)>,
}

impl SampleTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stts(&mut self, entries: Vec<(u32, u32)>) {
        self.stts_entries = entries;
    }

    pub fn set_sync_samples(&mut self, samples: Vec<u32>) {
        self.sync_samples = Some(samples);
    }

    pub fn set_stsc(&mut self, entries: Vec<(u32, u32, u32)>) {
        self.stsc_entries = entries;
    }

    /// `sizes` is empty when `uniform_size` is non-zero.
    pub fn set_stsz(&mut self, uniform_size: u32, sample_count: u32, sizes: Vec<u32>) {
        self.uniform_size = uniform_size;
        self.sample_count = sample_count;
        self.sample_sizes = sizes;
    }

    pub fn set_chunk_offsets(&mut self, offsets: Vec<u64>) {
        self.chunk_offsets = offsets;
    }

    pub fn set_ctts(&mut self, entries: Vec<(u32, i32)>) {
        self.ctts_entries = entries;
    }

    /// Expand every table into per-sample entries.
    ///
    /// Samples whose chunk cannot be resolved (stsc/stco shorter than stsz)
    /// are dropped from the tail rather than given a bogus offset. A sample
    /// count above [`MAX_SAMPLES`] is rejected.
    pub fn build(self) -> Result<SampleTable> {
        let declared = if self.uniform_size > 0 {
            self.sample_count as usize
        } else {
            self.sample_sizes.len()
        };
        if declared > MAX_SAMPLES {
            return Err(Error::invalid_mp4(format!(
                "stsz declares {declared} samples, limit is {MAX_SAMPLES}"
            )));
        }

        let offsets = self.resolve_offsets(declared);
        let sample_count = offsets.len();
        if sample_count == 0 {
            return Ok(SampleTable::default());
        }

        let timing = self.resolve_timestamps(sample_count);
        let cts_offsets = self.resolve_cts_offsets(sample_count);
        let sync: Option<HashSet<u32>> = self
            .sync_samples
            .as_ref()
            .map(|s| s.iter().copied().collect());

        let samples = offsets
            .into_iter()
            .enumerate()
            .map(|(i, offset)| {
                let (dts, duration) = timing[i];
                SampleEntry {
                    index: i as u32,
                    offset,
                    size: self.size_of(i),
                    dts,
                    duration,
                    cts_offset: cts_offsets[i],
                    is_keyframe: sync
                        .as_ref()
                        .map_or(true, |set| set.contains(&(i as u32 + 1))),
                }
            })
            .collect();

        Ok(SampleTable { samples })
    }

    fn size_of(&self, index: usize) -> u32 {
        if self.uniform_size > 0 {
            self.uniform_size
        } else {
            self.sample_sizes.get(index).copied().unwrap_or(0)
        }
    }

    fn resolve_offsets(&self, sample_count: usize) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(sample_count.min(self.chunk_capacity()));
        let num_chunks = self.chunk_offsets.len() as u32;

        'runs: for (i, &(first_chunk, samples_per_chunk, _)) in self.stsc_entries.iter().enumerate() {
            let next_first = self
                .stsc_entries
                .get(i + 1)
                .map_or(num_chunks + 1, |e| e.0);

            for chunk in first_chunk.max(1)..next_first.min(num_chunks + 1) {
                let mut pos = self.chunk_offsets[(chunk - 1) as usize];
                for _ in 0..samples_per_chunk {
                    if offsets.len() >= sample_count {
                        break 'runs;
                    }
                    offsets.push(pos);
                    pos += self.size_of(offsets.len() - 1) as u64;
                }
            }
        }

        offsets
    }

    /// Samples the stsc runs can place into the known chunks.
    fn chunk_capacity(&self) -> usize {
        let num_chunks = self.chunk_offsets.len() as u64;
        let capacity = self
            .stsc_entries
            .iter()
            .enumerate()
            .map(|(i, &(first_chunk, samples_per_chunk, _))| {
                let first = u64::from(first_chunk.max(1));
                let next = self
                    .stsc_entries
                    .get(i + 1)
                    .map_or(num_chunks + 1, |e| u64::from(e.0))
                    .min(num_chunks + 1);
                next.saturating_sub(first) * u64::from(samples_per_chunk)
            })
            .fold(0u64, u64::saturating_add);
        usize::try_from(capacity).unwrap_or(usize::MAX)
    }

    fn resolve_timestamps(&self, sample_count: usize) -> Vec<(u64, u32)> {
        let mut timing = Vec::with_capacity(sample_count);
        let mut dts = 0u64;

        'entries: for &(count, delta) in &self.stts_entries {
            for _ in 0..count {
                if timing.len() >= sample_count {
                    break 'entries;
                }
                timing.push((dts, delta));
                dts += delta as u64;
            }
        }

        // stts shorter than stsz: repeat the last delta
        let last_delta = timing.last().map_or(0, |t| t.1);
        while timing.len() < sample_count {
            timing.push((dts, last_delta));
            dts += last_delta as u64;
        }

        timing
    }

    fn resolve_cts_offsets(&self, sample_count: usize) -> Vec<i32> {
        let mut offsets: Vec<i32> = self
            .ctts_entries
            .iter()
            .flat_map(|&(count, offset)| std::iter::repeat(offset).take(count as usize))
            .take(sample_count)
            .collect();
        offsets.resize(sample_count, 0);
        offsets
    }
}
