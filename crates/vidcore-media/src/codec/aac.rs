//! MPEG-4 audio configuration from `esds` descriptors.

use crate::{Error, Result};
use bytes::Bytes;

/// Sampling frequency table indexed by `samplingFrequencyIndex`.
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const ES_DESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_TAG: u8 = 0x04;
const DECODER_SPECIFIC_TAG: u8 = 0x05;

/// objectTypeIndication values that carry AAC.
const MPEG4_AUDIO: u8 = 0x40;
const MPEG2_AAC: [u8; 3] = [0x66, 0x67, 0x68];

/// AudioSpecificConfig plus the fields the player needs from it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AacConfig {
    /// Audio object type (2 = AAC-LC, 5 = SBR, 29 = PS).
    pub object_type: u8,
    /// Rate signalled by the config, 0 if the index is reserved.
    pub sample_rate: u32,
    /// Channel configuration, 0 means defined in-band.
    pub channels: u8,
    /// Raw AudioSpecificConfig handed to the decoder.
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub asc: Bytes,
}

impl AacConfig {
    /// Parse an `esds` payload including its version/flags word.
    pub fn from_esds(data: &[u8]) -> Result<Self> {
        let body = data
            .get(4..)
            .ok_or_else(|| Error::invalid_config("esds too short"))?;

        let (tag, es, _) = read_descriptor(body)?;
        if tag != ES_DESCRIPTOR_TAG {
            return Err(Error::invalid_config(format!(
                "esds starts with tag {tag:#04x}"
            )));
        }

        // ES_ID(2) then flags selecting optional fields
        let flags = *es
            .get(2)
            .ok_or_else(|| Error::invalid_config("ES_Descriptor truncated"))?;
        let mut pos = 3;
        if flags & 0x80 != 0 {
            pos += 2;
        }
        if flags & 0x40 != 0 {
            let url_len = *es
                .get(pos)
                .ok_or_else(|| Error::invalid_config("ES_Descriptor URL truncated"))?;
            pos += 1 + url_len as usize;
        }
        if flags & 0x20 != 0 {
            pos += 2;
        }

        let rest = es
            .get(pos..)
            .ok_or_else(|| Error::invalid_config("ES_Descriptor truncated"))?;
        let (tag, dcd, _) = read_descriptor(rest)?;
        if tag != DECODER_CONFIG_TAG {
            return Err(Error::invalid_config(format!(
                "expected DecoderConfigDescriptor, found tag {tag:#04x}"
            )));
        }

        let object_indication = *dcd
            .first()
            .ok_or_else(|| Error::invalid_config("DecoderConfigDescriptor empty"))?;
        if object_indication != MPEG4_AUDIO && !MPEG2_AAC.contains(&object_indication) {
            return Err(Error::unsupported(format!(
                "audio objectTypeIndication {object_indication:#04x}"
            )));
        }

        // objectType(1) streamType(1) bufferSize(3) maxBitrate(4) avgBitrate(4)
        let specific = dcd
            .get(13..)
            .ok_or_else(|| Error::invalid_config("DecoderConfigDescriptor truncated"))?;
        let (tag, asc, _) = read_descriptor(specific)?;
        if tag != DECODER_SPECIFIC_TAG {
            return Err(Error::invalid_config("missing DecoderSpecificInfo"));
        }

        Self::from_audio_specific_config(asc)
    }

    /// Parse a bare AudioSpecificConfig.
    pub fn from_audio_specific_config(asc: &[u8]) -> Result<Self> {
        let mut bits = BitReader::new(asc);

        let mut object_type = bits.read(5)? as u8;
        if object_type == 31 {
            object_type = 32 + bits.read(6)? as u8;
        }

        let index = bits.read(4)? as usize;
        let sample_rate = if index == 0x0F {
            bits.read(24)?
        } else {
            AAC_SAMPLE_RATES.get(index).copied().unwrap_or(0)
        };

        let channels = bits.read(4)? as u8;

        Ok(Self {
            object_type,
            sample_rate,
            channels,
            asc: Bytes::copy_from_slice(asc),
        })
    }
}

/// Split one descriptor into (tag, payload, remainder).
fn read_descriptor(data: &[u8]) -> Result<(u8, &[u8], &[u8])> {
    let tag = *data
        .first()
        .ok_or_else(|| Error::invalid_config("descriptor truncated"))?;

    // expandable size: up to four 7-bit groups
    let mut len = 0usize;
    let mut pos = 1;
    loop {
        let byte = *data
            .get(pos)
            .ok_or_else(|| Error::invalid_config("descriptor length truncated"))?;
        len = (len << 7) | (byte & 0x7F) as usize;
        pos += 1;
        if byte & 0x80 == 0 || pos > 4 {
            break;
        }
    }

    let payload = data
        .get(pos..pos + len)
        .ok_or_else(|| Error::invalid_config(format!("descriptor {tag:#04x} overruns esds")))?;
    Ok((tag, payload, &data[pos + len..]))
}

struct BitReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    fn read(&mut self, count: usize) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self
                .data
                .get(self.bit / 8)
                .ok_or_else(|| Error::invalid_config("AudioSpecificConfig truncated"))?;
            let bit = (byte >> (7 - self.bit % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.bit += 1;
        }
        Ok(value)
    }
}
