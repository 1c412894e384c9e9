//! AVCDecoderConfigurationRecord (`avcC`).

use crate::mp4::be_u16;
use crate::{Error, Result};
use bytes::Bytes;

/// Four-byte Annex-B start code.
pub const ANNEXB_START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Parsed `avcC` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AvcConfig {
    pub profile: u8,
    pub compatibility: u8,
    pub level: u8,
    /// Size in bytes of the length prefix on every NAL unit, 1 to 4.
    pub nal_length_size: u8,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub sps: Vec<Bytes>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub pps: Vec<Bytes>,
}

impl AvcConfig {
    /// Parse an `avcC` box payload (without the box header).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(Error::invalid_config(format!(
                "avcC too short: {} bytes",
                data.len()
            )));
        }
        if data[0] != 1 {
            return Err(Error::invalid_config(format!(
                "avcC version {} not supported",
                data[0]
            )));
        }

        let nal_length_size = (data[4] & 0x03) + 1;
        let mut pos = 5;

        let sps_count = (data[pos] & 0x1F) as usize;
        pos += 1;
        let sps = read_parameter_sets(data, &mut pos, sps_count, "SPS")?;

        let pps_count = *data
            .get(pos)
            .ok_or_else(|| Error::invalid_config("avcC truncated before PPS count"))?
            as usize;
        pos += 1;
        let pps = read_parameter_sets(data, &mut pos, pps_count, "PPS")?;

        if sps.is_empty() || pps.is_empty() {
            return Err(Error::invalid_config(format!(
                "avcC carries {} SPS and {} PPS",
                sps.len(),
                pps.len()
            )));
        }

        Ok(Self {
            profile: data[1],
            compatibility: data[2],
            level: data[3],
            nal_length_size,
            sps,
            pps,
        })
    }

    /// Every SPS then every PPS, each behind a four-byte start code.
    ///
    /// Prepended to the first access unit after a decoder (re)start.
    pub fn annexb_headers(&self) -> Vec<u8> {
        let len: usize = self
            .sps
            .iter()
            .chain(&self.pps)
            .map(|nal| nal.len() + ANNEXB_START_CODE.len())
            .sum();

        let mut out = Vec::with_capacity(len);
        for nal in self.sps.iter().chain(&self.pps) {
            out.extend_from_slice(&ANNEXB_START_CODE);
            out.extend_from_slice(nal);
        }
        out
    }

    /// RFC 6381 codec string, e.g. `avc1.64001f`.
    pub fn codec_string(&self) -> String {
        format!(
            "avc1.{:02x}{:02x}{:02x}",
            self.profile, self.compatibility, self.level
        )
    }
}

fn read_parameter_sets(
    data: &[u8],
    pos: &mut usize,
    count: usize,
    what: &str,
) -> Result<Vec<Bytes>> {
    let mut sets = Vec::with_capacity(count);
    for _ in 0..count {
        let len = be_u16(data, *pos)
            .ok_or_else(|| Error::invalid_config(format!("avcC truncated in {what} length")))?
            as usize;
        *pos += 2;
        let nal = data
            .get(*pos..*pos + len)
            .ok_or_else(|| Error::invalid_config(format!("avcC truncated in {what} data")))?;
        sets.push(Bytes::copy_from_slice(nal));
        *pos += len;
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_avcc() -> Vec<u8> {
        vec![
            0x01, // configurationVersion
            0x64, // profile (High)
            0x00, // compatibility
            0x1F, // level 3.1
            0xFC | 3, // 4-byte NAL lengths
            0xE0 | 1, // one SPS
            0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, // SPS
            0x01, // one PPS
            0x00, 0x02, 0x68, 0xEE, // PPS
        ]
    }

    #[test]
    fn test_parse_avcc() {
        let config = AvcConfig::parse(&sample_avcc()).unwrap();
        assert_eq!(config.nal_length_size, 4);
        assert_eq!(config.sps.len(), 1);
        assert_eq!(config.pps[0].as_ref(), &[0x68, 0xEE]);
        assert_eq!(config.codec_string(), "avc1.64001f");
    }

    #[test]
    fn test_annexb_headers_layout() {
        let config = AvcConfig::parse(&sample_avcc()).unwrap();
        assert_eq!(
            config.annexb_headers(),
            vec![0, 0, 0, 1, 0x67, 0x64, 0x00, 0x1F, 0, 0, 0, 1, 0x68, 0xEE]
        );
    }

    #[test]
    fn test_two_byte_length_size() {
        let mut data = sample_avcc();
        data[4] = 0xFC | 1;
        assert_eq!(AvcConfig::parse(&data).unwrap().nal_length_size, 2);
    }

    #[test]
    fn test_truncated_pps_rejected() {
        let mut data = sample_avcc();
        data.truncate(data.len() - 1);
        assert!(matches!(
            AvcConfig::parse(&data),
            Err(Error::InvalidCodecConfig(_))
        ));
    }

    #[test]
    fn test_missing_parameter_sets_rejected() {
        let data = [0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE0, 0x00];
        assert!(AvcConfig::parse(&data).is_err());
    }
}
