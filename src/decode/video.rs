use super::{length_prefixed_to_annexb, DecodeError};
use crate::backend::{CodecProvider, DecodedPicture, VideoDecoder};
use std::sync::Arc;
use vidcore_media::AvcConfig;

/// Owns the H.264 decoder of one player.
pub struct VideoDecoderDriver {
    codecs: Arc<dyn CodecProvider>,
    config: AvcConfig,
    codec_params: Vec<u8>,
    decoder: Box<dyn VideoDecoder>,
    /// Set by reset; codec parameters are prepended to every input until
    /// the decoder yields its first picture.
    decode_restart: bool,
    resets: u64,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for VideoDecoderDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoDecoderDriver")
            .field("codec", &self.config.codec_string())
            .field("decode_restart", &self.decode_restart)
            .field("resets", &self.resets)
            .finish_non_exhaustive()
    }
}

impl VideoDecoderDriver {
    /// Create the decoder. A fresh decoder starts in the restart state.
    pub fn new(codecs: Arc<dyn CodecProvider>, config: AvcConfig) -> Result<Self, DecodeError> {
        let decoder = codecs.create_video_decoder(&config)?;
        let codec_params = config.annexb_headers();
        Ok(Self {
            codecs,
            config,
            codec_params,
            decoder,
            decode_restart: true,
            resets: 0,
            scratch: Vec::new(),
        })
    }

    /// Destroy and recreate the decoder, discarding any reordered pictures
    /// it still held.
    ///
    /// The restart flag is set even when recreation fails, in which case
    /// the previous decoder stays in place.
    pub fn reset(&mut self) -> Result<(), DecodeError> {
        self.decode_restart = true;
        self.resets += 1;
        self.decoder = self.codecs.create_video_decoder(&self.config)?;
        Ok(())
    }

    /// Decode one length-prefixed sample as read from the container.
    ///
    /// `Ok(None)` means the decoder accepted the sample but has nothing to
    /// show yet.
    pub fn decode(&mut self, sample: &[u8]) -> Result<Option<DecodedPicture>, DecodeError> {
        self.scratch.clear();
        if self.decode_restart {
            self.scratch.extend_from_slice(&self.codec_params);
        }
        length_prefixed_to_annexb(sample, self.config.nal_length_size, &mut self.scratch)?;

        let picture = self.decoder.decode(&self.scratch)?;
        if picture.is_some() && self.decode_restart {
            tracing::trace!(resets = self.resets, "Decoder restarted");
            self.decode_restart = false;
        }
        Ok(picture)
    }

    /// Annex-B SPS/PPS blob captured at open.
    pub fn codec_params(&self) -> &[u8] {
        &self.codec_params
    }

    pub fn restart_pending(&self) -> bool {
        self.decode_restart
    }

    /// Number of resets since creation.
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullCodecs;
    use crate::backend::PictureFormat;
    use vidcore_media::fixture::video_sample_payload;

    fn avc() -> AvcConfig {
        AvcConfig::parse(&[
            0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00,
            0x02, 0x68, 0xEE,
        ])
        .unwrap()
    }

    #[test]
    fn test_headers_prepended_until_first_picture() {
        let codecs = NullCodecs::new(PictureFormat::I420, 4, 2).with_reorder_delay(1);
        let mut driver = VideoDecoderDriver::new(Arc::new(codecs.clone()), avc()).unwrap();
        assert!(driver.restart_pending());

        assert!(driver.decode(&video_sample_payload(0, true, 4)).unwrap().is_none());
        assert!(driver.restart_pending());
        assert!(driver.decode(&video_sample_payload(1, false, 4)).unwrap().is_some());
        assert!(!driver.restart_pending());
        assert!(driver.decode(&video_sample_payload(2, false, 4)).unwrap().is_some());

        assert_eq!(codecs.video_inputs(), 3);
        assert_eq!(codecs.inputs_with_parameter_sets(), 2);
    }

    #[test]
    fn test_reset_recreates_decoder() {
        let codecs = NullCodecs::new(PictureFormat::Nv12, 4, 2);
        let mut driver = VideoDecoderDriver::new(Arc::new(codecs.clone()), avc()).unwrap();
        driver.decode(&video_sample_payload(0, true, 4)).unwrap();
        assert!(!driver.restart_pending());

        driver.reset().unwrap();
        assert!(driver.restart_pending());
        assert_eq!(driver.resets(), 1);
        assert_eq!(codecs.video_decoders_created(), 2);

        // the fresh decoder only accepts a slice because headers were prepended
        let picture = driver.decode(&video_sample_payload(5, false, 4)).unwrap();
        assert!(picture.is_some());
    }

    #[test]
    fn test_malformed_sample() {
        let codecs = NullCodecs::new(PictureFormat::I420, 4, 2);
        let mut driver = VideoDecoderDriver::new(Arc::new(codecs), avc()).unwrap();
        let err = driver.decode(&[0, 0, 0, 40, 0x65]).unwrap_err();
        assert!(matches!(err, DecodeError::Nal(_)));
        assert!(driver.restart_pending());
    }

    #[test]
    fn test_codec_params_are_annexb() {
        let codecs = NullCodecs::new(PictureFormat::I420, 4, 2);
        let driver = VideoDecoderDriver::new(Arc::new(codecs), avc()).unwrap();
        assert_eq!(
            driver.codec_params(),
            &[0, 0, 0, 1, 0x67, 0x64, 0x00, 0x1F, 0, 0, 0, 1, 0x68, 0xEE]
        );
    }
}
