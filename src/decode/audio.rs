use super::DecodeError;
use crate::backend::{AudioDecoder, CodecProvider};
use vidcore_media::{AacConfig, AudioInfo};

/// Owns the AAC decoder of one player.
pub struct AudioDecoderDriver {
    decoder: Box<dyn AudioDecoder>,
    info: AudioInfo,
}

impl std::fmt::Debug for AudioDecoderDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDecoderDriver")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl AudioDecoderDriver {
    /// Create and configure a decoder.
    ///
    /// Fields neither the AudioSpecificConfig nor the container header
    /// determine stay zero until the first decode reveals them.
    pub fn configure(
        codecs: &dyn CodecProvider,
        config: &AacConfig,
        container: AudioInfo,
    ) -> Result<Self, DecodeError> {
        let mut decoder = codecs.create_audio_decoder()?;
        let info = decoder.configure(config)?.merge(&container);
        tracing::debug!(
            sample_rate = info.sample_rate,
            channels = info.channels,
            bits = info.bits_per_sample,
            "Audio decoder configured"
        );
        Ok(Self { decoder, info })
    }

    /// Decode one access unit into interleaved PCM.
    pub fn decode(&mut self, sample: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let pcm = self.decoder.decode(sample)?;
        if !self.info.is_complete() {
            self.info = self.info.merge(&self.decoder.stream_info());
        }
        Ok(pcm)
    }

    /// Stream format. Once complete it never changes.
    pub fn info(&self) -> AudioInfo {
        self.info
    }
}
