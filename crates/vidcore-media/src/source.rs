//! Positioned reads against the stream the index was built from.

use bytes::Bytes;
use std::io::{self, Read, Seek, SeekFrom};

/// Random-access reads of sample bytes.
pub trait ReadAt: Send {
    /// Read exactly `len` bytes starting at `offset`.
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Bytes>;

    /// Total stream length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`ReadAt`] over any seekable reader.
pub struct StreamSource<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> StreamSource<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek + Send> ReadAt for StreamSource<R> {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > self.len) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {} bytes at {} past end of stream ({} bytes)",
                    len, offset, self.len
                ),
            ));
        }

        self.inner.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn len(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_at() {
        let mut source = StreamSource::new(Cursor::new((0u8..32).collect::<Vec<_>>())).unwrap();
        assert_eq!(source.len(), 32);
        assert_eq!(source.read_at(4, 3).unwrap().as_ref(), &[4, 5, 6]);
        // order of reads does not matter
        assert_eq!(source.read_at(0, 2).unwrap().as_ref(), &[0, 1]);
    }

    #[test]
    fn test_read_past_end() {
        let mut source = StreamSource::new(Cursor::new(vec![0u8; 8])).unwrap();
        let err = source.read_at(6, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(source.read_at(u64::MAX, 1).is_err());
    }
}
