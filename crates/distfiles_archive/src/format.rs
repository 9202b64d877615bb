//! Compression format detection

use crate::error::{ArchiveError, Result};
use std::io::{BufReader, Read, Seek, SeekFrom};

/// Number of leading bytes inspected when sniffing a stream
pub const MAGIC_LEN: usize = 5;

const GZIP_MAGIC: &[u8] = b"\x1f\x8b\x08";
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = b"\xfd7zXZ";
const LZMA_ALONE_MAGIC: &[u8] = b"\x5d\x00\x00\x80";

/// Supported compressed tar containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive
    TarGz,
    /// Bzip2-compressed tar archive
    TarBz2,
    /// XZ-compressed tar archive
    TarXz,
    /// Legacy LZMA-alone compressed tar archive
    TarLzma,
}

impl ArchiveFormat {
    /// Classify a stream prefix. The first matching magic wins.
    pub fn detect_from_magic(prefix: &[u8]) -> Option<Self> {
        if prefix.starts_with(GZIP_MAGIC) {
            Some(Self::TarGz)
        } else if prefix.starts_with(BZIP2_MAGIC) {
            Some(Self::TarBz2)
        } else if prefix.starts_with(LZMA_ALONE_MAGIC) {
            Some(Self::TarLzma)
        } else if prefix.starts_with(XZ_MAGIC) {
            Some(Self::TarXz)
        } else {
            None
        }
    }

    /// Read the first [`MAGIC_LEN`] bytes of `reader` and classify them.
    ///
    /// The reader is left positioned at offset 0 so the decoder can consume the
    /// stream from the start.
    pub fn sniff<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut prefix = Vec::with_capacity(MAGIC_LEN);
        reader.by_ref().take(MAGIC_LEN as u64).read_to_end(&mut prefix)?;
        reader.seek(SeekFrom::Start(0))?;

        Self::detect_from_magic(&prefix).ok_or(ArchiveError::UnknownFormat)
    }

    /// Wrap `reader` in the decompressor matching this format
    pub fn decoder<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        let buf_reader = BufReader::new(reader);

        let decoder: Box<dyn Read + 'a> = match self {
            Self::TarGz => Box::new(flate2::read::GzDecoder::new(buf_reader)),
            Self::TarBz2 => Box::new(bzip2::read::BzDecoder::new(buf_reader)),
            Self::TarXz => Box::new(xz2::read::XzDecoder::new(buf_reader)),
            Self::TarLzma => {
                let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
                    .map_err(ArchiveError::corrupt_archive)?;
                Box::new(xz2::read::XzDecoder::new_stream(buf_reader, stream))
            }
        };

        Ok(decoder)
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::TarGz => "TAR.GZ",
            Self::TarBz2 => "TAR.BZ2",
            Self::TarXz => "TAR.XZ",
            Self::TarLzma => "TAR.LZMA",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use std::io::{Cursor, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn lzma(data: &[u8]) -> Vec<u8> {
        let options = xz2::stream::LzmaOptions::new_preset(6).unwrap();
        let stream = xz2::stream::Stream::new_lzma_encoder(&options).unwrap();
        let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[rstest]
    #[case::gzip(gzip(b"payload"), ArchiveFormat::TarGz)]
    #[case::bzip2(bzip2(b"payload"), ArchiveFormat::TarBz2)]
    #[case::xz(xz(b"payload"), ArchiveFormat::TarXz)]
    #[case::lzma(lzma(b"payload"), ArchiveFormat::TarLzma)]
    fn test_sniff_compressed_streams(#[case] data: Vec<u8>, #[case] expected: ArchiveFormat) {
        let mut cursor = Cursor::new(data);
        assert_eq!(ArchiveFormat::sniff(&mut cursor).unwrap(), expected);
        assert_eq!(cursor.position(), 0);

        let mut decoded = Vec::new();
        expected
            .decoder(cursor)
            .unwrap()
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, b"payload");
    }

    #[rstest]
    #[case::plain_text(b"hello world".to_vec())]
    #[case::zip(vec![0x50, 0x4b, 0x03, 0x04, 0x14])]
    #[case::gzip_without_deflate(vec![0x1f, 0x8b, 0x00, 0x00, 0x00])]
    #[case::too_short(b"BZ".to_vec())]
    #[case::empty(Vec::new())]
    fn test_sniff_unknown(#[case] data: Vec<u8>) {
        let mut cursor = Cursor::new(data);
        assert_matches!(
            ArchiveFormat::sniff(&mut cursor),
            Err(ArchiveError::UnknownFormat)
        );
    }

    #[test]
    fn test_sniff_rewinds_from_any_position() {
        let mut cursor = Cursor::new(gzip(b"abc"));
        cursor.set_position(7);
        assert_eq!(
            ArchiveFormat::sniff(&mut cursor).unwrap(),
            ArchiveFormat::TarGz
        );
        assert_eq!(cursor.position(), 0);
    }
}
