use anyhow::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error_handling::DemuxError;

type GzipReader = BufReader<MultiGzDecoder<File>>;
type ZstdReader = BufReader<zstd::Decoder<'static, BufReader<File>>>;
type PlainReader = BufReader<File>;

/// Compression of an input file, chosen from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zstd,
    Plain,
}

impl Compression {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("gz") => Ok(Compression::Gzip),
            Some("zst") => Ok(Compression::Zstd),
            Some("zip") => Err(DemuxError::configuration(format!(
                "ZIP file decompression is not supported. Only gzip and zstd files are supported for streaming decompression. Extract the ZIP file first: unzip {}",
                path.display()
            ))
            .into()),
            _ => Ok(Compression::Plain),
        }
    }
}

/// Streaming decompression wrapper that implements BufRead
pub enum DecompressionReader {
    Gzip(GzipReader),
    Zstd(ZstdReader),
    Plain(PlainReader),
}

// zstd::Decoder doesn't implement Debug
impl std::fmt::Debug for DecompressionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecompressionReader::Gzip(_) => write!(f, "DecompressionReader::Gzip"),
            DecompressionReader::Zstd(_) => write!(f, "DecompressionReader::Zstd"),
            DecompressionReader::Plain(_) => write!(f, "DecompressionReader::Plain"),
        }
    }
}

impl BufRead for DecompressionReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            DecompressionReader::Gzip(reader) => reader.fill_buf(),
            DecompressionReader::Zstd(reader) => reader.fill_buf(),
            DecompressionReader::Plain(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DecompressionReader::Gzip(reader) => reader.consume(amt),
            DecompressionReader::Zstd(reader) => reader.consume(amt),
            DecompressionReader::Plain(reader) => reader.consume(amt),
        }
    }
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
            DecompressionReader::Plain(reader) => reader.read(buf),
        }
    }
}

impl DecompressionReader {
    /// Open `path`, decompressing transparently when its extension says so
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let compression = Compression::from_path(path_ref)?;
        let file = File::open(path_ref).map_err(|e| DemuxError::input(path_ref, e))?;

        let reader = match compression {
            Compression::Gzip => DecompressionReader::Gzip(BufReader::new(MultiGzDecoder::new(file))),
            Compression::Zstd => {
                let decoder = zstd::Decoder::new(file).map_err(|e| DemuxError::input(path_ref, e))?;
                DecompressionReader::Zstd(BufReader::new(decoder))
            }
            Compression::Plain => DecompressionReader::Plain(BufReader::new(file)),
        };

        Ok(reader)
    }

    pub fn compression(&self) -> Compression {
        match self {
            DecompressionReader::Gzip(_) => Compression::Gzip,
            DecompressionReader::Zstd(_) => Compression::Zstd,
            DecompressionReader::Plain(_) => Compression::Plain,
        }
    }
}
