use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

/// Read buffer for input sources (256KB)
pub const READ_BUFFER_SIZE: usize = 256 * 1024;

type Source = Chain<Cursor<Vec<u8>>, Box<dyn Read + Send>>;
type GzipReader = BufReader<MultiGzDecoder<Source>>;
type ZstdReader = BufReader<zstd::Decoder<'static, BufReader<Source>>>;
type PlainReader = BufReader<Source>;

/// Streaming decompression wrapper that implements BufRead
/// Detects gzip (1F 8B 08) and zstd (28 B5 2F FD) compression using magic bytes
pub enum DecompressionReader {
    Gzip(GzipReader),
    Zstd(ZstdReader),
    Plain(PlainReader),
}

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
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
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
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
            DecompressionReader::Plain(reader) => reader.read(buf),
        }
    }
}

/// Fill `head` as far as the reader allows; short only at end of input.
fn read_head<R: Read>(reader: &mut R, head: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        match reader.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl DecompressionReader {
    /// Wrap any reader, choosing a decoder from its first bytes
    pub fn from_reader<R: Read + Send + 'static>(mut reader: R) -> io::Result<Self> {
        let mut head = [0u8; 4];
        let n = read_head(&mut reader, &mut head)?;

        // Put the read bytes back in front using a cursor chain
        let inner: Box<dyn Read + Send> = Box::new(reader);
        let chained = Cursor::new(head[..n].to_vec()).chain(inner);

        let is_gzip = n >= 3 && head[..3] == [0x1F, 0x8B, 0x08];
        let is_zstd = n >= 4 && head == [0x28, 0xB5, 0x2F, 0xFD];

        if is_gzip {
            let decoder = MultiGzDecoder::new(chained);
            Ok(DecompressionReader::Gzip(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                decoder,
            )))
        } else if is_zstd {
            let decoder = zstd::Decoder::new(chained)?;
            Ok(DecompressionReader::Zstd(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                decoder,
            )))
        } else {
            Ok(DecompressionReader::Plain(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                chained,
            )))
        }
    }

    /// Open a file, rejecting directories and ZIP archives
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();

        if path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "input is a directory, expected a file",
            ));
        }

        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "ZIP archives are not supported, only gzip and zstd are decompressed on the fly. Extract it first: unzip {}",
                    path.display()
                ),
            ));
        }

        let file = File::open(path)?;
        Self::from_reader(file)
    }
}
