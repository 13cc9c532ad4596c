use crate::core::error::Result;
use crate::core::fs::is_gzipped;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Open a plain or gzip-compressed text file behind a sized buffer.
pub fn open_text_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gzipped(path) {
        Box::new(BufReader::with_capacity(256 * 1024, GzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    };
    Ok(reader)
}

/// Read a file of one value per line, trimming trailing whitespace and
/// skipping blank lines.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = open_text_reader(path)?;
    let mut values = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim_end();
        if !trimmed.is_empty() {
            values.push(trimmed.to_string());
        }
    }
    Ok(values)
}

/// Build a tab-separated reader over an optionally gzip-compressed file.
pub fn get_tsv_reader<P: AsRef<Path>>(
    path: P,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let path = path.as_ref();
    let raw_reader: Box<dyn Read> = if is_gzipped(path) {
        Box::new(GzDecoder::new(File::open(path)?))
    } else {
        Box::new(File::open(path)?)
    };

    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(raw_reader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn reads_plain_and_gzipped_lines() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("values.txt");
        std::fs::write(&plain, "AAAC\nGGGT\n\n").unwrap();
        assert_eq!(read_lines(&plain).unwrap(), vec!["AAAC", "GGGT"]);

        let gz = dir.path().join("values.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"AAAC\nGGGT\n").unwrap();
        encoder.finish().unwrap();
        assert_eq!(read_lines(&gz).unwrap(), vec!["AAAC", "GGGT"]);
    }
}
