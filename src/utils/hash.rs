use crc32fast::Hasher;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const READ_CHUNK: usize = 8 * 1024;

/// Compute the CRC-32 checksum of a byte slice as uppercase hex
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    format!("{:X}", hasher.finalize())
}

/// Compute the CRC-32 checksum of a file's raw bytes, streaming the content
pub fn compute_file_checksum(path: &Path) -> Result<String, io::Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Hasher::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:X}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_checksum() {
        // CRC-32/IEEE check value
        assert_eq!(compute_checksum(b"123456789"), "CBF43926");
        assert_eq!(compute_checksum(b""), "0");
    }

    #[test]
    fn test_file_checksum_matches_in_memory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("V1__init.sql");
        let content = "CREATE TABLE t (id INTEGER);\n".repeat(2000);
        std::fs::write(&path, &content).unwrap();

        assert_eq!(
            compute_file_checksum(&path).unwrap(),
            compute_checksum(content.as_bytes())
        );
    }

    #[test]
    fn test_file_checksum_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = compute_file_checksum(&temp_dir.path().join("nope.sql")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
