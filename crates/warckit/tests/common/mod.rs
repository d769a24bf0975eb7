#![allow(dead_code)]

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use warckit::WriterConfig;

/// Compresses a whole buffer as one gzip member, like an external tool would.
pub fn gzip_whole(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn test_config(compress: bool) -> WriterConfig {
    WriterConfig {
        compress,
        software_name: "unittester".to_string(),
        software_version: "0.0.0".to_string(),
        warc_meta: vec![
            ("operator".to_string(), "tests".to_string()),
            ("hostname".to_string(), "localhost".to_string()),
        ],
    }
}

/// Deterministic filler bytes.
pub fn patterned(length: usize, seed: u8) -> Vec<u8> {
    (0..length)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
