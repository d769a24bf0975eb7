mod common;

use std::io::Cursor;

use warckit::stream::{ForwardStream, SeekStream};
use warckit::{WarcError, WarcReader, WarcWriter};

use common::{patterned, test_config};

fn write_archive(contents: &[Vec<u8>], compress: bool) -> Vec<u8> {
    let mut writer = WarcWriter::new(Vec::new(), test_config(compress));

    for content in contents {
        writer.write_record("resource", content, None).unwrap();
    }

    writer.into_inner()
}

fn check_interleaved_seekable(compressed: bool) {
    let contents = [patterned(300, 1), patterned(300, 2), patterned(300, 3)];
    let bytes = write_archive(&contents, compressed);

    let mut reader = WarcReader::new(SeekStream::new(Cursor::new(bytes)), compressed);

    let _warcinfo = reader.next_record().unwrap().unwrap();

    let mut first = reader.next_record().unwrap().unwrap();
    let mut second = reader.next_record().unwrap().unwrap();

    assert_eq!(first.body().read_all().unwrap(), contents[0]);

    let mut third = reader.next_record().unwrap().unwrap();

    let mut buf = [0u8; 20];
    let amount = third.body().read(&mut buf).unwrap();
    assert_eq!(amount, 20);
    assert_eq!(&buf[..], &contents[2][..20]);

    assert_eq!(second.body().read_all().unwrap(), contents[1]);
    assert_eq!(third.body().read_all().unwrap(), &contents[2][20..]);

    // handles report exhaustion once drained
    assert_eq!(third.body().remaining(), 0);
    assert_eq!(third.body().read_all().unwrap(), b"");

    assert!(reader.next_record().unwrap().is_none());
}

#[test_log::test]
fn test_interleaved_seekable() {
    check_interleaved_seekable(false);
}

#[test_log::test]
fn test_interleaved_seekable_gzip() {
    check_interleaved_seekable(true);
}

fn check_stale_non_seekable(compressed: bool) {
    let contents = [patterned(300, 4), patterned(300, 5)];
    let bytes = write_archive(&contents, compressed);

    let mut reader = WarcReader::new(ForwardStream::new(Cursor::new(bytes)), compressed);

    let _warcinfo = reader.next_record().unwrap().unwrap();

    let mut first = reader.next_record().unwrap().unwrap();

    let mut buf = [0u8; 10];
    let amount = first.body().read(&mut buf).unwrap();
    assert_eq!(amount, 10);
    assert_eq!(&buf[..], &contents[0][..10]);

    let mut second = reader.next_record().unwrap().unwrap();

    assert!(matches!(
        first.body().read_all(),
        Err(WarcError::NotSeekable)
    ));

    assert_eq!(second.body().read_all().unwrap(), contents[1]);
}

#[test_log::test]
fn test_stale_non_seekable() {
    check_stale_non_seekable(false);
}

#[test_log::test]
fn test_stale_non_seekable_gzip() {
    check_stale_non_seekable(true);
}

#[test_log::test]
fn test_line_iteration_over_body() {
    let mut writer = WarcWriter::new(Vec::new(), test_config(false));
    writer
        .write_record("metadata", b"k1: v1\r\nk2: v2\r\ntail", None)
        .unwrap();
    let bytes = writer.into_inner();

    let mut reader = WarcReader::new(ForwardStream::new(Cursor::new(bytes)), false);
    let _warcinfo = reader.next_record().unwrap().unwrap();
    let mut record = reader.next_record().unwrap().unwrap();

    let mut lines = Vec::new();
    let mut line = Vec::new();

    while record.body().read_line(&mut line).unwrap() > 0 {
        lines.push(line.clone());
    }

    assert_eq!(
        lines,
        vec![
            b"k1: v1\r\n".to_vec(),
            b"k2: v2\r\n".to_vec(),
            b"tail".to_vec()
        ]
    );
}

#[test_log::test]
fn test_stale_handle_after_iteration_end() {
    // seekable: a stale handle stays readable even after the reader hit EOF
    let contents = [patterned(64, 6)];
    let bytes = write_archive(&contents, false);

    let mut reader = WarcReader::new(SeekStream::new(Cursor::new(bytes)), false);

    let _warcinfo = reader.next_record().unwrap().unwrap();
    let mut record = reader.next_record().unwrap().unwrap();
    assert!(reader.next_record().unwrap().is_none());

    assert_eq!(record.body().read_all().unwrap(), contents[0]);
}
