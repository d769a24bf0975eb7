mod common;

use std::io::Cursor;

use tempdir::TempDir;

use warckit::fields::FieldMap;
use warckit::stream::SeekStream;
use warckit::{RecordType, WarcError, WarcReader, WarcRecord, WarcWriter};

use common::{patterned, test_config};

fn testset() -> Vec<(Vec<u8>, Vec<(String, String)>)> {
    let sizes = [0usize, 1, 10, 300, 4096, 70000];

    sizes
        .iter()
        .enumerate()
        .map(|(index, &size)| {
            let headers = (0..3)
                .map(|n| (format!("X-Custom-{}-{}", index, n), format!("value-{}", n)))
                .collect();

            (patterned(size, index as u8), headers)
        })
        .collect()
}

fn extra_fields(headers: &[(String, String)]) -> FieldMap {
    let mut map = FieldMap::new();

    for (name, value) in headers {
        map.append(name.as_str(), value.as_str());
    }

    map
}

fn validate_record(record: &WarcRecord<SeekStream<Cursor<Vec<u8>>>>) {
    let header = record.header();

    for name in [
        "WARC-Type",
        "WARC-Date",
        "WARC-Record-ID",
        "Content-Length",
    ] {
        assert!(
            header.fields().contains_key(name),
            "'{}' not in record headers",
            name
        );
    }

    for pair in header.fields().iter() {
        let normalized = pair.name.normalized();

        if normalized.starts_with("warc-")
            || normalized == "content-length"
            || normalized == "content-type"
        {
            assert_eq!(
                header.fields().get_all(normalized).count(),
                1,
                "'{}' has duplicate keys",
                pair.name.text
            );
        }
    }

    let record_id = header.record_id().unwrap();
    assert_eq!(record_id.get_version_num(), 4);

    let raw_id = header.fields().get("WARC-Record-ID").unwrap();
    assert!(raw_id.starts_with("urn:uuid:"));
    assert_eq!(raw_id, raw_id.to_ascii_lowercase());

    header.date().unwrap();
    assert_ne!(header.record_type().unwrap(), RecordType::Unknown);
}

fn validate_archive(
    bytes: Vec<u8>,
    compressed: bool,
    expected: &[(Vec<u8>, Vec<(String, String)>)],
) {
    let mut reader = WarcReader::new(SeekStream::new(Cursor::new(bytes)), compressed);

    let mut warcinfo = reader.next_record().unwrap().unwrap();

    assert_eq!(
        warcinfo.header().record_type().unwrap(),
        RecordType::Warcinfo
    );
    assert_eq!(
        warcinfo.header().content_type(),
        Some("application/warc-fields")
    );
    validate_record(&warcinfo);

    let warcinfo_id = warcinfo.header().record_id().unwrap();

    // the payload is `Name: Value\r\n` lines carrying the configured fields
    let mut payload_fields = Vec::new();
    let mut line = Vec::new();

    while warcinfo.body().read_line(&mut line).unwrap() > 0 {
        let text = String::from_utf8(line.clone()).unwrap();

        assert!(text.ends_with("\r\n"), "invalid warcinfo line: {:?}", text);
        assert!(text.contains(": "), "invalid warcinfo line: {:?}", text);

        let (name, value) = text.trim_end().split_once(": ").unwrap();
        payload_fields.push((name.to_string(), value.to_string()));
    }

    assert!(payload_fields.contains(&("format".to_string(), "WARC/1.1".to_string())));
    assert!(payload_fields.contains(&("software".to_string(), "unittester/0.0.0".to_string())));
    assert!(payload_fields.contains(&("operator".to_string(), "tests".to_string())));
    assert!(payload_fields.contains(&("hostname".to_string(), "localhost".to_string())));

    for (content, headers) in expected {
        let mut record = reader.next_record().unwrap().unwrap();

        validate_record(&record);
        assert_eq!(record.header().record_type().unwrap(), RecordType::Resource);
        assert_eq!(record.header().warcinfo_id().unwrap(), Some(warcinfo_id));
        assert_eq!(record.header().content_length(), content.len() as u64);

        for (name, value) in headers {
            assert_eq!(record.header().fields().get(name), Some(value.as_str()));
        }

        assert_eq!(&record.body().read_all().unwrap(), content);
    }

    assert!(reader.next_record().unwrap().is_none());
}

fn check_write_records(compress: bool) {
    let testset = testset();
    let mut writer = WarcWriter::new(Vec::new(), test_config(compress));

    for (content, headers) in &testset {
        writer
            .write_record("resource", content, Some(&extra_fields(headers)))
            .unwrap();
    }

    validate_archive(writer.into_inner(), compress, &testset);
}

#[test_log::test]
fn test_write_records() {
    check_write_records(false);
}

#[test_log::test]
fn test_write_records_gzip() {
    check_write_records(true);
}

fn check_write_chunked_records(compress: bool) {
    let testset = testset();
    let mut writer = WarcWriter::new(Vec::new(), test_config(compress));

    for (index, (content, headers)) in testset.iter().enumerate() {
        writer
            .start_record(
                "resource",
                content.len() as u64,
                Some(&extra_fields(headers)),
            )
            .unwrap();

        writer.write_body(b"").unwrap();

        // deliver the body in uneven chunks
        let mut offset = 0;
        let mut step = 1 + index * 7;

        while offset < content.len() {
            let end = (offset + step).min(content.len());
            writer.write_body(&content[offset..end]).unwrap();
            offset = end;
            step = step * 3 + 1;
        }

        writer.write_body(b"").unwrap();
    }

    validate_archive(writer.into_inner(), compress, &testset);
}

#[test_log::test]
fn test_write_chunked_records() {
    check_write_chunked_records(false);
}

#[test_log::test]
fn test_write_chunked_records_gzip() {
    check_write_chunked_records(true);
}

fn check_overflow_keeps_archive_parsable(compress: bool) {
    let mut writer = WarcWriter::new(Vec::new(), test_config(compress));

    assert!(matches!(
        writer.write_body(b"rtdffg"),
        Err(WarcError::CurrentBlockOverflow { .. })
    ));

    writer.start_record("test", 10, None).unwrap();
    writer.write_body(b"12345").unwrap();

    assert!(matches!(
        writer.write_body(b"123456"),
        Err(WarcError::CurrentBlockOverflow { .. })
    ));
    assert!(matches!(
        writer.start_record("test", 10, None),
        Err(WarcError::PreviousBlockNotTerminated { .. })
    ));
    assert!(matches!(
        writer.write_record("test", b"bonsoir", None),
        Err(WarcError::PreviousBlockNotTerminated { .. })
    ));

    writer.write_body(b"12345").unwrap();

    let bytes = writer.into_inner();
    let mut reader = WarcReader::new(SeekStream::new(Cursor::new(bytes)), compress);

    let _warcinfo = reader.next_record().unwrap().unwrap();
    let mut record = reader.next_record().unwrap().unwrap();

    assert_eq!(record.header().fields().get("WARC-Type"), Some("test"));
    assert_eq!(record.body().read_all().unwrap(), b"1234512345");
    assert!(reader.next_record().unwrap().is_none());
}

#[test_log::test]
fn test_overflow_keeps_archive_parsable() {
    check_overflow_keeps_archive_parsable(false);
}

#[test_log::test]
fn test_overflow_keeps_archive_parsable_gzip() {
    check_overflow_keeps_archive_parsable(true);
}

#[test_log::test]
fn test_truncate() {
    let temp_dir = TempDir::new("warckit").unwrap();
    let path = temp_dir.path().join("truncate_test.warc");

    let mut writer = WarcWriter::create(&path, true, test_config(false)).unwrap();
    writer.write_record("yrhdfdf", b"ryhtgdfdf", None).unwrap();
    writer.write_record("yrhdfdf", b"ryhtgdfdf", None).unwrap();
    writer.write_record("yrhdfdf", b"ryhtgdfdf", None).unwrap();
    let before_truncate = writer.position();
    drop(writer);

    let mut writer = WarcWriter::create(&path, true, test_config(false)).unwrap();
    writer.write_record("yrhdfdf", b"ryhtgdfdf", None).unwrap();
    let after_truncate = writer.position();
    drop(writer);

    assert!(after_truncate <= before_truncate, "writer didn't truncate");

    let mut writer = WarcWriter::create(&path, false, test_config(false)).unwrap();
    writer.write_record("yrhdfdf", b"ryhtgdfdf", None).unwrap();
    let after_append = writer.position();
    drop(writer);

    assert!(after_append >= after_truncate, "writer didn't append");

    // still a valid file after appending; both segments parse end-to-end
    let mut reader = WarcReader::open(&path, false).unwrap();
    let mut count = 0;

    for record in &mut reader {
        record.unwrap();
        count += 1;
    }

    assert_eq!(count, 4);
}

#[test_log::test]
fn test_appended_segment_gets_new_warcinfo() {
    let temp_dir = TempDir::new("warckit").unwrap();
    let path = temp_dir.path().join("segments.warc");

    let mut writer = WarcWriter::create(&path, true, test_config(false)).unwrap();
    writer.write_record("resource", b"one", None).unwrap();
    let first_info = *writer.warcinfo_id().unwrap();
    drop(writer);

    let mut writer = WarcWriter::create(&path, false, test_config(false)).unwrap();
    writer.write_record("resource", b"two", None).unwrap();
    let second_info = *writer.warcinfo_id().unwrap();
    drop(writer);

    assert_ne!(first_info, second_info);

    let mut reader = WarcReader::open(&path, false).unwrap();

    let types = std::iter::from_fn(|| reader.next_record().unwrap())
        .map(|record| record.header().record_type().unwrap())
        .collect::<Vec<RecordType>>();

    assert_eq!(
        types,
        vec![
            RecordType::Warcinfo,
            RecordType::Resource,
            RecordType::Warcinfo,
            RecordType::Resource
        ]
    );
}
