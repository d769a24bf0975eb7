use std::io::{Read, Write};
use std::path::PathBuf;

use clap::ArgMatches;
use serde::Serialize;
use warckit::fields::FieldMap;
use warckit::stream::SourceStream;
use warckit::WarcReader;

use crate::argutil::OutputStream;

#[derive(Serialize)]
enum DumpElement<'a> {
    Header {
        version: &'a str,
        fields: &'a FieldMap,
    },
    Block {
        data: &'a [u8],
    },
    EndOfRecord,
}

fn input_args(sub_matches: &ArgMatches) -> (Vec<&PathBuf>, bool) {
    let inputs = sub_matches
        .get_many::<PathBuf>("input")
        .unwrap()
        .collect::<Vec<&PathBuf>>();
    let compressed = sub_matches
        .get_one::<bool>("compressed")
        .cloned()
        .unwrap_or_default();

    (inputs, compressed)
}

pub fn handle_list_command(sub_matches: &ArgMatches) -> anyhow::Result<()> {
    let (inputs, compressed) = input_args(sub_matches);
    let names = sub_matches
        .get_many::<String>("name")
        .unwrap()
        .collect::<Vec<&String>>();
    let mut output = OutputStream::open(sub_matches.get_one::<PathBuf>("output").unwrap())?;

    for path in inputs {
        tracing::info!(?path, "list file");

        let mut reader = WarcReader::open(path, compressed)?;
        list_records(&mut reader, &names, &mut output)?;
    }

    output.flush()?;

    Ok(())
}

fn list_records<S: SourceStream>(
    reader: &mut WarcReader<S>,
    names: &[&String],
    output: &mut OutputStream,
) -> anyhow::Result<()> {
    while let Some(record) = reader.next_record()? {
        let mut line_buffer = vec![record.header().offset().to_string()];

        for name in names {
            line_buffer.push(
                record
                    .header()
                    .fields()
                    .get(name.as_str())
                    .unwrap_or_default()
                    .to_string(),
            );
        }

        output.write_all(line_buffer.join("\t").as_bytes())?;
        output.write_all(b"\n")?;
    }

    Ok(())
}

pub fn handle_dump_command(sub_matches: &ArgMatches) -> anyhow::Result<()> {
    let (inputs, compressed) = input_args(sub_matches);
    let mut output = OutputStream::open(sub_matches.get_one::<PathBuf>("output").unwrap())?;

    for path in inputs {
        tracing::info!(?path, "dump file");

        let mut reader = WarcReader::open(path, compressed)?;
        dump_records(&mut reader, &mut output)?;
    }

    output.flush()?;

    Ok(())
}

fn dump_records<S: SourceStream>(
    reader: &mut WarcReader<S>,
    output: &mut OutputStream,
) -> anyhow::Result<()> {
    let mut buffer = vec![0u8; 16384];

    while let Some(mut record) = reader.next_record()? {
        let element = serde_json::to_string(&DumpElement::Header {
            version: record.header().version(),
            fields: record.header().fields(),
        })?;
        output.write_all(element.as_bytes())?;
        output.write_all(b"\n")?;

        loop {
            let amount = Read::read(record.body(), &mut buffer)?;

            if amount == 0 {
                break;
            }

            let element = serde_json::to_string(&DumpElement::Block {
                data: &buffer[0..amount],
            })?;
            output.write_all(element.as_bytes())?;
            output.write_all(b"\n")?;
        }

        let element = serde_json::to_string(&DumpElement::EndOfRecord)?;
        output.write_all(element.as_bytes())?;
        output.write_all(b"\n")?;
    }

    Ok(())
}
