use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

const LIST_ABOUT: &str = "Listing of file contents using header fields";
const DUMP_ABOUT: &str = "Transform WARC files to JSON formatted output";
const INPUT_WARC_FILE_HELP: &str = "Path to WARC file";
const OUTPUT_FILE_HELP: &str = "Path to output file";
const COMPRESSED_HELP: &str = "Treat the input as gzip member compressed";
const SHOW_FIELD_WITH_NAME_HELP: &str = "Show values with the given field name";

pub fn root_command() -> Command<'static> {
    let list_command = Command::new("list")
        .about(LIST_ABOUT)
        .arg(
            Arg::new("input")
                .required(true)
                .multiple_values(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help(INPUT_WARC_FILE_HELP),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .default_value("-")
                .value_parser(clap::value_parser!(PathBuf))
                .help(OUTPUT_FILE_HELP),
        )
        .arg(
            Arg::new("compressed")
                .long("compressed")
                .action(ArgAction::SetTrue)
                .help(COMPRESSED_HELP),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .takes_value(true)
                .action(ArgAction::Append)
                .default_values(&[
                    "WARC-Date",
                    "WARC-Type",
                    "Content-Type",
                    "Content-Length",
                    "WARC-Record-ID",
                ])
                .help(SHOW_FIELD_WITH_NAME_HELP),
        );

    let dump_command = Command::new("dump")
        .about(DUMP_ABOUT)
        .arg(
            Arg::new("input")
                .required(true)
                .multiple_values(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help(INPUT_WARC_FILE_HELP),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .default_value("-")
                .value_parser(clap::value_parser!(PathBuf))
                .help(OUTPUT_FILE_HELP),
        )
        .arg(
            Arg::new("compressed")
                .long("compressed")
                .action(ArgAction::SetTrue)
                .help(COMPRESSED_HELP),
        );

    let command = Command::new(clap::crate_name!())
        .about("Process WARC files")
        .version(clap::crate_version!())
        .subcommand_required(true)
        .subcommand(list_command)
        .subcommand(dump_command);

    crate::logging::logging_args(command)
}
