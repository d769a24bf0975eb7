mod args;
mod argutil;
mod logging;
mod warc;

fn main() {
    let exit_code = main_inner();
    std::process::exit(exit_code);
}

fn main_inner() -> i32 {
    let result = run();

    match result {
        Ok(_) => {
            tracing::info!("program exit ok");
            0
        }
        Err(error) => {
            let error_message_line = format!("{:#}", error);
            let backtrace = format!("{}", error.backtrace());
            tracing::error!(error = %error_message_line, %backtrace, "program exit error");
            eprintln!("Error: {error_message_line}");
            1
        }
    }
}

fn run() -> anyhow::Result<()> {
    let command = crate::args::root_command();
    let arg_matches = command.get_matches();

    crate::logging::set_up_logging(&arg_matches)?;

    match arg_matches.subcommand() {
        Some(("list", sub_matches)) => crate::warc::handle_list_command(sub_matches),
        Some(("dump", sub_matches)) => crate::warc::handle_dump_command(sub_matches),
        _ => unreachable!(),
    }
}
