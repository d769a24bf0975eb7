use clap::{Arg, ArgMatches, Command};
use tracing_subscriber::{prelude::*, EnvFilter};

pub fn logging_args(command: Command) -> Command {
    command.arg(
        Arg::new("log_filter")
            .long("log-filter")
            .short('l')
            .takes_value(true)
            .help("Filter level of severity and targets of logging messages.")
            .default_value("warn"),
    )
}

pub fn set_up_logging(arg_matches: &ArgMatches) -> anyhow::Result<()> {
    let filter = arg_matches.get_one::<String>("log_filter").unwrap();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_new(filter)?)
        .init();

    Ok(())
}
