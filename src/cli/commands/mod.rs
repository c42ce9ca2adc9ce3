use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

/// Pure clap command definitions with zero business logic
#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("host")
                .help("Host name or IP address to inspect")
                .num_args(1..)
                .required(true)
                .value_name("HOST"),
        )
        .arg(
            Arg::new("port")
                .env("CERTVIEW_PORT")
                .help("Port to connect to (default: 443 https, 465 smtps, 587 starttls)")
                .long("port")
                .short('p')
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new("mode")
                .default_value("https")
                .env("CERTVIEW_MODE")
                .help("How TLS is reached: https, smtps, starttls")
                .long("mode")
                .long_help(
                    "How TLS is reached on the remote endpoint:\n\n\
                    - https: handshake immediately after connecting (default)\n\
                    - smtps: implicit TLS SMTP, handshake immediately after connecting\n\
                    - starttls: plain SMTP upgraded with HELO/STARTTLS before the handshake",
                )
                .short('m')
                .value_name("MODE"),
        )
        .arg(
            Arg::new("connect-timeout")
                .default_value("10")
                .env("CERTVIEW_CONNECT_TIMEOUT")
                .help("Seconds allowed for name resolution and each TCP connect")
                .long("connect-timeout")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("io-timeout")
                .default_value("10")
                .env("CERTVIEW_IO_TIMEOUT")
                .help("Seconds allowed for each plain-text read or write")
                .long("io-timeout")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("handshake-timeout")
                .default_value("10")
                .env("CERTVIEW_HANDSHAKE_TIMEOUT")
                .help("Seconds allowed for the TLS handshake")
                .long("handshake-timeout")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("ca")
                .env("CERTVIEW_CA")
                .help("PEM bundle of additional trusted root certificates")
                .long("ca")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("verbose")
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count),
        )
}
