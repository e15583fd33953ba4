use clap::arg;
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("jshunter")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("jshunter")
        .about("Find exposed API endpoints in JavaScript bundles and unguarded SPA routes")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(
            arg!(-u --"url" <URL>)
                .required(false)
                .help("The target URL to scan")
                .value_parser(clap::value_parser!(Url))
                .conflicts_with("file"),
        )
        .arg(
            arg!(-f --"file" <PATH>)
                .required(false)
                .help("Path to a newline-delimited file of target URLs")
                .value_parser(clap::value_parser!(String))
                .conflicts_with("url"),
        )
        .arg(
            arg!(-s --"scan-type" <TYPE>)
                .required(false)
                .help("What to scan for: exposed endpoints, unguarded routes, or both")
                .value_parser(["endpoints", "routes", "both"])
                .default_value("both"),
        )
        .arg(
            arg!(-t --"threads" <NUM_WORKERS>)
                .required(false)
                .help("The number of concurrent targets and requests in the endpoint scan")
                .value_parser(clap::value_parser!(usize))
                .default_value("30"),
        )
        .arg(
            arg!(--"tabs" <NUM_TABS>)
                .required(false)
                .help("The number of browser tabs open at once during the route scan")
                .value_parser(clap::value_parser!(usize))
                .default_value("10"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Timeout for each HTTP request")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            arg!(-p --"proxy" <PROXY>)
                .required(false)
                .help("Proxy for every HTTP request and the browser, e.g. http://127.0.0.1:8080"),
        )
        .arg(
            arg!(--"headless")
                .required(false)
                .help("Display the browser window while the route scan runs")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"ai" <SOURCE>)
                .required(false)
                .help("Generate endpoint candidates with an AI model (reads GEMINI_API_KEY)")
                .value_parser(["gemini", "none"])
                .default_value("none"),
        )
        .arg(
            arg!(--"ai-timeout" <SECONDS>)
                .required(false)
                .help("Timeout for each AI generation batch")
                .value_parser(clap::value_parser!(u64))
                .default_value("120"),
        )
        .arg(
            arg!(--"env" <PATH>)
                .required(false)
                .help("Dotenv file holding GEMINI_API_KEY and friends")
                .value_parser(clap::value_parser!(String))
                .default_value(".env"),
        )
        .arg(
            arg!(--"report-dir" <PATH>)
                .required(false)
                .help("Directory for markdown reports and screenshots")
                .value_parser(clap::value_parser!(String))
                .default_value("reports"),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("Also write every result to a JSON-lines file")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            arg!(--"debug")
                .required(false)
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
}
