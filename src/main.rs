#[macro_use] extern crate derive_more;

use clap::App;
use clap::Arg;
use clap::SubCommand;
use asn_delegation_stats::report;
use asn_delegation_stats::report::AnnualStatsOpts;
use asn_delegation_stats::report::AnnualStatsReport;
use asn_delegation_stats::report::FetchOpts;
use asn_delegation_stats::report::FetchReport;


#[tokio::main]
async fn main() {
    env_logger::init();

    match Options::create() {
        Err(e) => {
            eprintln!("{}", e);
            ::std::process::exit(1);
        },
        Ok(option) => {
            let res = match option {
                Options::Annual(opts) => {
                    AnnualStatsReport::execute(&opts).await
                        .map_err(Error::ReportError)
                }
                Options::Fetch(opts) => {
                    FetchReport::execute(&opts).await
                        .map_err(Error::ReportError)
                }
            };
            match res {
                Ok(()) => {},
                Err(e) => {
                    eprintln!("{}", e);
                    ::std::process::exit(1);
                }
            }
        }
    }
}

enum Options {
    Annual(AnnualStatsOpts),
    Fetch(FetchOpts)
}

impl Options {
    pub fn create() -> Result<Self, Error> {
        let matches = App::new("ASN delegation stats")
            .version("0.1.0")
            .subcommand(SubCommand::with_name("annual")
                .about("Report yearly ASN delegation totals for a country")
                .arg(Arg::with_name("url")
                    .short("u")
                    .long("url")
                    .value_name("URL")
                    .help("Delegated extended stats URL. \
                           Defaults to the RIPE NCC file.")
                    .required(false))
                .arg(Arg::with_name("file")
                    .short("d")
                    .long("file")
                    .value_name("FILE")
                    .help("Local delegated extended stats file. \
                           Takes precedence over --url.")
                    .required(false))
                .arg(Arg::with_name("country")
                    .short("c")
                    .long("country")
                    .value_name("CC")
                    .help("Country code to report on. Defaults to RU.")
                    .required(false))
                .arg(Arg::with_name("format")
                    .short("f")
                    .long("format")
                    .value_name("json | html | text")
                    .help("Specify output format, defaults to json")
                    .required(false))
            )
            .subcommand(SubCommand::with_name("fetch")
                .about("Save a local copy of the delegated extended stats")
                .arg(Arg::with_name("url")
                    .short("u")
                    .long("url")
                    .value_name("URL")
                    .help("Delegated extended stats URL. \
                           Defaults to the RIPE NCC file.")
                    .required(false))
                .arg(Arg::with_name("out")
                    .short("o")
                    .long("out")
                    .value_name("FILE")
                    .help("Where to save the file.")
                    .required(true))
            )
            .get_matches();

        if let Some(opts) = matches.subcommand_matches("annual") {
            Ok(Options::Annual(AnnualStatsOpts::parse(opts)?))
        } else if let Some(opts) = matches.subcommand_matches("fetch") {
            Ok(Options::Fetch(FetchOpts::parse(opts)?))
        } else {
            Err(Error::msg("No sub-command given. See --help for options."))
        }
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    WithMessage(String),

    #[display(fmt="{}", _0)]
    ReportError(report::Error),
}

impl Error {
    pub fn msg(s: &str) -> Self {
        Error::WithMessage(s.to_string())
    }
}

impl From<report::Error> for Error {
    fn from(e: report::Error) -> Self { Error::ReportError(e) }
}
