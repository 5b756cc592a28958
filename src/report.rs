//! Reporting of yearly ASN delegation totals
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use clap::ArgMatches;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use crate::delegations;
use crate::delegations::Delegations;
use crate::delegations::RecordFilter;
use crate::fetch;


/// The delegated extended stats published by the RIPE NCC.
pub const DEFAULT_URL: &str =
    "https://ftp.ripe.net/pub/stats/ripencc/delegated-ripencc-extended-latest";

const DEFAULT_COUNTRY: &str = "RU";


//------------ AnnualStats --------------------------------------------------

/// Yearly and cumulative delegation totals in ascending year order.
///
/// The three sequences align index for index, shaped for a labelled
/// line chart. Serializes to the parallel array form the chart expects.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualStats {
    years: Vec<String>,
    per_year: Vec<u64>,
    cumulative: Vec<u64>,
    total: u64
}

impl AnnualStats {
    /// Folds all matching records into per year totals.
    ///
    /// Records are grouped by their exact date first, so rows sharing a
    /// date merge and the input line order is irrelevant. An input with
    /// no matching records yields empty sequences and a total of 0.
    pub fn compute(delegations: &Delegations, filter: &RecordFilter) -> Self {
        let mut per_date: HashMap<&str, u64> = HashMap::new();

        for record in delegations.records() {
            if !filter.matches(record) {
                continue
            }
            *per_date.entry(record.date().as_str()).or_insert(0) +=
                record.count();
        }

        let mut per_year_map: HashMap<&str, u64> = HashMap::new();
        for (&date, &count) in per_date.iter() {
            *per_year_map.entry(&date[..4]).or_insert(0) += count;
        }

        let mut years: Vec<String> = per_year_map.keys()
            .map(|year| year.to_string())
            .collect();
        years.sort();

        let mut per_year = Vec::with_capacity(years.len());
        let mut cumulative = Vec::with_capacity(years.len());
        let mut total = 0;

        for year in &years {
            let count = per_year_map[year.as_str()];
            total += count;
            per_year.push(count);
            cumulative.push(total);
        }

        AnnualStats { years, per_year, cumulative, total }
    }

    pub fn from_text(text: &str, filter: &RecordFilter) -> Self {
        Self::compute(&Delegations::from_text(text), filter)
    }

    pub fn years(&self) -> &[String] { &self.years }
    pub fn per_year(&self) -> &[u64] { &self.per_year }
    pub fn cumulative(&self) -> &[u64] { &self.cumulative }
    pub fn total(&self) -> u64 { self.total }
}

impl fmt::Display for AnnualStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{:>4}  {:>10}  {:>10}", "Year", "Delegated", "Total")?;
        for (i, year) in self.years.iter().enumerate() {
            writeln!(
                f, "{:>4}  {:>10}  {:>10}",
                year, self.per_year[i], self.cumulative[i]
            )?;
        }
        writeln!(f)?;
        write!(f, "Total delegated: {}", self.total)
    }
}


//------------ AnnualStatsOpts ----------------------------------------------

/// Where to find the delegated stats.
pub enum Source {
    Url(String),
    File(PathBuf)
}

/// Options for the annual delegation report.
pub struct AnnualStatsOpts {
    source: Source,
    country: String,
    format: AnnualStatsFormat
}

impl AnnualStatsOpts {
    pub fn parse(matches: &ArgMatches) -> Result<Self, Error> {
        let source = if let Some(file) = matches.value_of("file") {
            Source::File(PathBuf::from(file))
        } else if let Some(url) = matches.value_of("url") {
            Source::Url(url.to_string())
        } else {
            Source::Url(DEFAULT_URL.to_string())
        };

        let country = matches.value_of("country")
            .unwrap_or(DEFAULT_COUNTRY)
            .to_string();

        let format = {
            if let Some(format) = matches.value_of("format") {
                match format {
                    "json" => AnnualStatsFormat::Json,
                    "html" => AnnualStatsFormat::Html,
                    "text" => AnnualStatsFormat::Text,
                    f => return Err(Error::WithMessage(
                        format!("Unsupported format: {}. \
                                 Supported are: json|html|text", f)))
                }
            } else {
                AnnualStatsFormat::Json
            }
        };

        Ok(AnnualStatsOpts { source, country, format })
    }
}


//------------ AnnualStatsFormat --------------------------------------------

/// Output format. The HTML uses the template in ['templates/chart.html'].
pub enum AnnualStatsFormat {
    Json,
    Html,
    Text
}


//------------ AnnualStatsReport --------------------------------------------

/// Reports how many ASNs were delegated to one country per year, and
/// cumulatively over the years. Can export to json, text, or an HTML
/// page with a line chart.
pub struct AnnualStatsReport;

impl AnnualStatsReport {

    pub async fn execute(options: &AnnualStatsOpts) -> Result<(), Error> {
        let delegations = match &options.source {
            Source::File(path) => Delegations::from_file(path)?,
            Source::Url(url) => {
                let text = fetch_with_bar(url).await?;
                Delegations::from_text(&text)
            }
        };

        let filter = RecordFilter::asn_for_country(&options.country);
        let stats = AnnualStats::compute(&delegations, &filter);

        match options.format {
            AnnualStatsFormat::Json => Self::json(&stats)?,
            AnnualStatsFormat::Html => Self::html(&stats, &options.country)?,
            AnnualStatsFormat::Text => Self::text(&stats)
        }

        Ok(())
    }

    fn json(stats: &AnnualStats) -> Result<(), Error> {
        println!("{}", serde_json::to_string(stats)?);
        Ok(())
    }

    fn html(stats: &AnnualStats, country: &str) -> Result<(), Error> {
        let template = include_str!["../templates/chart.html"];

        let html = template.replace("***COUNTRY***", country);

        let html = html.replace(
            "***YEARS***",
            &serde_json::to_string(stats.years())?
        );

        let html = html.replace(
            "***PER_YEAR***",
            &serde_json::to_string(stats.per_year())?
        );

        let html = html.replace(
            "***CUMULATIVE***",
            &serde_json::to_string(stats.cumulative())?
        );

        let html = html.replace("***TOTAL***", &stats.total().to_string());

        println!("{}", html);
        Ok(())
    }

    fn text(stats: &AnnualStats) {
        println!("{}", stats);
    }

}


//------------ FetchOpts ----------------------------------------------------

/// Options for saving a local copy of the delegated stats.
pub struct FetchOpts {
    url: String,
    out: PathBuf
}

impl FetchOpts {
    pub fn parse(matches: &ArgMatches) -> Result<Self, Error> {
        let url = matches.value_of("url")
            .unwrap_or(DEFAULT_URL)
            .to_string();

        let out_file = matches.value_of("out").unwrap();
        let out = PathBuf::from(out_file);

        Ok(FetchOpts { url, out })
    }
}


//------------ FetchReport --------------------------------------------------

/// Saves a local copy of the delegated stats, so that repeated reports
/// can run against `--file` instead of downloading again.
pub struct FetchReport;

impl FetchReport {

    pub async fn execute(options: &FetchOpts) -> Result<(), Error> {
        let text = fetch_with_bar(&options.url).await?;
        fs::write(&options.out, &text)?;

        println!(
            "Saved {} bytes to {}",
            text.len(), options.out.to_string_lossy()
        );
        Ok(())
    }
}


//------------ fetch_with_bar -----------------------------------------------

/// Streams the resource down while a progress bar follows the reported
/// percentages.
async fn fetch_with_bar(url: &str) -> Result<String, Error> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{wide_bar}] {pos}%")
            .expect("Invalid progress bar template")
            .progress_chars("#>-")
    );
    bar.set_message("Downloading");

    let text = fetch::fetch_text(url, |percent| {
        bar.set_position(u64::from(percent))
    }).await?;

    bar.finish_and_clear();
    Ok(text)
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    WithMessage(String),

    #[display(fmt = "{}", _0)]
    DelegationsError(delegations::Error),

    #[display(fmt = "{}", _0)]
    FetchError(fetch::Error),

    #[display(fmt = "{}", _0)]
    IoError(io::Error),

    #[display(fmt = "{}", _0)]
    JsonError(serde_json::Error),
}

impl Error {
    pub fn msg(s: &str) -> Self {
        Error::WithMessage(s.to_string())
    }
}

impl From<delegations::Error> for Error {
    fn from(e: delegations::Error) -> Self { Error::DelegationsError(e) }
}

impl From<fetch::Error> for Error {
    fn from(e: fetch::Error) -> Self { Error::FetchError(e) }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self { Error::IoError(e) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self { Error::JsonError(e) }
}

//------------ Tests --------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "\
#comment\n\
ripencc|RU|asn|1000|10|20010105|allocated|id1\n\
ripencc|US|asn|2000|99|20010105|allocated|id2\n\
ripencc|RU|asn|1001|5|20020630|assigned|id3\n\
ripencc|RU|ipv4|3.0.0.0|256|20020101|allocated|id4\n";

    fn ru_asn() -> RecordFilter {
        RecordFilter::asn_for_country("RU")
    }

    #[test]
    fn should_compute_example_stats() {
        let stats = AnnualStats::from_text(EXAMPLE, &ru_asn());

        assert_eq!(&["2001".to_string(), "2002".to_string()], stats.years());
        assert_eq!(&[10, 5], stats.per_year());
        assert_eq!(&[10, 15], stats.cumulative());
        assert_eq!(15, stats.total());
    }

    #[test]
    fn should_not_depend_on_line_order() {
        let reversed: Vec<&str> = EXAMPLE.lines().rev().collect();
        let reversed = reversed.join("\n");

        assert_eq!(
            AnnualStats::from_text(EXAMPLE, &ru_asn()),
            AnnualStats::from_text(&reversed, &ru_asn())
        );
    }

    #[test]
    fn should_be_idempotent() {
        assert_eq!(
            AnnualStats::from_text(EXAMPLE, &ru_asn()),
            AnnualStats::from_text(EXAMPLE, &ru_asn())
        );
    }

    #[test]
    fn should_merge_records_sharing_a_date() {
        let text = "\
ripencc|RU|asn|1000|5|20050101|allocated\n\
ripencc|RU|asn|2000|7|20050101|allocated\n";

        let stats = AnnualStats::from_text(text, &ru_asn());
        assert_eq!(&["2005".to_string()], stats.years());
        assert_eq!(&[12], stats.per_year());
        assert_eq!(12, stats.total());
    }

    #[test]
    fn should_yield_empty_stats_for_empty_input() {
        let stats = AnnualStats::from_text("", &ru_asn());
        assert!(stats.years().is_empty());
        assert!(stats.per_year().is_empty());
        assert!(stats.cumulative().is_empty());
        assert_eq!(0, stats.total());

        let stats = AnnualStats::from_text("#only a comment\n", &ru_asn());
        assert_eq!(0, stats.total());
    }

    #[test]
    fn should_tolerate_malformed_lines() {
        let text = "\
ripencc|RU|asn\n\
ripencc|RU|asn|1000|10|20010105|allocated\n";

        let stats = AnnualStats::from_text(text, &ru_asn());
        assert_eq!(10, stats.total());
    }

    #[test]
    fn should_accept_crlf_line_endings() {
        let text = "\
ripencc|RU|asn|1000|10|20010105|allocated\r\n\
ripencc|RU|asn|1001|5|20020630|assigned\r\n";

        let stats = AnnualStats::from_text(text, &ru_asn());
        assert_eq!(&[10, 5], stats.per_year());
    }

    #[test]
    fn should_accumulate_prefix_sums() {
        let text = "\
ripencc|RU|asn|1000|3|19950101|allocated\n\
ripencc|RU|asn|1001|4|19970601|assigned\n\
ripencc|RU|asn|1002|2|19970915|allocated\n\
ripencc|RU|asn|1003|1|20040330|assigned\n";

        let stats = AnnualStats::from_text(text, &ru_asn());

        let mut sum = 0;
        for (i, count) in stats.per_year().iter().enumerate() {
            sum += count;
            assert_eq!(sum, stats.cumulative()[i]);
        }
        assert_eq!(sum, stats.total());

        for years in stats.years().windows(2) {
            assert!(years[0] < years[1]);
        }
    }

    #[test]
    fn should_serialize_parallel_arrays() {
        let stats = AnnualStats::from_text(EXAMPLE, &ru_asn());
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["years"][0], "2001");
        assert_eq!(json["perYear"][1], 5);
        assert_eq!(json["cumulative"][1], 15);
        assert_eq!(json["total"], 15);
    }

    #[test]
    fn should_compute_stats_from_test_file() {
        let path = PathBuf::from(
            "test/20181030/delegated-ripencc-extended.txt"
        );
        let delegations = Delegations::from_file(&path).unwrap();
        let stats = AnnualStats::compute(&delegations, &ru_asn());

        assert_eq!(&["1993".to_string(), "1994".to_string(),
                     "2002".to_string()], stats.years());
        assert_eq!(&[2, 3, 4], stats.per_year());
        assert_eq!(&[2, 5, 9], stats.cumulative());
        assert_eq!(9, stats.total());
    }
}
