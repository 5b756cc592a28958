//! Parse delegated extended stats
use std::fmt::Display;
use std::fs;
use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;


//------------ Registry -----------------------------------------------------

/// The registry that published a record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Registry {
    Iana,
    Afrinic,
    Apnic,
    Arin,
    Lacnic,
    RipeNcc,
    Other
}

impl From<&str> for Registry {
    fn from(s: &str) -> Self {
        match s {
            "iana"    => Registry::Iana,
            "afrinic" => Registry::Afrinic,
            "apnic"   => Registry::Apnic,
            "arin"    => Registry::Arin,
            "lacnic"  => Registry::Lacnic,
            "ripencc" => Registry::RipeNcc,
            _         => Registry::Other
        }
    }
}


//------------ RecordType ---------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordType {
    Asn,
    Ipv4,
    Ipv6,
    Other
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match s {
            "asn"  => RecordType::Asn,
            "ipv4" => RecordType::Ipv4,
            "ipv6" => RecordType::Ipv6,
            _      => RecordType::Other
        }
    }
}


//------------ DelegationStatus ---------------------------------------------

/// The status column, matched case-insensitively.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DelegationStatus {
    Allocated,
    Assigned,
    Available,
    Reserved,
    Other
}

impl From<&str> for DelegationStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "allocated" => DelegationStatus::Allocated,
            "assigned"  => DelegationStatus::Assigned,
            "available" => DelegationStatus::Available,
            "reserved"  => DelegationStatus::Reserved,
            _           => DelegationStatus::Other
        }
    }
}


//------------ DelegationDate -----------------------------------------------

/// The date of a delegation in its 8 digit YYYYMMDD form.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DelegationDate(String);

impl DelegationDate {
    pub fn year(&self) -> &str { &self.0[..4] }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl FromStr for DelegationDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(DelegationDate(s.to_string()))
        } else {
            Err(Error::parse_error(format!("invalid date: {}", s)))
        }
    }
}


//------------ DelegationRecord ---------------------------------------------

/// One line of a delegated extended stats file.
#[derive(Clone, Debug)]
pub struct DelegationRecord {
    registry: Registry,
    country: String,
    record_type: RecordType,
    start: String,
    count: u64,
    date: DelegationDate,
    status: DelegationStatus
}

impl DelegationRecord {
    pub fn registry(&self) -> Registry { self.registry }
    pub fn country(&self) -> &str { &self.country }
    pub fn record_type(&self) -> RecordType { self.record_type }
    pub fn start(&self) -> &str { &self.start }
    pub fn count(&self) -> u64 { self.count }
    pub fn date(&self) -> &DelegationDate { &self.date }
    pub fn status(&self) -> DelegationStatus { self.status }
}

impl FromStr for DelegationRecord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = s.split('|');

        let registry_str = values.next().ok_or(Error::MissingColumn)?;
        let country_str = values.next().ok_or(Error::MissingColumn)?;
        let type_str = values.next().ok_or(Error::MissingColumn)?;
        let start_str = values.next().ok_or(Error::MissingColumn)?;
        let count_str = values.next().ok_or(Error::MissingColumn)?;
        let date_str = values.next().ok_or(Error::MissingColumn)?;
        let status_str = values.next().ok_or(Error::MissingColumn)?;
        // Trailing columns, such as the opaque id of the extended
        // format, are ignored.

        let registry = Registry::from(registry_str);
        let country = country_str.to_string();
        let record_type = RecordType::from(type_str);
        let start = start_str.to_string();
        let count = u64::from_str(count_str)?;
        let date = DelegationDate::from_str(date_str)?;
        let status = DelegationStatus::from(status_str);

        Ok(DelegationRecord {
            registry, country, record_type, start, count, date, status
        })
    }
}


//------------ RecordFilter -------------------------------------------------

/// Selects the delegation records that count towards a report.
///
/// The country code must match exactly, the status one of an accepted
/// set.
#[derive(Clone, Debug)]
pub struct RecordFilter {
    record_type: RecordType,
    country: String,
    statuses: Vec<DelegationStatus>
}

impl RecordFilter {
    /// The canonical filter: ASN records allocated or assigned to the
    /// given country.
    pub fn asn_for_country(country: &str) -> Self {
        RecordFilter {
            record_type: RecordType::Asn,
            country: country.to_string(),
            statuses: vec![
                DelegationStatus::Allocated,
                DelegationStatus::Assigned
            ]
        }
    }

    pub fn matches(&self, record: &DelegationRecord) -> bool {
        record.record_type() == self.record_type
            && record.country() == self.country
            && self.statuses.contains(&record.status())
    }
}


//------------ Delegations --------------------------------------------------

/// All records found in one delegated extended stats file.
#[derive(Clone, Debug)]
pub struct Delegations {
    records: Vec<DelegationRecord>,
    dropped: usize
}

impl Delegations {
    /// Scans the full text of a delegated extended stats file.
    ///
    /// Empty lines and `#` comments are skipped. Lines that do not form
    /// a complete record, including the version and summary headers, are
    /// dropped without error. Parsing the file is best effort by policy.
    pub fn from_text(text: &str) -> Self {
        let mut records = vec![];
        let mut dropped = 0;

        for line in text.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue
            }
            match DelegationRecord::from_str(line) {
                Ok(record) => records.push(record),
                Err(_) => dropped += 1
            }
        }

        if dropped > 0 {
            debug!("dropped {} lines without a parseable record", dropped);
        }

        Delegations { records, dropped }
    }

    pub fn from_file(path: &PathBuf) -> Result<Self, Error> {
        let text = fs::read_to_string(path)
            .map_err(|_| Error::read_error(path))?;
        Ok(Self::from_text(&text))
    }

    pub fn records(&self) -> &[DelegationRecord] {
        &self.records
    }

    /// The number of non-comment lines that did not yield a record.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "Cannot read file: {}", _0)]
    CannotRead(String),

    #[display(fmt = "Missing column in delegated-extended")]
    MissingColumn,

    #[display(fmt = "Error parsing delegated-extended: {}", _0)]
    ParseError(String),
}

impl Error {
    fn read_error(path: &PathBuf) -> Self {
        Error::CannotRead(path.to_string_lossy().to_string())
    }
    fn parse_error(e: impl Display) -> Self {
        Error::ParseError(format!("{}", e))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self { Self::parse_error(e) }
}

impl From<ParseIntError> for Error {
    fn from(e: ParseIntError) -> Self { Self::parse_error(e) }
}

//------------ Tests --------------------------------------------------------
