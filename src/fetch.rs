//! Retrieve the delegated stats over HTTP, streaming the body and
//! reporting download progress.
use std::char;
use std::fmt::Display;
use std::str;


//------------ Progress -----------------------------------------------------

/// Tracks received bytes against the declared length of a transfer and
/// decides which percentages to report.
///
/// When a length was declared, a percentage is due after every chunk.
/// When it was not, nothing is reported while the transfer runs and a
/// single 100 is due once it is done.
#[derive(Clone, Debug)]
pub struct Progress {
    received: u64,
    total: u64
}

impl Progress {
    /// Creates state for a transfer of `total` bytes, 0 meaning the
    /// length was not declared.
    pub fn new(total: u64) -> Self {
        Progress { received: 0, total }
    }

    /// Records a chunk of `len` bytes. Returns the percentage to
    /// report, if one is due.
    pub fn chunk(&mut self, len: u64) -> Option<u32> {
        self.received += len;
        if self.total > 0 {
            Some((self.received as f64 * 100. / self.total as f64).round()
                as u32)
        } else {
            None
        }
    }

    /// Marks the transfer complete. Returns the final percentage to
    /// report for a transfer of undeclared length.
    pub fn done(&self) -> Option<u32> {
        if self.total == 0 {
            Some(100)
        } else {
            None
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}


//------------ Utf8Decoder --------------------------------------------------

/// Decodes a byte stream into text chunk by chunk.
///
/// A multi byte character split across two chunks is held back until
/// its remaining bytes arrive. Invalid sequences decode to the
/// replacement character.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Utf8Decoder::default()
    }

    /// Decodes the next chunk, appending the text to `out`.
    pub fn decode(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        loop {
            match str::from_utf8(&self.pending[start..]) {
                Ok(s) => {
                    out.push_str(s);
                    start = self.pending.len();
                    break
                }
                Err(e) => {
                    let valid = start + e.valid_up_to();
                    if let Ok(s) = str::from_utf8(&self.pending[start..valid]) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        Some(skip) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid + skip;
                        }
                        None => {
                            // Incomplete sequence at the end of the
                            // chunk. Held back for the next call.
                            start = valid;
                            break
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
    }

    /// Flushes the decoder. An incomplete trailing sequence decodes to
    /// the replacement character.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push(char::REPLACEMENT_CHARACTER);
            self.pending.clear();
        }
    }
}


//------------ fetch_text ---------------------------------------------------

/// Performs an HTTP GET for `url` and streams the response body into a
/// `String`.
///
/// The callback is invoked with a completion percentage, 0 to 100, as
/// the transfer progresses: after every chunk when the response
/// declared a content length, or exactly once with 100 at the end when
/// it did not.
///
/// A response with a non success status is an error carrying the status
/// code; the body is not read in that case. A connection that fails or
/// is closed mid transfer, by the peer or by the caller, is an error as
/// well. The transfer cannot be resumed; retry means a fresh call.
pub async fn fetch_text<F>(
    url: &str,
    mut on_progress: F
) -> Result<String, Error>
where F: FnMut(u32) {
    let client = reqwest::Client::new();
    let response = client.get(url).send().await
        .map_err(|e| Error::transport(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::BadStatus(status.as_u16()))
    }

    let total = response.content_length().unwrap_or(0);
    if total > 0 {
        info!("GET {}: expecting {} bytes", url, total);
    } else {
        info!("GET {}: length not declared", url);
    }

    let mut progress = Progress::new(total);
    let mut decoder = Utf8Decoder::new();
    let mut text = String::new();

    let mut response = response;
    while let Some(chunk) = response.chunk().await
        .map_err(|e| Error::transport(url, e))?
    {
        decoder.decode(&chunk, &mut text);
        if let Some(percent) = progress.chunk(chunk.len() as u64) {
            on_progress(percent);
        }
    }

    decoder.finish(&mut text);
    if let Some(percent) = progress.done() {
        on_progress(percent);
    }

    debug!("received {} bytes from {}", progress.received(), url);

    Ok(text)
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "HTTP {}", _0)]
    BadStatus(u16),

    #[display(fmt = "Cannot retrieve {}: {}", _0, _1)]
    Transport(String, String),
}

impl Error {
    fn transport(url: &str, e: impl Display) -> Self {
        Error::Transport(url.to_string(), format!("{}", e))
    }
}

//------------ Tests --------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wiremock::matchers::{method, path};

    #[test]
    fn should_report_percentage_per_chunk() {
        let mut progress = Progress::new(100);
        assert_eq!(Some(40), progress.chunk(40));
        assert_eq!(Some(80), progress.chunk(40));
        assert_eq!(Some(100), progress.chunk(20));
        assert_eq!(None, progress.done());
    }

    #[test]
    fn should_round_percentage() {
        let mut progress = Progress::new(3);
        assert_eq!(Some(33), progress.chunk(1));
        assert_eq!(Some(67), progress.chunk(1));
        assert_eq!(Some(100), progress.chunk(1));
    }

    #[test]
    fn should_report_once_for_undeclared_length() {
        let mut progress = Progress::new(0);
        assert_eq!(None, progress.chunk(1024));
        assert_eq!(None, progress.chunk(512));
        assert_eq!(Some(100), progress.done());
    }

    #[test]
    fn should_decode_character_split_across_chunks() {
        let bytes = "реестр".as_bytes();

        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode(&bytes[..3], &mut out);
        decoder.decode(&bytes[3..], &mut out);
        decoder.finish(&mut out);

        assert_eq!("реестр", out);
    }

    #[test]
    fn should_decode_four_byte_character_in_single_bytes() {
        let bytes = "a\u{1F310}b".as_bytes();

        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for byte in bytes {
            decoder.decode(&[*byte], &mut out);
        }
        decoder.finish(&mut out);

        assert_eq!("a\u{1F310}b", out);
    }

    #[test]
    fn should_replace_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode(b"ab\xffcd", &mut out);
        decoder.finish(&mut out);

        assert_eq!("ab\u{FFFD}cd", out);
    }

    #[test]
    fn should_replace_truncated_trailing_sequence() {
        let bytes = "д".as_bytes();

        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode(&bytes[..1], &mut out);
        decoder.finish(&mut out);

        assert_eq!("\u{FFFD}", out);
    }

    #[tokio::test]
    async fn should_fetch_full_body() {
        let body = "ripencc|RU|asn|2148|1|19931230|allocated\n";

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/delegated"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let url = format!("{}/delegated", server.uri());
        let mut seen = Vec::new();
        let text = fetch_text(&url, |percent| seen.push(percent))
            .await
            .unwrap();

        assert_eq!(body, text);
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(Some(&100), seen.last());
    }

    #[tokio::test]
    async fn should_fail_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/delegated"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/delegated", server.uri());
        let res = fetch_text(&url, |_| ()).await;

        match res {
            Err(Error::BadStatus(404)) => {}
            other => panic!("expected HTTP 404 error, got {:?}", other)
        }
    }

    #[tokio::test]
    async fn should_fail_on_unreachable_host() {
        // Nothing listens on this address.
        let res = fetch_text("http://127.0.0.1:1/delegated", |_| ()).await;
        assert!(matches!(res, Err(Error::Transport(_, _))));
    }
}
