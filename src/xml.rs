//! Streaming scanner for compressed catalog dumps
//!
//! The dump is a multi-gigabyte XML document whose root holds one element per
//! catalog record. We never materialize the document: bytes are pulled into a
//! grow-and-drain buffer, one record element is carved out at a time, and the
//! buffer is drained as soon as the element has been parsed. Memory stays
//! bounded by one element plus refill slack.

use crate::cooccur::Record;
use crate::errors::{Error, Result};
use flate2::read::GzDecoder;
use nom::bytes::complete::{tag, take_until};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::IResult;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const REFILL: usize = 64 * 1024;
/// A single record element larger than this is treated as malformed.
const ELEMENT_LIMIT: usize = 16 << 20;

/// Open a gzipped dump and stream its record elements
pub fn open_dump(
    path: &Path,
    element: &str,
) -> Result<RecordStreamer<GzDecoder<BufReader<File>>>> {
    let file = File::open(path).map_err(|err| Error::MissingFile("compressed dump", Some(err)))?;
    Ok(RecordStreamer::new(
        GzDecoder::new(BufReader::new(file)),
        element,
    ))
}

/// Collapse every whitespace run into a single `_`.
///
/// Applied identically to style and genre text so the same logical tag always
/// maps to the same token regardless of source spacing.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Decode the entity references that show up in dump text content.
///
/// Anything unrecognized is kept verbatim rather than dropped, so a stray `&`
/// in tag text survives.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match rest.find(';') {
            // Entity names are short; a far-away semicolon means a bare ampersand
            Some(end) if end <= 10 => {
                let entity = &rest[1..end];
                let decoded = match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    _ => entity
                        .strip_prefix("#x")
                        .or_else(|| entity.strip_prefix("#X"))
                        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                        .or_else(|| {
                            entity.strip_prefix('#').and_then(|dec| dec.parse::<u32>().ok())
                        })
                        .and_then(char::from_u32),
                };
                match decoded {
                    Some(c) => {
                        out.push(c);
                        rest = &rest[end + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = &rest[1..];
                    }
                }
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Text of every `<open>…<close>` entry inside one list block
fn entries<'a>(block: &'a str, open: &'static str, close: &'static str) -> Vec<&'a str> {
    let entry = |input: &'a str| -> IResult<&'a str, &'a str> {
        preceded(
            take_until(open),
            delimited(tag(open), take_until(close), tag(close)),
        )(input)
    };
    many0(entry)(block)
        .map(|(_, found)| found)
        .unwrap_or_default()
}

/// The content between a list's opening and closing tags, if the list exists
fn list_block<'a>(
    chunk: &'a str,
    open: &'static str,
    close: &'static str,
) -> Result<Option<&'a str>> {
    match chunk.find(open) {
        None => Ok(None),
        Some(at) => {
            let rest = &chunk[at + open.len()..];
            match rest.find(close) {
                Some(end) => Ok(Some(&rest[..end])),
                None => Err(Error::Parse(format!("unterminated {} block", open))),
            }
        }
    }
}

fn tag_tokens(
    chunk: &str,
    block_open: &'static str,
    block_close: &'static str,
    open: &'static str,
    close: &'static str,
) -> Result<Vec<String>> {
    Ok(match list_block(chunk, block_open, block_close)? {
        Some(block) => entries(block, open, close)
            .into_iter()
            .filter(|text| !text.trim().is_empty())
            .map(|text| normalize(&unescape(text)))
            .collect(),
        None => Vec::new(),
    })
}

/// Extract one record's normalized style and genre tokens from its element text
fn parse_element(chunk: &str) -> Result<Record> {
    Ok(Record {
        styles: tag_tokens(chunk, "<styles>", "</styles>", "<style>", "</style>")?,
        genres: tag_tokens(chunk, "<genres>", "</genres>", "<genre>", "</genre>")?,
    })
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Lazy, single-pass iterator over a dump's record elements
///
/// `element` is the singular element name, e.g. `master` for a masters dump.
/// A structural parse failure yields one `Err` and terminates the stream.
pub struct RecordStreamer<R: Read> {
    reader: R,
    element: String,
    open: Vec<u8>,
    close: Vec<u8>,
    buf: Vec<u8>,
    eof: bool,
    failed: bool,
}

impl<R: Read> RecordStreamer<R> {
    pub fn new(reader: R, element: &str) -> Self {
        RecordStreamer {
            reader,
            element: element.to_string(),
            open: format!("<{}", element).into_bytes(),
            close: format!("</{}>", element).into_bytes(),
            buf: Vec::with_capacity(REFILL),
            eof: false,
            failed: false,
        }
    }

    /// An opening tag for our element, rejecting longer names that merely
    /// share the prefix (`<master` must not match `<masters>`).
    fn find_open(&self) -> Option<usize> {
        let mut from = 0;
        while let Some(at) = find_sub(&self.buf[from..], &self.open).map(|i| i + from) {
            match self.buf.get(at + self.open.len()) {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | Some(b'>') | Some(b'/') => {
                    return Some(at)
                }
                // Tag name continues; keep looking
                Some(_) => from = at + 1,
                // Tag cut off at the buffer edge; wait for more bytes
                None => return Some(at),
            }
        }
        None
    }

    fn refill(&mut self) -> io::Result<usize> {
        let mut scratch = [0u8; REFILL];
        loop {
            match self.reader.read(&mut scratch) {
                Ok(n) => {
                    self.buf.extend_from_slice(&scratch[..n]);
                    return Ok(n);
                }
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn fail(&mut self, err: Error) -> Option<Result<Record>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for RecordStreamer<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(start) = self.find_open() {
                // A self-closing element carries no child lists but is still
                // one record; without this check its missing closing tag
                // would fuse it with the following element
                if let Some(gt) = find_sub(&self.buf[start..], b">") {
                    if self.buf[start + gt - 1] == b'/' {
                        self.buf.drain(..start + gt + 1);
                        return Some(Ok(Record::default()));
                    }
                }
                if let Some(rel) = find_sub(&self.buf[start..], &self.close) {
                    let end = start + rel + self.close.len();
                    let chunk = String::from_utf8_lossy(&self.buf[start..end]).into_owned();
                    self.buf.drain(..end);
                    return match parse_element(&chunk) {
                        Ok(record) => Some(Ok(record)),
                        Err(err) => self.fail(err),
                    };
                }
                if self.buf.len() - start > ELEMENT_LIMIT {
                    let element = self.element.clone();
                    return self.fail(Error::Parse(format!(
                        "unterminated <{}> element over {} bytes",
                        element, ELEMENT_LIMIT
                    )));
                }
                // Drop whatever sits before the element we are waiting on
                if start > 0 {
                    self.buf.drain(..start);
                }
            } else {
                // No opening tag in sight: keep only a tail short enough to
                // still turn into one once more bytes arrive
                let keep = self.open.len().min(self.buf.len());
                let cut = self.buf.len() - keep;
                if cut > 0 {
                    self.buf.drain(..cut);
                }
            }

            if self.eof {
                if self.find_open().is_some() {
                    let element = self.element.clone();
                    return self.fail(Error::Parse(format!(
                        "stream ended inside a <{}> element",
                        element
                    )));
                }
                return None;
            }
            match self.refill() {
                Ok(0) => self.eof = true,
                Ok(_) => {}
                Err(err) => return self.fail(Error::Io(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands the stream over a few bytes at a time to exercise reassembly
    struct Trickle<'a> {
        data: &'a [u8],
        at: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = (self.data.len() - self.at).min(3).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.at..self.at + n]);
            self.at += n;
            Ok(n)
        }
    }

    fn scan(input: &str) -> Vec<Record> {
        RecordStreamer::new(input.as_bytes(), "master")
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn normalize_collapses_whitespace_runs() {
        assert_eq!(normalize("Deep House"), "Deep_House");
        assert_eq!(normalize("Deep \t House"), "Deep_House");
        assert_eq!(normalize("  Hip Hop \n"), "Hip_Hop");
        assert_eq!(normalize("Techno"), "Techno");
    }

    #[test]
    fn unescape_decodes_entities() {
        assert_eq!(unescape("Drum &amp; Bass"), "Drum & Bass");
        assert_eq!(unescape("&lt;tag&gt;"), "<tag>");
        assert_eq!(unescape("&quot;a&quot;&apos;b&apos;"), "\"a\"'b'");
        assert_eq!(unescape("Beyonc&#233;"), "Beyoncé");
        assert_eq!(unescape("Rock&#x2019;n&#x2019;Roll"), "Rock’n’Roll");
        // Bare ampersands survive untouched
        assert_eq!(unescape("R&B"), "R&B");
        assert_eq!(unescape("&bogus;"), "&bogus;");
    }

    #[test]
    fn single_record_yields_normalized_tokens() {
        let records = scan(
            "<?xml version=\"1.0\"?><masters>\
             <master id=\"1\"><styles><style>Deep House</style><style>Techno</style></styles>\
             <genres><genre>Electronic</genre></genres></master></masters>",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].styles, vec!["Deep_House", "Techno"]);
        assert_eq!(records[0].genres, vec!["Electronic"]);
    }

    #[test]
    fn missing_lists_yield_empty_fields() {
        let records = scan("<masters><master id=\"2\"><title>Untitled</title></master></masters>");
        assert_eq!(records.len(), 1);
        assert!(records[0].styles.is_empty());
        assert!(records[0].genres.is_empty());
    }

    #[test]
    fn whitespace_only_entries_are_excluded() {
        let records = scan(
            "<masters><master id=\"3\"><styles><style>  </style><style>Dub</style></styles>\
             </master></masters>",
        );
        assert_eq!(records[0].styles, vec!["Dub"]);
    }

    #[test]
    fn records_reassemble_across_tiny_reads() {
        let data = "<masters>\n\
            <master id=\"1\"><styles><style>Ambient</style></styles></master>\n\
            <master id=\"2\"><styles><style>Dub</style><style>Roots Reggae</style></styles>\
            <genres><genre>Reggae</genre></genres></master>\n\
            </masters>";
        let records = RecordStreamer::new(Trickle { data: data.as_bytes(), at: 0 }, "master")
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].styles, vec!["Ambient"]);
        assert_eq!(records[1].styles, vec!["Dub", "Roots_Reggae"]);
        assert_eq!(records[1].genres, vec!["Reggae"]);
    }

    #[test]
    fn self_closing_elements_yield_empty_records() {
        let records = scan(
            "<masters><master id=\"1\"/>\
             <master id=\"2\"><styles><style>Dub</style></styles></master></masters>",
        );
        assert_eq!(records.len(), 2);
        assert!(records[0].styles.is_empty());
        assert!(records[0].genres.is_empty());
        assert_eq!(records[1].styles, vec!["Dub"]);
    }

    #[test]
    fn element_name_is_configurable() {
        let data = "<releases><release id=\"1\"><styles><style>Techno</style></styles>\
                    <genres><genre>Electronic</genre></genres></release></releases>";
        let records = RecordStreamer::new(data.as_bytes(), "release")
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].styles, vec!["Techno"]);
    }

    #[test]
    fn truncated_stream_is_fatal() {
        let mut stream =
            RecordStreamer::new("<masters><master id=\"9\"><styles>".as_bytes(), "master");
        assert!(matches!(stream.next(), Some(Err(Error::Parse(_)))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn unterminated_list_is_fatal() {
        let data = "<masters><master id=\"9\"><styles><style>Dub</style></master></masters>";
        let mut stream = RecordStreamer::new(data.as_bytes(), "master");
        assert!(matches!(stream.next(), Some(Err(Error::Parse(_)))));
        assert!(stream.next().is_none());
    }
}
