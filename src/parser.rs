use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

static MULTI_SPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

/// One data line of a dump, already split into normalized fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLine {
    /// 1-based physical line number in the source file
    pub line: u64,
    pub fields: Vec<String>,
}

/// Splits a raw dump line into trimmed, space-collapsed fields.
///
/// Returns `None` for comment lines (leading `#`) and blank lines. The number of
/// fields is whatever the line holds; schema checks belong to the record parsers.
pub fn decode_line(line: &str) -> Option<Vec<String>> {
    if line.starts_with('#') || line.trim().is_empty() {
        return None;
    }
    let line = line.strip_suffix('\r').unwrap_or(line);
    Some(line.split('\t').map(normalize_field).collect())
}

fn normalize_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("  ") {
        MULTI_SPACE_REGEX.replace_all(trimmed, " ").into_owned()
    } else {
        trimmed.to_string()
    }
}

/// Streams decoded lines out of a tab-delimited dump, in file order.
pub struct DumpReader<R: BufRead> {
    reader: R,
    buf: String,
    line: u64,
    skip_header: bool,
}

impl DumpReader<BufReader<File>> {
    pub fn open(path: &Path, skip_header: bool) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(256 * 1024, file), skip_header))
    }
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(reader: R, skip_header: bool) -> Self {
        Self {
            reader,
            buf: String::new(),
            line: 0,
            skip_header,
        }
    }

    fn next_raw(&mut self) -> Option<io::Result<()>> {
        self.buf.clear();
        match self.reader.read_line(&mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line += 1;
                if self.buf.ends_with('\n') {
                    self.buf.pop();
                }
                Some(Ok(()))
            }
            Err(e) => {
                self.line += 1;
                Some(Err(io::Error::new(e.kind(), format!("line {}: {e}", self.line))))
            }
        }
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = io::Result<DecodedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.skip_header {
            self.skip_header = false;
            if let Err(e) = self.next_raw()? {
                return Some(Err(e));
            }
        }
        loop {
            if let Err(e) = self.next_raw()? {
                return Some(Err(e));
            }
            if let Some(fields) = decode_line(&self.buf) {
                return Some(Ok(DecodedLine {
                    line: self.line,
                    fields,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(text: &str, skip_header: bool) -> Vec<DecodedLine> {
        DumpReader::new(Cursor::new(text.as_bytes().to_vec()), skip_header)
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        assert_eq!(decode_line("#ISO\tISO3"), None);
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   \t  "), None);
    }

    #[test]
    fn fields_are_trimmed_and_collapsed() {
        let fields = decode_line(" US.CA \tCalifornia   Republic\t\t5332921").unwrap();
        assert_eq!(fields, vec!["US.CA", "California Republic", "", "5332921"]);
    }

    #[test]
    fn trailing_empty_fields_are_kept() {
        let fields = decode_line("a\tb\t\t").unwrap();
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn carriage_return_is_stripped() {
        let fields = decode_line("FR\tParis\r").unwrap();
        assert_eq!(fields, vec!["FR", "Paris"]);
    }

    #[test]
    fn reader_reports_physical_line_numbers() {
        let lines = read_all("# header\nA\t1\n\nB\t2\n", false);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line, 2);
        assert_eq!(lines[0].fields, vec!["A", "1"]);
        assert_eq!(lines[1].line, 4);
    }

    #[test]
    fn reader_skips_header_line() {
        let lines = read_all("CountryCode\tTimeZoneId\nFR\tEurope/Paris\n", true);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].fields[1], "Europe/Paris");
        assert_eq!(lines[0].line, 2);
    }

    #[test]
    fn reader_handles_missing_final_newline() {
        let lines = read_all("A\t1\nB\t2", false);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].fields, vec!["B", "2"]);
    }

    #[test]
    fn read_error_names_the_line() {
        let mut bytes = b"1\tok\n2\tok\n3\t".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.push(b'\n');

        let mut reader = DumpReader::new(Cursor::new(bytes), false);
        assert_eq!(reader.next().unwrap().unwrap().line, 1);
        assert_eq!(reader.next().unwrap().unwrap().line, 2);
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().starts_with("line 3:"), "{err}");
    }
}
