use std::process::Command;

use thiserror::Error;
use tracing::{debug, trace, warn};

use super::{DeviceClass, DeviceRegistry, RegistryError};
use crate::record::{RawRecord, RawValue};

const DEFAULT_PROGRAM: &str = "ioreg";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: property block opened inside another block")]
    NestedBlock { line: usize },
    #[error("line {line}: property block closed without being opened")]
    UnopenedBlock { line: usize },
    #[error("property block opened at line {line} is never closed")]
    UnterminatedBlock { line: usize },
}

// Error in a single property line, the line is skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column {column}: {reason}")]
struct PropertyError {
    column: usize,
    reason: String,
}

// Query the I/O Kit registry through the ioreg command line tool
#[derive(Debug, Clone)]
pub struct IoregRegistry {
    program: String,
}

impl IoregRegistry {
    // Use the given program in place of ioreg, it is invoked
    // with the same arguments and must produce the same listing
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for IoregRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl DeviceRegistry for IoregRegistry {
    fn enumerate(&self, class: DeviceClass) -> Result<Vec<RawRecord>, RegistryError> {
        debug!("Querying {} entries with \"{}\"", class, self.program);

        // List every property (-l) without line truncation (-w0) of the
        // entries of the class (-r -c) but not of their children (-d1)
        let output = Command::new(&self.program)
            .args(["-l", "-w0", "-r", "-d1", "-c", class.class_name()])
            .output()
            .map_err(|source| RegistryError::Spawn {
                program: self.program.clone(),
                class,
                source,
            })?;

        if !output.status.success() {
            return Err(RegistryError::Status {
                program: self.program.clone(),
                class,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let records = parse_listing(&listing)
            .map_err(|source| RegistryError::Parse { class, source })?;

        debug!("Found {} {} entries", records.len(), class);

        Ok(records)
    }
}

// Parse an ioreg property listing into one record per registry entry.
//
// The listing is made of entry header lines ("+-o Name <class ...>") each
// followed by a block of properties between a "{" and a "}" line. Every line
// can be prefixed by the tree drawing characters '|' and ' '. Inside a block
// each line holds a single property: "key" = value
pub fn parse_listing(listing: &str) -> Result<Vec<RawRecord>, ParseError> {
    let mut records = Vec::new();

    // Line where the current block was opened and its properties
    let mut current: Option<(usize, RawRecord)> = None;

    for (index, line) in listing.lines().enumerate() {
        let line_number = index + 1;
        let body = line.trim_start_matches([' ', '|']).trim_end();

        match body {
            "{" => {
                if current.is_some() {
                    return Err(ParseError::NestedBlock { line: line_number });
                }

                current = Some((line_number, RawRecord::new()));
            }
            "}" => {
                let Some((_, record)) = current.take() else {
                    return Err(ParseError::UnopenedBlock { line: line_number });
                };

                records.push(record);
            }
            _ if body.starts_with('"') => {
                let Some((_, record)) = current.as_mut() else {
                    trace!("Ignoring property outside of a block at line {}", line_number);
                    continue;
                };

                match parse_property(body) {
                    Ok((key, value)) => record.insert(key, value),
                    Err(e) => {
                        warn!("Skipping malformed property at line {}: {}", line_number, e)
                    }
                }
            }
            _ => {}
        }
    }

    if let Some((line, _)) = current {
        return Err(ParseError::UnterminatedBlock { line });
    }

    Ok(records)
}

fn parse_property(body: &str) -> Result<(String, RawValue), PropertyError> {
    let mut cursor = Cursor::new(body);

    let key = cursor.parse_string()?;
    cursor.skip_whitespace();
    cursor.expect(b'=')?;
    cursor.skip_whitespace();
    let value = cursor.parse_value()?;
    cursor.skip_whitespace();

    if !cursor.is_at_end() {
        return Err(cursor.error("unexpected characters after the value"));
    }

    Ok((key, value))
}

// Recursive descent parser over a single property line
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), PropertyError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected as char)))
        }
    }

    fn error(&self, reason: impl Into<String>) -> PropertyError {
        PropertyError {
            column: self.pos + 1,
            reason: reason.into(),
        }
    }

    fn parse_value(&mut self) -> Result<RawValue, PropertyError> {
        match self.peek() {
            Some(b'"') => self.parse_string().map(RawValue::String),
            Some(b'<') => self.parse_data().map(RawValue::Data),
            Some(b'{') => self.parse_record().map(RawValue::Record),
            Some(b'(') => self.parse_array().map(RawValue::Array),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(b'Y' | b'N') => self.parse_bool().map(RawValue::from),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("missing value")),
        }
    }

    // Strings are not escaped, they end at the next quote
    fn parse_string(&mut self) -> Result<String, PropertyError> {
        self.expect(b'"')?;

        let start = self.pos;
        let end = self.input[start..]
            .find('"')
            .map(|offset| start + offset)
            .ok_or_else(|| self.error("unterminated string"))?;

        self.pos = end + 1;

        Ok(self.input[start..end].to_string())
    }

    // Data is printed either as hexadecimal digits or, when printable,
    // as a comma separated list of NUL terminated strings
    fn parse_data(&mut self) -> Result<Vec<u8>, PropertyError> {
        self.expect(b'<')?;
        self.skip_whitespace();

        let mut data = Vec::new();

        if self.peek() == Some(b'"') {
            loop {
                data.extend_from_slice(self.parse_string()?.as_bytes());
                data.push(0);

                self.skip_whitespace();
                if self.peek() != Some(b',') {
                    break;
                }
                self.pos += 1;
                self.skip_whitespace();
            }
        } else {
            let start = self.pos;
            let end = self.input[start..]
                .find('>')
                .map(|offset| start + offset)
                .ok_or_else(|| self.error("unterminated data"))?;

            let digits: Vec<u8> = self.input.as_bytes()[start..end]
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();

            if digits.len() % 2 != 0 {
                return Err(self.error("odd number of hexadecimal digits"));
            }

            for pair in digits.chunks(2) {
                let byte = hex_digit(pair[0])
                    .zip(hex_digit(pair[1]))
                    .map(|(high, low)| (high << 4) | low)
                    .ok_or_else(|| self.error("invalid hexadecimal digit"))?;

                data.push(byte);
            }

            self.pos = end;
        }

        self.skip_whitespace();
        self.expect(b'>')?;

        Ok(data)
    }

    fn parse_record(&mut self) -> Result<RawRecord, PropertyError> {
        self.expect(b'{')?;
        self.skip_whitespace();

        let mut record = RawRecord::new();

        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(record);
        }

        loop {
            self.skip_whitespace();
            let key = self.parse_string()?;
            self.skip_whitespace();
            self.expect(b'=')?;
            self.skip_whitespace();
            let value = self.parse_value()?;

            record.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(record);
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Vec<RawValue>, PropertyError> {
        self.expect(b'(')?;
        self.skip_whitespace();

        let mut values = Vec::new();

        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(values);
        }

        loop {
            self.skip_whitespace();
            values.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(values);
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<RawValue, PropertyError> {
        let start = self.pos;

        while matches!(
            self.peek(),
            Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.')
        ) {
            self.pos += 1;
        }

        let text = &self.input[start..self.pos];

        let number = if let Some(hex) = text.strip_prefix("0x") {
            u64::from_str_radix(hex, 16).ok().map(RawValue::from)
        } else if text.contains('.') {
            text.parse::<f64>().ok().map(RawValue::from)
        } else {
            text.parse::<i64>()
                .map(RawValue::Integer)
                .or_else(|_| text.parse::<u64>().map(RawValue::Unsigned))
                .ok()
        };

        number.ok_or_else(|| PropertyError {
            column: start + 1,
            reason: format!("invalid number \"{text}\""),
        })
    }

    fn parse_bool(&mut self) -> Result<bool, PropertyError> {
        let rest = &self.input[self.pos..];

        if rest.starts_with("Yes") {
            self.pos += 3;
            Ok(true)
        } else if rest.starts_with("No") {
            self.pos += 2;
            Ok(false)
        } else {
            Err(self.error("unexpected character"))
        }
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|digit| digit as u8)
}
