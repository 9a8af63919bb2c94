//! Compact text encoding for changesets and selections.
//!
//! ```text
//! changeset := input_length strip*
//! strip     := '=' start ',' end          retain
//!            | '-' start ',' end          remove
//!            | '+' count ':' <count chars> insert
//! selection := start | start ',' end
//! ```
//!
//! Inserted text is length-prefixed in chars, so it needs no escaping:
//! `"5=0,5+6: world"` appends `" world"` to a five-char text.
//!
//! Both types serialize through this encoding with serde, which keeps
//! records small in JSON and in bincode alike.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::changeset::Changeset;
use crate::error::ParseError;
use crate::selection::Selection;
use crate::strip::Strip;
use crate::text::char_len;

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.input_length())?;
        for strip in self.strips() {
            match strip {
                Strip::Retain { start, end } => write!(f, "={start},{end}")?,
                Strip::Remove { start, end } => write!(f, "-{start},{end}")?,
                Strip::Insert(text) => {
                    write!(f, "+{}:", char_len(text))?;
                    f.write_str(text)?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Changeset {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut reader = Reader::new(input);
        let input_length = reader.number()?;
        let mut strips = Vec::new();
        while let Some(tag) = reader.next_char() {
            match tag {
                '=' | '-' => {
                    let start = reader.number()?;
                    reader.expect(',')?;
                    let end = reader.number()?;
                    strips.push(if tag == '=' {
                        Strip::retain(start, end)
                    } else {
                        Strip::remove(start, end)
                    });
                }
                '+' => {
                    let count = reader.number()?;
                    reader.expect(':')?;
                    strips.push(Strip::Insert(reader.chars(count)?.to_owned()));
                }
                found => {
                    return Err(ParseError::UnexpectedChar {
                        offset: reader.offset - found.len_utf8(),
                        found,
                    })
                }
            }
        }
        Ok(Changeset::new(strips, input_length)?)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_collapsed() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{},{}", self.start, self.end)
        }
    }
}

impl FromStr for Selection {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut reader = Reader::new(input);
        let start = reader.number()?;
        let selection = match reader.next_char() {
            None => Selection::caret(start),
            Some(',') => Selection::new(start, reader.number()?),
            Some(found) => {
                return Err(ParseError::UnexpectedChar {
                    offset: reader.offset - found.len_utf8(),
                    found,
                })
            }
        };
        if let Some(found) = reader.next_char() {
            return Err(ParseError::UnexpectedChar {
                offset: reader.offset - found.len_utf8(),
                found,
            });
        }
        Ok(selection)
    }
}

impl Serialize for Changeset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Changeset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

/// Byte-offset cursor over the encoded input.
struct Reader<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.input[self.offset..].chars().next()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        match self.next_char() {
            Some(c) if c == wanted => Ok(()),
            Some(found) => Err(ParseError::UnexpectedChar {
                offset: self.offset - found.len_utf8(),
                found,
            }),
            None => Err(ParseError::UnexpectedEnd(self.offset)),
        }
    }

    fn number(&mut self) -> Result<usize, ParseError> {
        let start = self.offset;
        let digits = self.input[start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return match self.input[start..].chars().next() {
                Some(found) => Err(ParseError::UnexpectedChar {
                    offset: start,
                    found,
                }),
                None => Err(ParseError::UnexpectedEnd(start)),
            };
        }
        self.offset += digits;
        self.input[start..self.offset]
            .parse()
            .map_err(|_| ParseError::NumberOverflow(start))
    }

    /// The next `count` chars, verbatim.
    fn chars(&mut self, count: usize) -> Result<&'a str, ParseError> {
        let rest = &self.input[self.offset..];
        let mut iter = rest.char_indices();
        let len = match iter.nth(count) {
            Some((i, _)) => i,
            None if char_len(rest) == count => rest.len(),
            None => return Err(ParseError::UnexpectedEnd(self.input.len())),
        };
        self.offset += len;
        Ok(&rest[..len])
    }
}
