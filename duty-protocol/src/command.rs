//! Request parsing and the verb table
//!
//! A request line is a JSON array of strings. Element 0 names the verb,
//! the remaining elements are positional arguments:
//!
//! ```text
//! ["ports-setup","2","3","25"]
//! ["set-config","{\"ports\":[25],\"default_values\":[100]}"]
//! ```
//!
//! Arguments stay strings here; each handler decides how to interpret them.

use core::fmt;

use heapless::{String, Vec};
use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};

use crate::line::MAX_LINE_LEN;

/// Maximum length of a single array element after unescaping
pub const MAX_ARG_LEN: usize = 256;

/// Maximum number of array elements (verb included)
pub const MAX_PARTS: usize = 24;

/// Errors from request parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Not a JSON array of strings
    InvalidJson,
    /// Array has no verb element
    Empty,
    /// Well-formed, but more than [`MAX_PARTS`] elements or an element
    /// longer than [`MAX_ARG_LEN`]
    TooLarge,
}

/// Known request verbs
///
/// The table is closed. Names that match none of the entries resolve to
/// [`Verb::Ping`] rather than to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verb {
    /// Set the live value of one output
    SetValue,
    /// Replace the port list
    PortsSetup,
    /// Report live values
    GetValue,
    /// Report persisted configuration plus live values
    GetConfig,
    /// Replace the configuration from a JSON document
    SetConfig,
    /// Report the canonical default configuration
    GetDefaultConfig,
    /// Reset to the canonical default configuration
    LoadDefaultConfig,
    /// Set the persisted default value of one output
    SetDefaultValue,
    /// Set the persisted update interval
    SetUpdateTime,
    /// Liveness check (also the fallback for unknown verbs)
    Ping,
    /// Report board capabilities
    BoardInfo,
}

/// Wire names, matched exactly and case-sensitively
const VERB_TABLE: [(&str, Verb); 11] = [
    ("set-value", Verb::SetValue),
    ("ports-setup", Verb::PortsSetup),
    ("get-value", Verb::GetValue),
    ("get-config", Verb::GetConfig),
    ("set-config", Verb::SetConfig),
    ("get-default-config", Verb::GetDefaultConfig),
    ("load-default-config", Verb::LoadDefaultConfig),
    ("set-default-value", Verb::SetDefaultValue),
    ("set-update-time", Verb::SetUpdateTime),
    ("ping", Verb::Ping),
    ("board-info", Verb::BoardInfo),
];

impl Verb {
    /// Look up a verb by its exact wire name
    pub fn lookup(name: &str) -> Option<Self> {
        VERB_TABLE
            .iter()
            .find(|(wire, _)| *wire == name)
            .map(|&(_, verb)| verb)
    }

    /// Resolve a wire name, falling back to [`Verb::Ping`]
    pub fn from_name(name: &str) -> Self {
        Self::lookup(name).unwrap_or(Verb::Ping)
    }

    /// Wire name of this verb
    pub fn name(self) -> &'static str {
        VERB_TABLE
            .iter()
            .find(|&&(_, verb)| verb == self)
            .map(|&(wire, _)| wire)
            .unwrap_or("ping")
    }
}

type Parts = Vec<String<MAX_ARG_LEN>, MAX_PARTS>;

/// One array element, `None` when it does not fit [`MAX_ARG_LEN`]
struct Element(Option<String<MAX_ARG_LEN>>);

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ElementVisitor;

        impl<'de> Visitor<'de> for ElementVisitor {
            type Value = Element;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Element, E> {
                let mut text = String::new();
                if text.push_str(v).is_err() {
                    return Ok(Element(None));
                }
                Ok(Element(Some(text)))
            }
        }

        deserializer.deserialize_str(ElementVisitor)
    }
}

/// Request array as read off the wire
///
/// Elements past capacity are still consumed so that the array is checked
/// for well-formedness before its size is judged.
struct RawParts {
    parts: Parts,
    oversized: bool,
}

impl<'de> Deserialize<'de> for RawParts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PartsVisitor;

        impl<'de> Visitor<'de> for PartsVisitor {
            type Value = RawParts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of strings")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawParts, A::Error> {
                let mut raw = RawParts {
                    parts: Parts::new(),
                    oversized: false,
                };
                while let Some(Element(text)) = seq.next_element::<Element>()? {
                    match text {
                        Some(text) if !raw.oversized => {
                            raw.oversized = raw.parts.push(text).is_err();
                        }
                        _ => raw.oversized = true,
                    }
                }
                Ok(raw)
            }
        }

        deserializer.deserialize_seq(PartsVisitor)
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: Verb,
    parts: Parts,
}

impl Command {
    /// Parse a request line (without its terminator)
    pub fn parse(line: &[u8]) -> Result<Self, ParseError> {
        let mut scratch = [0u8; MAX_LINE_LEN];
        let (raw, consumed): (RawParts, usize) =
            serde_json_core::from_slice_escaped(line, &mut scratch).map_err(|e| match e {
                serde_json_core::de::Error::EscapedStringIsTooLong => ParseError::TooLarge,
                _ => ParseError::InvalidJson,
            })?;
        if !line[consumed..].iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::InvalidJson);
        }
        if raw.oversized {
            return Err(ParseError::TooLarge);
        }
        Self::from_owned_parts(raw.parts)
    }

    /// Parse a request held in a string
    pub fn parse_str(line: &str) -> Result<Self, ParseError> {
        Self::parse(line.as_bytes())
    }

    /// Build a command from already split parts (verb first)
    ///
    /// Used by host tooling and tests that do not go through JSON.
    pub fn from_parts(parts: &[&str]) -> Result<Self, ParseError> {
        let mut owned = Parts::new();
        for part in parts {
            let mut s = String::new();
            s.push_str(part).map_err(|_| ParseError::TooLarge)?;
            owned.push(s).map_err(|_| ParseError::TooLarge)?;
        }
        Self::from_owned_parts(owned)
    }

    fn from_owned_parts(parts: Parts) -> Result<Self, ParseError> {
        let verb = parts
            .first()
            .map(|name| Verb::from_name(name))
            .ok_or(ParseError::Empty)?;
        Ok(Self { verb, parts })
    }

    /// Resolved verb
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Verb exactly as received
    pub fn name(&self) -> &str {
        self.parts.first().map(|s| s.as_str()).unwrap_or("")
    }

    /// True when the received name was unknown and resolved to ping
    pub fn is_fallback(&self) -> bool {
        Verb::lookup(self.name()).is_none()
    }

    /// Positional argument `index` (0 is the first argument after the verb)
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.parts.get(index + 1).map(|s| s.as_str())
    }

    /// Number of positional arguments
    pub fn arg_count(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }

    /// Iterate over positional arguments
    pub fn args(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.iter().skip(1).map(|s| s.as_str())
    }
}

impl TryFrom<&str> for Command {
    type Error = ParseError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        Self::parse_str(line)
    }
}
