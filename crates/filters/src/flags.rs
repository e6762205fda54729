//! Flag string marshaling
//!
//! A flag string packs several boolean attributes into one value: the
//! character at position `i` of the alphabet stands for attribute `i` and is
//! present when that attribute is true. Marshal builds the string from the
//! booleans, unmarshal resets every boolean to false and sets the ones whose
//! character is present. The booleans are derived data, so both directions
//! mark them `skip_save`.
//!
//! Multi-valued booleans are parallel arrays: flag string `i` encodes
//! position `i` of every backing attribute.
//!
//! | Filter pair | Alphabet | Wrapper | Width |
//! |-------------|----------|---------|-------|
//! | `MarshalFlags` / `UnmarshalFlags` | `params[0]` | `params[2]` | `params[3]` |
//! | `*MailDeliveryMode` | `VSRLIC` | `[]` | - |
//! | `*SambaAcctFlags` | `UNDHTMWSLXI` | `[]` | 11 |

use attrflow_core::{Error, Result, Value, ValueTable};
use attrflow_types::parse_bool;
use tracing::trace;

use crate::filter::{opt_param, param, split_list, text, Filter, FilterContext};

/// Mail delivery mode alphabet
pub const MAIL_DELIVERY_ALPHABET: &str = "VSRLIC";

/// Attributes backing the mail delivery mode flags, in alphabet order
pub const MAIL_DELIVERY_ATTRIBUTES: [&str; 6] = [
    "vacationMessageActive",
    "spamFilterActive",
    "rejectLargeMails",
    "localDeliveryOnly",
    "skipOwnMailbox",
    "customSieveScript",
];

/// Samba account flag alphabet
pub const SAMBA_ACCT_ALPHABET: &str = "UNDHTMWSLXI";

/// Attributes backing the samba account flags, in alphabet order
pub const SAMBA_ACCT_ATTRIBUTES: [&str; 11] = [
    "sambaNormalUserAccount",
    "sambaPasswordNotRequired",
    "sambaAccountDisabled",
    "sambaHomeDirectoryRequired",
    "sambaTemporaryDuplicateAccount",
    "sambaMnsLogonAccount",
    "sambaWorkstationTrustAccount",
    "sambaServerTrustAccount",
    "sambaAccountAutoLocked",
    "sambaPasswordNeverExpires",
    "sambaInterdomainTrustAccount",
];

const SAMBA_ACCT_WIDTH: usize = 11;

/// Positional mapping between flag characters and boolean attributes
#[derive(Debug, Clone, PartialEq)]
pub struct FlagCodec {
    alphabet: Vec<char>,
    attributes: Vec<String>,
    wrapper: Option<(char, char)>,
    width: usize,
}

impl FlagCodec {
    /// Build a codec
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] when alphabet and attribute list differ
    /// in length or the wrapper is not exactly two characters.
    pub fn new(alphabet: &str, attributes: Vec<String>, wrapper: Option<&str>, width: usize) -> Result<Self> {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.len() != attributes.len() {
            return Err(Error::schema(format!(
                "flag alphabet has {} characters but {} attributes are mapped",
                alphabet.len(),
                attributes.len()
            )));
        }
        let wrapper = match wrapper {
            None => None,
            Some(w) => {
                let mut chars = w.chars();
                match (chars.next(), chars.next(), chars.next()) {
                    (Some(open), Some(close), None) => Some((open, close)),
                    _ => return Err(Error::schema(format!("flag wrapper {:?} must be two characters", w))),
                }
            }
        };
        Ok(FlagCodec {
            alphabet,
            attributes,
            wrapper,
            width,
        })
    }

    fn from_params(alphabet: &str, defaults: &[&str], params: &[String], wrapper: &str, width: usize) -> Result<Self> {
        let attributes = match opt_param(params, 0) {
            Some(list) => split_list(list),
            None => defaults.iter().map(|a| a.to_string()).collect(),
        };
        Self::new(alphabet, attributes, Some(wrapper), width)
    }

    fn is_set(&self, table: &ValueTable, attribute: &str, index: usize) -> Result<bool> {
        Ok(match table.values(attribute).get(index) {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => parse_bool(&text("MarshalFlags", other)?),
        })
    }

    /// Encode the boolean arrays of `table` into flag strings
    ///
    /// Position `i` of every backing array contributes to the `i`th string.
    /// Missing positions count as false. At least one string is produced.
    pub fn encode(&self, table: &ValueTable) -> Result<Vec<String>> {
        let rows = self
            .attributes
            .iter()
            .map(|a| table.values(a).len())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut encoded = Vec::with_capacity(rows);
        for index in 0..rows {
            let mut flags = String::new();
            for (c, attribute) in self.alphabet.iter().zip(&self.attributes) {
                if self.is_set(table, attribute, index)? {
                    flags.push(*c);
                }
            }
            while flags.chars().count() < self.width {
                flags.push(' ');
            }
            encoded.push(match self.wrapper {
                Some((open, close)) => format!("{}{}{}", open, flags, close),
                None => flags,
            });
        }
        Ok(encoded)
    }

    /// Set every mapped boolean array from a list of flag strings
    ///
    /// All targets are reset to `false` at every position first; an empty
    /// list behaves like a single empty flag string.
    pub fn decode(&self, flags: &[String], table: &mut ValueTable) {
        let rows = flags.len().max(1);
        for attribute in &self.attributes {
            let slot = table.entry(attribute, "Boolean");
            slot.current = vec![Value::Bool(false); rows];
            slot.skip_save = true;
        }

        for (index, raw) in flags.iter().enumerate() {
            let inner = match self.wrapper {
                Some((open, close)) => raw
                    .strip_prefix(open)
                    .and_then(|f| f.strip_suffix(close))
                    .unwrap_or(raw.as_str()),
                None => raw.as_str(),
            };
            for (c, attribute) in self.alphabet.iter().zip(&self.attributes) {
                if !inner.contains(*c) {
                    continue;
                }
                if let Some(value) = table.get_mut(attribute).and_then(|slot| slot.current.get_mut(index)) {
                    *value = Value::Bool(true);
                }
            }
            if let Some(unknown) = inner.chars().find(|c| *c != ' ' && !self.alphabet.contains(c)) {
                trace!(flag = %unknown, position = index, "ignoring unmapped flag character");
            }
        }
    }

    fn marshal(&self, key: &str, table: &mut ValueTable) -> Result<String> {
        let flags = self.encode(table)?;
        for attribute in &self.attributes {
            if let Some(slot) = table.get_mut(attribute) {
                slot.skip_save = true;
            }
        }
        table.set_values(key, flags.into_iter().map(Value::from).collect())?;
        Ok(key.to_string())
    }

    fn unmarshal(&self, key: &str, table: &mut ValueTable) -> Result<String> {
        let flags = table
            .require(key)?
            .current
            .iter()
            .map(|value| text("UnmarshalFlags", value))
            .collect::<Result<Vec<_>>>()?;
        self.decode(&flags, table);
        Ok(key.to_string())
    }
}

fn generic_codec(filter: &str, params: &[String]) -> Result<FlagCodec> {
    let alphabet = param(params, 0, filter)?;
    let attributes = split_list(param(params, 1, filter)?);
    let width = match opt_param(params, 3) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| Error::schema(format!("{} width {:?} is not a number", filter, raw)))?,
        None => 0,
    };
    FlagCodec::new(alphabet, attributes, opt_param(params, 2), width)
}

/// Build a flag string in `key` from boolean attributes
///
/// `params`: alphabet, comma-separated attributes, optional two-character
/// wrapper, optional minimum width (space padded).
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalFlags;

impl Filter for MarshalFlags {
    fn name(&self) -> &'static str {
        "MarshalFlags"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        generic_codec(self.name(), params)?.marshal(key, table)
    }
}

/// Set boolean attributes from the flag string in `key`
///
/// Same parameters as [`MarshalFlags`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmarshalFlags;

impl Filter for UnmarshalFlags {
    fn name(&self) -> &'static str {
        "UnmarshalFlags"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        generic_codec(self.name(), params)?.unmarshal(key, table)
    }
}

/// Mail delivery mode flags (`[VSRLIC]`) from booleans
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalMailDeliveryMode;

impl Filter for MarshalMailDeliveryMode {
    fn name(&self) -> &'static str {
        "MarshalMailDeliveryMode"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        FlagCodec::from_params(MAIL_DELIVERY_ALPHABET, &MAIL_DELIVERY_ATTRIBUTES, params, "[]", 0)?
            .marshal(key, table)
    }
}

/// Mail delivery mode flags to booleans
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmarshalMailDeliveryMode;

impl Filter for UnmarshalMailDeliveryMode {
    fn name(&self) -> &'static str {
        "UnmarshalMailDeliveryMode"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        FlagCodec::from_params(MAIL_DELIVERY_ALPHABET, &MAIL_DELIVERY_ATTRIBUTES, params, "[]", 0)?
            .unmarshal(key, table)
    }
}

/// Samba account flags (`[UNDHTMWSLXI]`, padded to 11) from booleans
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalSambaAcctFlags;

impl Filter for MarshalSambaAcctFlags {
    fn name(&self) -> &'static str {
        "MarshalSambaAcctFlags"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        FlagCodec::from_params(SAMBA_ACCT_ALPHABET, &SAMBA_ACCT_ATTRIBUTES, params, "[]", SAMBA_ACCT_WIDTH)?
            .marshal(key, table)
    }
}

/// Samba account flags to booleans
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmarshalSambaAcctFlags;

impl Filter for UnmarshalSambaAcctFlags {
    fn name(&self) -> &'static str {
        "UnmarshalSambaAcctFlags"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        FlagCodec::from_params(SAMBA_ACCT_ALPHABET, &SAMBA_ACCT_ATTRIBUTES, params, "[]", SAMBA_ACCT_WIDTH)?
            .unmarshal(key, table)
    }
}
