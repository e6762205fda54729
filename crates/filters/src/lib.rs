//! Filter library for attrflow
//!
//! Filters are the value transformers of rule programs. They run in the
//! in-direction (backend to application, after load) and the out-direction
//! (application to backend, before save) and mutate the object's value
//! table in place.
//!
//! Families:
//! - [`generic`]: key switching, constant values, backends, type conversion, ids
//! - [`strings`]: split, join, concatenate, regex replace
//! - [`temporal`]: dates, timestamps and Unix seconds
//! - [`flags`]: flag strings packed from boolean attributes
//! - [`samba`], [`foreman`]: domain-specific composites
//! - [`json`]: strict JSON encode/decode
//! - [`artifact`]: content-addressed side storage

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod filter;
pub mod flags;
pub mod foreman;
pub mod generic;
pub mod json;
pub mod samba;
pub mod strings;
pub mod temporal;

pub use artifact::{artifact_name, StoreArtifact};
pub use filter::{Filter, FilterContext, FilterRegistry, FilterSettings};
pub use flags::{
    FlagCodec, MarshalFlags, MarshalMailDeliveryMode, MarshalSambaAcctFlags, UnmarshalFlags,
    UnmarshalMailDeliveryMode, UnmarshalSambaAcctFlags,
};
pub use foreman::{ForemanHostGroupIn, ForemanHostGroupOut, ForemanStatusIn, ForemanStatusOut};
pub use generic::{
    BooleanToString, Clear, ConvertType, GenerateIds, SetBackends, SetValue, StringToBoolean,
    Target,
};
pub use json::{JsonToString, StringToJson};
pub use samba::{algorithmic_rid, DetectSambaDomainFromSid, GenerateSambaSid};
pub use strings::{ConcatString, JoinArray, Replace, SplitString};
pub use temporal::{
    DateToString, DatetimeToInteger, DatetimeToString, IntegerToDatetime, StringToDate,
    StringToDatetime,
};
