//! Samba identity filters
//!
//! Samba domains are ordinary objects of the configured domain type carrying
//! `sambaDomainName`, `sambaSID` and optionally `sambaAlgorithmicRidBase`.

use attrflow_core::search::TYPE;
use attrflow_core::{Error, Query, Result, Value, ValueTable};
use attrflow_types::parse_int;
use tracing::{debug, trace};

use crate::filter::{find_one, first_text, opt_param, text, Filter, FilterContext};

const DOMAIN_NAME: &str = "sambaDomainName";
const DOMAIN_SID: &str = "sambaSID";
const RID_BASE: &str = "sambaAlgorithmicRidBase";

/// Algorithmic RID: users get even, groups odd offsets from the base
///
/// # Errors
///
/// [`Error::TypeConversion`] when the RID does not fit an `i64`.
pub fn algorithmic_rid(index: i64, rid_base: i64, group: bool) -> Result<i64> {
    index
        .checked_mul(2)
        .and_then(|rid| rid.checked_add(rid_base))
        .and_then(|rid| rid.checked_add(i64::from(group)))
        .ok_or_else(|| {
            Error::conversion(
                "Integer",
                index.to_string(),
                format!("algorithmic RID over base {} overflows", rid_base),
            )
        })
}

/// Derive the object SID from its samba domain and id number
///
/// `params`: `user` or `group` (default `user`), the id attribute (default
/// `uidNumber` / `gidNumber`), the domain attribute (default
/// `sambaDomainName`) and an optional fixed RID that replaces the
/// algorithmic one.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateSambaSid;

impl Filter for GenerateSambaSid {
    fn name(&self) -> &'static str {
        "GenerateSambaSid"
    }

    fn process(&self, ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let group = match opt_param(params, 0).unwrap_or("user") {
            "user" => false,
            "group" => true,
            other => {
                return Err(Error::schema(format!(
                    "GenerateSambaSid expects user or group, got {:?}",
                    other
                )))
            }
        };
        let id_attribute = opt_param(params, 1).unwrap_or(if group { "gidNumber" } else { "uidNumber" });
        let domain_attribute = opt_param(params, 2).unwrap_or(DOMAIN_NAME);

        let domain = match table.values(domain_attribute).first() {
            Some(value) => text(self.name(), value)?,
            None => match &ctx.settings.default_samba_domain {
                Some(domain) => domain.clone(),
                None => {
                    trace!(attribute = key, "no samba domain, leaving SID untouched");
                    return Ok(key.to_string());
                }
            },
        };

        let query = Query::new()
            .eq(TYPE, ctx.settings.samba_domain_type.as_str())
            .eq(DOMAIN_NAME, domain.as_str());
        let record = find_one(ctx, &query, &[DOMAIN_SID, RID_BASE], key, &domain)?;
        let domain_sid = first_text(&record, DOMAIN_SID)
            .ok_or_else(|| Error::schema(format!("samba domain {} has no {}", domain, DOMAIN_SID)))?;

        let rid = match opt_param(params, 3) {
            Some(fixed) => fixed.to_string(),
            None => {
                let rid_base = first_text(&record, RID_BASE)
                    .and_then(|b| b.parse::<i64>().ok())
                    .unwrap_or(ctx.settings.samba_rid_base);
                let index = match table.require(id_attribute)?.first() {
                    Some(Value::Int(i)) => *i,
                    Some(other) => parse_int(&text(self.name(), other)?)?,
                    None => {
                        return Err(Error::conversion(
                            "Integer",
                            "",
                            format!("{} is required to derive a SID", id_attribute),
                        ))
                    }
                };
                algorithmic_rid(index, rid_base, group)?.to_string()
            }
        };

        let sid = format!("{}-{}", domain_sid, rid);
        debug!(attribute = key, %sid, "generated samba SID");
        table.set_values(key, vec![Value::from(sid)])?;
        Ok(key.to_string())
    }
}

/// Fill the domain attribute from the domain part of the SID in `key`
///
/// `params[0]` names the domain attribute (default `sambaDomainName`).
/// Unknown domains leave the table untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectSambaDomainFromSid;

impl Filter for DetectSambaDomainFromSid {
    fn name(&self) -> &'static str {
        "DetectSambaDomainFromSid"
    }

    fn process(&self, ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let domain_attribute = opt_param(params, 0).unwrap_or(DOMAIN_NAME);
        let sid = match table.require(key)?.first() {
            Some(value) => text(self.name(), value)?,
            None => return Ok(key.to_string()),
        };
        let domain_sid = match sid.rsplit_once('-') {
            Some((domain_sid, _rid)) => domain_sid,
            None => return Err(Error::conversion("SID", sid.as_str(), "missing RID component")),
        };

        let query = Query::new()
            .eq(TYPE, ctx.settings.samba_domain_type.as_str())
            .eq(DOMAIN_SID, domain_sid);
        let record = match find_one(ctx, &query, &[DOMAIN_NAME], key, domain_sid) {
            Ok(record) => record,
            Err(Error::RelationNotFound { .. }) => {
                trace!(sid = %sid, "no samba domain owns this SID");
                return Ok(key.to_string());
            }
            Err(e) => return Err(e),
        };
        if let Some(name) = first_text(&record, DOMAIN_NAME) {
            table.entry(domain_attribute, "String").current = vec![Value::from(name)];
        }
        Ok(key.to_string())
    }
}
