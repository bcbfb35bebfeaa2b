//! Response shapes returned by code-search services.

use super::LookupError;
use crate::codes::CodeEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// Detect from the payload.
    #[default]
    Auto,
    /// `{"contains": [{code, display}]}`, optionally nested under `expansion`
    /// (FHIR ValueSet `$expand`).
    Expansion,
    /// `[total, codes, extras, [[code, label], ..]]` (clinical-tables style).
    Positional,
    /// `[{code, label}, ..]` as served by the local proxy.
    Flat,
}

impl ResponseShape {
    pub fn detect(body: &Value) -> Option<Self> {
        match body {
            Value::Object(_) => Some(Self::Expansion),
            Value::Array(items) => match items.first() {
                None | Some(Value::Object(_)) => Some(Self::Flat),
                Some(Value::Number(_)) => Some(Self::Positional),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert a decoded body into entries, dropping pairs with a blank side.
    pub fn parse(self, body: &Value) -> Result<Vec<CodeEntry>, LookupError> {
        let shape = match self {
            Self::Auto => Self::detect(body)
                .ok_or_else(|| LookupError::Parse("unrecognized response shape".into()))?,
            other => other,
        };

        let entries = match shape {
            Self::Expansion => parse_expansion(body)?,
            Self::Positional => parse_positional(body)?,
            Self::Flat => parse_flat(body)?,
            Self::Auto => unreachable!("auto is resolved above"),
        };

        Ok(entries
            .into_iter()
            .filter_map(|(code, label)| {
                let code = code.trim();
                let label = label.trim();
                (!code.is_empty() && !label.is_empty()).then(|| CodeEntry::new(code, label))
            })
            .collect())
    }
}

fn parse_expansion(body: &Value) -> Result<Vec<(String, String)>, LookupError> {
    let contains = body
        .get("contains")
        .or_else(|| body.get("expansion").and_then(|e| e.get("contains")));

    let items = match contains {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(LookupError::Parse("`contains` is not a list".into())),
        // An expansion with no matches omits `contains` entirely.
        None if body.get("expansion").is_some() => return Ok(Vec::new()),
        None => return Err(LookupError::Parse("missing `contains` list".into())),
    };

    Ok(items
        .iter()
        .map(|item| (text(item, "code"), text(item, "display")))
        .collect())
}

fn parse_positional(body: &Value) -> Result<Vec<(String, String)>, LookupError> {
    let Value::Array(parts) = body else {
        return Err(LookupError::Parse("expected a positional array".into()));
    };

    let pairs = [3, 2]
        .iter()
        .filter_map(|&idx| parts.get(idx))
        .find_map(|candidate| pair_rows(candidate));

    match pairs {
        Some(rows) => Ok(rows),
        // No pair column at all: valid only when the service reported no hits.
        None if parts.first().and_then(Value::as_u64) == Some(0) => Ok(Vec::new()),
        None => Err(LookupError::Parse("no [code, label] pairs found".into())),
    }
}

fn pair_rows(value: &Value) -> Option<Vec<(String, String)>> {
    let rows = value.as_array()?;
    rows.iter()
        .map(|row| {
            let row = row.as_array()?;
            Some((row.first()?.as_str()?.to_string(), row.get(1)?.as_str()?.to_string()))
        })
        .collect()
}

fn parse_flat(body: &Value) -> Result<Vec<(String, String)>, LookupError> {
    let entries: Vec<CodeEntry> =
        serde_json::from_value(body.clone()).map_err(|e| LookupError::Parse(e.to_string()))?;
    Ok(entries.into_iter().map(|e| (e.code, e.label)).collect())
}

fn text(item: &Value, field: &str) -> String {
    item.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
