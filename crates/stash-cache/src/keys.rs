//! Cache key construction.
//!
//! A key is `provider:endpoint` followed by one segment per present
//! dimension, in the fixed order category, period, type, filter, day. The
//! category segment is its bare value; the others are `name=value`. Within
//! segments, `%`, `:` and `=` are percent-encoded so a key always parses
//! back into the dimensions that built it.

use stash_core::Dimensions;

pub const SEPARATOR: char = ':';

const TAGGED: [&str; 4] = ["period", "type", "filter", "day"];

/// Build the cache key for a request.
pub fn build_key(provider: &str, endpoint: &str, dimensions: &Dimensions) -> String {
    let mut key = format!("{}{}{}", escape(provider), SEPARATOR, escape(endpoint));
    for (name, value) in dimensions.present() {
        key.push(SEPARATOR);
        if name != "category" {
            key.push_str(name);
            key.push('=');
        }
        key.push_str(&escape(value));
    }
    key
}

/// The parts a key was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub provider: String,
    pub endpoint: String,
    pub dimensions: Dimensions,
}

/// Inverse of [`build_key`]. Returns `None` for strings `build_key` cannot
/// produce.
pub fn parse_key(key: &str) -> Option<ParsedKey> {
    let mut segments = key.split(SEPARATOR);
    let provider = unescape(segments.next()?)?;
    let endpoint = unescape(segments.next()?)?;
    let mut dimensions = Dimensions::default();

    for (index, segment) in segments.enumerate() {
        match segment.split_once('=') {
            Some((name, value)) => {
                let value = Some(unescape(value)?);
                let slot = match name {
                    "period" => &mut dimensions.period,
                    "type" => &mut dimensions.kind,
                    "filter" => &mut dimensions.filter,
                    "day" => &mut dimensions.day,
                    _ => return None,
                };
                if slot.is_some() {
                    return None;
                }
                *slot = value;
            }
            None if index == 0 => dimensions.category = Some(unescape(segment)?),
            None => return None,
        }
    }

    Some(ParsedKey {
        provider,
        endpoint,
        dimensions,
    })
}

/// Whether `name` is a dimension that appears as `name=value` in keys.
pub fn is_tagged_dimension(name: &str) -> bool {
    TAGGED.contains(&name)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '=' => out.push_str("%3D"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3)?;
        out.push(match code {
            "25" => '%',
            "3A" => ':',
            "3D" => '=',
            _ => return None,
        });
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Some(out)
}
