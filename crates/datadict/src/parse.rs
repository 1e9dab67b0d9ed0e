//! Structure shorthand: `"x[V]; y[A]; z[W](x, y)"`.

use crate::datadict::DataDict;
use crate::error::{DataDictError, Result};
use crate::field::Field;
use crate::values::{DType, Values};

/// Build an empty, validated dataset from a structure description.
///
/// Fields are separated by `;`. Each is a name, an optional unit in square
/// brackets and an optional comma-separated axes list in parentheses.
pub fn str2dd(description: &str) -> Result<DataDict> {
    let mut dd = DataDict::new();
    for entry in description.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, field) = parse_field(entry)?;
        if dd.contains(&name) {
            return Err(DataDictError::Parse(format!("field '{name}' defined twice")));
        }
        dd.insert(name, field);
    }
    dd.validate()?;
    Ok(dd)
}

fn parse_field(entry: &str) -> Result<(String, Field)> {
    let name_end = entry.find(['[', '(']).unwrap_or(entry.len());
    let name = entry[..name_end].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(DataDictError::Parse(format!("invalid field name in '{entry}'")));
    }

    let mut rest = entry[name_end..].trim_start();
    let mut unit = String::new();
    if let Some(after) = rest.strip_prefix('[') {
        let close = after
            .find(']')
            .ok_or_else(|| DataDictError::Parse(format!("unterminated unit in '{entry}'")))?;
        unit = after[..close].trim().to_string();
        rest = after[close + 1..].trim_start();
    }

    let mut axes = Vec::new();
    if let Some(after) = rest.strip_prefix('(') {
        let close = after
            .find(')')
            .ok_or_else(|| DataDictError::Parse(format!("unterminated axes list in '{entry}'")))?;
        axes = after[..close]
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect();
        rest = after[close + 1..].trim_start();
    }

    if !rest.is_empty() {
        return Err(DataDictError::Parse(format!("unexpected '{rest}' in '{entry}'")));
    }

    let field = Field {
        values: Values::empty(DType::Float64, &[]),
        axes,
        unit,
        ..Default::default()
    };
    Ok((name.to_string(), field))
}
