//! Merging independently collected tabular datasets.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::datadict::DataDict;
use crate::error::Result;

/// First name of the form `name_0`, `name_1`, ... not in `taken`.
fn replacement_name(name: &str, taken: &HashSet<String>) -> String {
    (0..)
        .map(|i| format!("{name}_{i}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Combine datasets into one.
///
/// The first dataset keeps its field names and its meta. An axis of a later
/// dataset with the same name and equal values as an existing one is shared;
/// with different values it is renamed (`x_0`, `x_1`, ...) and the axes lists
/// of its dependents are rewritten. Colliding dependents are renamed the same
/// way. The result is validated.
pub fn combine_datadicts(dicts: &[DataDict]) -> Result<DataDict> {
    let Some((first, rest)) = dicts.split_first() else {
        return Ok(DataDict::new());
    };
    let mut ret = first.clone();

    for dd in rest {
        dd.validate()?;
        let mut taken: HashSet<String> = ret.field_names().into_iter().collect();
        taken.extend(dd.field_names());

        // Rename map for this dataset; shared axes map to themselves.
        let mut renames: IndexMap<String, String> = IndexMap::new();
        let mut shared: HashSet<String> = HashSet::new();
        for (name, field) in dd.iter() {
            let Ok(existing) = ret.field(name) else {
                continue;
            };
            if !field.is_dependent()
                && !existing.is_dependent()
                && existing.same_labels(field)
                && existing.values == field.values
            {
                shared.insert(name.clone());
                continue;
            }
            let new_name = replacement_name(name, &taken);
            debug!(field = %name, renamed = %new_name, "name collision while combining");
            taken.insert(new_name.clone());
            renames.insert(name.clone(), new_name);
        }

        for (name, field) in dd.iter() {
            if shared.contains(name) {
                continue;
            }
            let mut field = field.clone();
            for ax in field.axes.iter_mut() {
                if let Some(new_ax) = renames.get(ax) {
                    *ax = new_ax.clone();
                }
            }
            let target = renames.get(name).cloned().unwrap_or_else(|| name.clone());
            ret.insert(target, field);
        }
    }

    ret.validate()?;
    Ok(ret)
}
