use crate::ledger::resolver::resolve;
use crate::models::{RawRecord, ResolvedIdentity, SummaryEntry};
use std::collections::HashMap;

/// Separator for the composite key; `|` never occurs in product or facility codes.
pub const KEY_SEPARATOR: char = '|';

pub fn composite_key(identity: &ResolvedIdentity) -> String {
    [
        identity.fnsku.as_str(),
        identity.asin.as_str(),
        identity.sku.as_str(),
        identity.location_id.as_str(),
    ]
    .join(&KEY_SEPARATOR.to_string())
}

/// Net movement per (fnsku, asin, sku, location), built fresh for every run.
#[derive(Debug, Default)]
pub struct Summary {
    index: HashMap<String, usize>,
    entries: Vec<SummaryEntry>,
}

impl Summary {
    pub fn add(&mut self, identity: ResolvedIdentity, quantity: f64) {
        let key = composite_key(&identity);
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].net_movement += quantity,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(SummaryEntry {
                    fnsku: identity.fnsku,
                    asin: identity.asin,
                    sku: identity.sku,
                    fulfillment_center_id: identity.location_id,
                    net_movement: quantity,
                });
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&SummaryEntry> {
        self.index.get(key).map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in first-seen order.
    pub fn into_entries(self) -> Vec<SummaryEntry> {
        self.entries
    }
}

impl FromIterator<(ResolvedIdentity, f64)> for Summary {
    fn from_iter<I: IntoIterator<Item = (ResolvedIdentity, f64)>>(iter: I) -> Self {
        let mut summary = Summary::default();
        for (identity, quantity) in iter {
            summary.add(identity, quantity);
        }
        summary
    }
}

/// Resolves every record and folds the ones with a numeric quantity.
pub fn summarize(records: &[RawRecord]) -> Summary {
    records
        .iter()
        .map(resolve)
        .filter_map(|row| {
            let quantity = row.parsed_quantity()?;
            Some((row.identity, quantity))
        })
        .collect()
}
