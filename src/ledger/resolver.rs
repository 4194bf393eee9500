use crate::models::{RawRecord, ResolvedIdentity};

/// Ledger report headers vary between generation runs; each semantic field is
/// looked up through its accepted spellings, first match wins.
pub const FNSKU_VARIANTS: &[&str] = &["FNSKU", "fnsku", "fnskuCode", "FnSku", "FNSKU Code"];

pub const ASIN_VARIANTS: &[&str] = &["ASIN", "asin", "Asin"];

pub const SKU_VARIANTS: &[&str] = &["SKU", "sku", "SellerSKU", "sellerSku", "MSKU", "msku"];

pub const LOCATION_VARIANTS: &[&str] = &[
    "fulfillmentCenterId",
    "FulfillmentCenterId",
    "Fulfillment Center",
    "fulfillment_center_id",
    "facility_id",
    "Facility",
];

pub const QUANTITY_VARIANTS: &[&str] = &[
    "Quantity",
    "quantity",
    "Qty",
    "Quantity Amount",
    "quantityAmount",
    "PostedQuantity",
    "postedQuantity",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow<'a> {
    pub identity: ResolvedIdentity,
    /// Raw quantity text, `None` when no variant carried a value.
    pub quantity: Option<&'a str>,
}

impl ResolvedRow<'_> {
    pub fn parsed_quantity(&self) -> Option<f64> {
        self.quantity.and_then(parse_quantity)
    }
}

/// Value of the first name in `names` that is present with a non-empty value.
pub fn first_present<'a>(record: &'a RawRecord, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| record.get(name))
        .find(|value| !value.is_empty())
}

pub fn resolve(record: &RawRecord) -> ResolvedRow<'_> {
    let field = |names: &[&str]| first_present(record, names).unwrap_or_default().to_string();
    ResolvedRow {
        identity: ResolvedIdentity {
            fnsku: field(FNSKU_VARIANTS),
            asin: field(ASIN_VARIANTS),
            sku: field(SKU_VARIANTS),
            location_id: field(LOCATION_VARIANTS),
        },
        quantity: first_present(record, QUANTITY_VARIANTS),
    }
}

/// Strips thousands separators and surrounding whitespace, then parses a
/// signed decimal. Blank and non-finite values are rejected.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}
