use crate::spapi::{SpApiClient, SpApiError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const INVENTORY_SUMMARIES: &str = "/fba/inventory/v1/summaries";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(default)]
    pub fnsku: Option<String>,
    #[serde(default)]
    pub seller_sku: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub total_quantity_on_hand: Option<i64>,
    #[serde(default)]
    pub total_quantity: Option<i64>,
    #[serde(default)]
    pub inventory_details: Option<InventoryDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDetails {
    #[serde(default)]
    pub fulfillable_quantity: Option<i64>,
    #[serde(default)]
    pub inbound_working_quantity: Option<i64>,
    #[serde(default)]
    pub inbound_shipped_quantity: Option<i64>,
    #[serde(default)]
    pub inbound_receiving_quantity: Option<i64>,
    /// Either a plain count or `{ totalReservedQuantity, ... }`.
    #[serde(default)]
    pub reserved_quantity: Option<Value>,
    /// Either a plain count or `{ totalResearchingQuantity, ... }`.
    #[serde(default)]
    pub researching_quantity: Option<Value>,
}

/// Current-stock row as served by `/inventory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRow {
    pub asin: String,
    pub sku: String,
    pub fnsku: String,
    pub condition: String,
    pub total_quantity: i64,
    pub fulfillable_qty: i64,
    pub inbound_qty: i64,
    pub reserved_qty: i64,
    pub researching_qty: i64,
}

impl From<InventorySummary> for InventoryRow {
    fn from(row: InventorySummary) -> Self {
        let details = row.inventory_details.unwrap_or_default();
        Self {
            asin: first_text([row.asin]),
            sku: first_text([row.seller_sku, row.sku]),
            fnsku: first_text([row.fnsku]),
            condition: first_text([row.condition]),
            total_quantity: first_count([row.total_quantity_on_hand, row.total_quantity]),
            fulfillable_qty: first_count([details.fulfillable_quantity]),
            inbound_qty: first_count([
                details.inbound_working_quantity,
                details.inbound_shipped_quantity,
                details.inbound_receiving_quantity,
            ]),
            reserved_qty: nested_count(details.reserved_quantity.as_ref(), "totalReservedQuantity"),
            researching_qty: nested_count(
                details.researching_quantity.as_ref(),
                "totalResearchingQuantity",
            ),
        }
    }
}

fn first_text<const N: usize>(candidates: [Option<String>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn first_count<const N: usize>(candidates: [Option<i64>; N]) -> i64 {
    candidates
        .into_iter()
        .flatten()
        .find(|value| *value != 0)
        .unwrap_or(0)
}

fn nested_count(value: Option<&Value>, total_key: &str) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::Object(map)) => map.get(total_key).and_then(Value::as_i64).unwrap_or(0),
        _ => 0,
    }
}

/// Accepts `{payload: {inventorySummaries}}`, `{inventorySummaries}` or a bare array.
fn summaries_from_body(body: Value) -> Result<Vec<InventorySummary>, SpApiError> {
    let payload = match body {
        Value::Object(mut map) if map.contains_key("payload") => {
            map.remove("payload").unwrap_or(Value::Null)
        }
        other => other,
    };
    let rows = match payload {
        Value::Object(mut map) => map.remove("inventorySummaries").unwrap_or(Value::Null),
        other => other,
    };
    match rows {
        Value::Null => Ok(Vec::new()),
        rows => serde_json::from_value(rows).map_err(|err| SpApiError::Deserialize(err.to_string())),
    }
}

impl SpApiClient {
    /// Marketplace-level FBA stock with per-status details.
    pub async fn inventory_summaries(&self) -> Result<Vec<InventoryRow>, SpApiError> {
        let marketplace = self.marketplace_id().to_string();
        let url = self.url(INVENTORY_SUMMARIES);
        let query = [
            ("details", "true"),
            ("granularityType", "Marketplace"),
            ("granularityId", marketplace.as_str()),
            ("marketplaceIds", marketplace.as_str()),
        ];
        let body: Value = self
            .send_json("getInventorySummaries", |http| http.get(&url).query(&query))
            .await?;
        Ok(summaries_from_body(body)?
            .into_iter()
            .map(InventoryRow::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spapi::test_support::client_for;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    #[test]
    fn rows_are_renamed_with_fallbacks() {
        let summary: InventorySummary = serde_json::from_value(json!({
            "asin": "B0TEST",
            "fnsku": "X00TEST",
            "sellerSku": "",
            "sku": "MY-SKU",
            "condition": "NewItem",
            "totalQuantity": 42,
            "inventoryDetails": {
                "fulfillableQuantity": 30,
                "inboundWorkingQuantity": 0,
                "inboundShippedQuantity": 5,
                "inboundReceivingQuantity": 2,
                "reservedQuantity": {"totalReservedQuantity": 4, "pendingCustomerOrderQuantity": 4},
                "researchingQuantity": 3
            }
        }))
        .unwrap();
        let row = InventoryRow::from(summary);
        assert_eq!(
            row,
            InventoryRow {
                asin: "B0TEST".into(),
                sku: "MY-SKU".into(),
                fnsku: "X00TEST".into(),
                condition: "NewItem".into(),
                total_quantity: 42,
                fulfillable_qty: 30,
                inbound_qty: 5,
                reserved_qty: 4,
                researching_qty: 3,
            }
        );
    }

    #[test]
    fn sparse_rows_default_to_empty_and_zero() {
        let row = InventoryRow::from(InventorySummary::default());
        assert_eq!(row.sku, "");
        assert_eq!(row.total_quantity, 0);
        assert_eq!(row.reserved_qty, 0);
    }

    #[test]
    fn body_shapes_are_all_accepted() {
        let wrapped = json!({"payload": {"inventorySummaries": [{"asin": "A"}]}});
        let bare = json!({"inventorySummaries": [{"asin": "A"}, {"asin": "B"}]});
        let list = json!([{"asin": "A"}]);
        assert_eq!(summaries_from_body(wrapped).unwrap().len(), 1);
        assert_eq!(summaries_from_body(bare).unwrap().len(), 2);
        assert_eq!(summaries_from_body(list).unwrap().len(), 1);
        assert!(summaries_from_body(json!({"payload": {}})).unwrap().is_empty());
    }

    #[tokio::test]
    async fn inventory_summaries_queries_marketplace_granularity() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/fba/inventory/v1/summaries"))
            .and(query_param("granularityType", "Marketplace"))
            .and(query_param("granularityId", "A21TJRUUN4KGV"))
            .and(query_param("details", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": {
                    "granularity": {"granularityType": "Marketplace", "granularityId": "A21TJRUUN4KGV"},
                    "inventorySummaries": [
                        {"asin": "B01", "sellerSku": "SKU-1", "fnsku": "X01", "totalQuantity": 7}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rows = client.inventory_summaries().await.expect("inventory");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "SKU-1");
        assert_eq!(rows[0].total_quantity, 7);
    }
}
