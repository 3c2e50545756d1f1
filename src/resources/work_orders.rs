//! Maintenance work orders (TCFOSCAB)

use crate::core::field::FieldKind;
use crate::core::filter::SortSpecification;
use crate::core::resource::{PaginationStrategy, ResourceSchema};
use crate::resources::Resource;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Work order header.
///
/// `status` is `A` (open), `E` (in progress), `F` (finished) or `R`
/// (reopened); `kind` is `I` (internal) or `E` (external).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub id: Option<i64>,
    pub status: Option<String>,
    pub kind: Option<String>,
    pub maintenance: Option<String>,
    pub vehicle_id: Option<i64>,
    pub partner_id: Option<i64>,
    pub asset_code: Option<String>,
    pub mileage: Option<f64>,
    pub created_at: Option<NaiveDateTime>,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub due_at: Option<NaiveDateTime>,
}

impl Resource for WorkOrder {
    fn resource_name() -> &'static str {
        "work-orders"
    }

    fn schema() -> ResourceSchema {
        ResourceSchema::new(Self::resource_name(), "TCFOSCAB", "id")
            .field("NUOS", "id", FieldKind::Integer)
            .field("STATUS", "status", FieldKind::Text)
            .field("TIPO", "kind", FieldKind::Text)
            .field("MANUTENCAO", "maintenance", FieldKind::Text)
            .field("CODVEICULO", "vehicleId", FieldKind::Integer)
            .field("CODPARC", "partnerId", FieldKind::Integer)
            .field("CODBEM", "assetCode", FieldKind::Text)
            .field("KM", "mileage", FieldKind::Decimal)
            .field("DTABERTURA", "createdAt", FieldKind::DateTime)
            .field("DATAINI", "startedAt", FieldKind::DateTime)
            .field("DATAFIN", "finishedAt", FieldKind::DateTime)
            .field("PREVISAO", "dueAt", FieldKind::DateTime)
            .filterable(&[
                "id",
                "status",
                "kind",
                "maintenance",
                "vehicleId",
                "partnerId",
                "createdAt",
                "finishedAt",
            ])
            .sortable(&["id", "status", "createdAt", "finishedAt", "dueAt"])
            .searchable(&["assetCode"])
            .default_sort(SortSpecification::desc("createdAt"))
            // Open work orders are a small set; the listing is sliced locally.
            .pagination(PaginationStrategy::FetchAllThenSlice { max_rows: 2000 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapper::{RowMapper, UpstreamRow};
    use serde_json::json;

    #[test]
    fn test_maps_an_upstream_row() {
        let schema = WorkOrder::schema();
        let row: UpstreamRow = serde_json::from_value(json!({
            "NUOS": 51234,
            "STATUS": "E",
            "TIPO": "I ",
            "MANUTENCAO": "C",
            "CODVEICULO": "310",
            "CODPARC": null,
            "KM": "120500.5",
            "DTABERTURA": "10/01/2024 08:30:00",
            "DATAINI": "2024-01-10 09:00:00",
            "DATAFIN": ""
        }))
        .unwrap();

        let order: WorkOrder = RowMapper::new(&schema.fields).map(&row).unwrap();
        assert_eq!(order.id, Some(51234));
        assert_eq!(order.kind.as_deref(), Some("I"));
        assert_eq!(order.vehicle_id, Some(310));
        assert_eq!(order.partner_id, None);
        assert_eq!(order.mileage, Some(120500.5));
        assert_eq!(
            order.created_at.map(|dt| dt.to_string()),
            Some("2024-01-10 08:30:00".to_string())
        );
        assert_eq!(order.finished_at, None);
    }
}
