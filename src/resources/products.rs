//! Products (TGFPRO)

use crate::core::field::FieldKind;
use crate::core::filter::SortSpecification;
use crate::core::resource::{PaginationStrategy, ResourceSchema};
use crate::resources::Resource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Option<i64>,
    pub description: Option<String>,
    pub complement: Option<String>,
    pub reference: Option<String>,
    pub brand: Option<String>,
    pub group_id: Option<i64>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub gross_weight: Option<f64>,
    pub net_weight: Option<f64>,
    pub usage: Option<String>,
    pub active: Option<bool>,
}

impl Resource for Product {
    fn resource_name() -> &'static str {
        "products"
    }

    fn schema() -> ResourceSchema {
        ResourceSchema::new(Self::resource_name(), "TGFPRO", "id")
            .field("CODPROD", "id", FieldKind::Integer)
            .field("DESCRPROD", "description", FieldKind::Text)
            .field("COMPLDESC", "complement", FieldKind::Text)
            .field("REFERENCIA", "reference", FieldKind::Text)
            .field("MARCA", "brand", FieldKind::Text)
            .field("CODGRUPOPROD", "groupId", FieldKind::Integer)
            .field("CODVOL", "unit", FieldKind::Text)
            .field("LOCALIZACAO", "location", FieldKind::Text)
            .field("PESOBRUTO", "grossWeight", FieldKind::Decimal)
            .field("PESOLIQ", "netWeight", FieldKind::Decimal)
            .field("USOPROD", "usage", FieldKind::Text)
            .field("ATIVO", "active", FieldKind::Flag)
            .filterable(&[
                "id",
                "description",
                "reference",
                "brand",
                "groupId",
                "unit",
                "usage",
                "active",
            ])
            .sortable(&["id", "description", "reference", "brand", "groupId"])
            .searchable(&["description", "complement", "reference", "brand"])
            .default_sort(SortSpecification::asc("description"))
            .pagination(PaginationStrategy::CountThenFetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_fields_are_text_columns() {
        let schema = Product::schema();
        for field in &schema.search_fields {
            assert_eq!(schema.mapping(field).map(|m| m.kind), Some(FieldKind::Text));
        }
    }
}
