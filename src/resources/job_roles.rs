//! Job roles (TFPCAR)

use crate::core::field::FieldKind;
use crate::core::filter::SortSpecification;
use crate::core::resource::{PaginationStrategy, ResourceSchema, SortPolicy};
use crate::resources::Resource;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRole {
    pub id: Option<i64>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub group_id: Option<i64>,
    pub career_id: Option<i64>,
    pub cbo_code: Option<i64>,
    pub responsibilities: Option<String>,
    pub notes: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Resource for JobRole {
    fn resource_name() -> &'static str {
        "job-roles"
    }

    fn schema() -> ResourceSchema {
        ResourceSchema::new(Self::resource_name(), "TFPCAR", "id")
            .field("CODCARGO", "id", FieldKind::Integer)
            .field("DESCRCARGO", "description", FieldKind::Text)
            .field("ATIVO", "active", FieldKind::Flag)
            .field("CODGRUPOCARGO", "groupId", FieldKind::Integer)
            .field("CODCARREIRA", "careerId", FieldKind::Integer)
            .field("CODCBO", "cboCode", FieldKind::Integer)
            .field("RESPONSABILIDADES", "responsibilities", FieldKind::Text)
            .field("OBS", "notes", FieldKind::Text)
            .field("DTALTER", "updatedAt", FieldKind::DateTime)
            .filterable(&["id", "description", "active", "groupId", "careerId"])
            .sortable(&["id", "description", "updatedAt"])
            .searchable(&["description"])
            .default_sort(SortSpecification::asc("description"))
            .sort_policy(SortPolicy::Reject)
            .pagination(PaginationStrategy::CountThenFetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapper::RowMapper;
    use serde_json::json;

    #[test]
    fn test_record_round_trips_through_the_mapping() {
        let schema = JobRole::schema();
        let mapper = RowMapper::new(&schema.fields);
        let role = json!({
            "id": 12,
            "description": "MECANICO",
            "active": true,
            "groupId": 3
        });

        let row = mapper.to_row(&role);
        assert_eq!(row["ATIVO"], json!("S"));
        assert_eq!(row["OBS"], json!(null));

        let back: JobRole = mapper.map(&row).unwrap();
        assert_eq!(back.id, Some(12));
        assert_eq!(back.description.as_deref(), Some("MECANICO"));
        assert_eq!(back.active, Some(true));
        assert_eq!(back.group_id, Some(3));
        assert_eq!(back.notes, None);
    }
}
