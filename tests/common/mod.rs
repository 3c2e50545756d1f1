//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::{Duration, Utc};
use erp_gateway::prelude::*;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};

fn row(value: Value) -> UpstreamRow {
    serde_json::from_value(value).expect("fixture row")
}

/// 25 work orders in progress (`E`) and 5 finished (`F`), opened one day
/// apart starting 2024-01-01
pub fn work_order_rows() -> Vec<UpstreamRow> {
    (1..=30)
        .map(|n: i64| {
            let finished = n > 25;
            let status = if finished { "F" } else { "E" };
            let kind = if n % 2 == 0 { "I" } else { "E" };
            let finished_at = if finished {
                json!(format!("2024-02-{:02} 17:00:00", n - 25))
            } else {
                json!("")
            };
            row(json!({
                "NUOS": 1000 + n,
                "STATUS": status,
                "TIPO": kind,
                "MANUTENCAO": "C",
                "CODVEICULO": 300 + n % 4,
                "CODPARC": null,
                "CODBEM": format!("BEM-{:03}     ", n),
                "KM": format!("{}.0", 1000 * n),
                "DTABERTURA": format!("2024-01-{:02} 08:00:00", n),
                "DATAINI": null,
                "DATAFIN": finished_at,
                "PREVISAO": null
            }))
        })
        .collect()
}

pub fn product_rows() -> Vec<UpstreamRow> {
    [
        (1, "PARAFUSO M8", "O'Brien", "S"),
        (2, "PORCA M8", "O'Brien & Sons", "S"),
        (3, "ARRUELA", "Brien", "N"),
        (4, "FILTRO OLEO", "ACME", "S"),
    ]
    .into_iter()
    .map(|(id, description, brand, active)| {
        row(json!({
            "CODPROD": id,
            "DESCRPROD": format!("{}   ", description),
            "COMPLDESC": null,
            "REFERENCIA": format!("REF-{}", id),
            "MARCA": brand,
            "CODGRUPOPROD": 10,
            "CODVOL": "UN",
            "LOCALIZACAO": "",
            "PESOBRUTO": "0.25",
            "PESOLIQ": 0.2,
            "USOPROD": "R",
            "ATIVO": active
        }))
    })
    .collect()
}

pub fn job_role_rows() -> Vec<UpstreamRow> {
    (1..=12)
        .map(|n: i64| {
            let active = if n % 3 == 0 { "N" } else { "S" };
            row(json!({
                "CODCARGO": n,
                "DESCRCARGO": format!("CARGO {:02}", n),
                "ATIVO": active,
                "CODGRUPOCARGO": n % 2,
                "CODCARREIRA": null,
                "CODCBO": null,
                "RESPONSABILIDADES": null,
                "OBS": null,
                "DTALTER": "2023-12-01 00:00:00"
            }))
        })
        .collect()
}

/// Executor seeded with every built-in table
pub fn seeded_executor() -> InMemoryExecutor {
    InMemoryExecutor::new()
        .with_table("TCFOSCAB", work_order_rows())
        .with_table("TGFPRO", product_rows())
        .with_table("TFPCAR", job_role_rows())
}

/// HS256 token with `exp` offset from now; the gateway never checks the
/// signature
pub fn jwt_expiring_in(seconds: i64) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": "integration",
        "iat": (now - Duration::minutes(5)).timestamp(),
        "exp": (now + Duration::seconds(seconds)).timestamp(),
    });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"upstream-secret"),
    )
    .expect("encode token")
}

pub fn credential() -> CredentialContext {
    CredentialContext::new(jwt_expiring_in(3600)).expect("credential")
}

pub fn service<T: Resource>(executor: &InMemoryExecutor) -> EntityQueryService<T> {
    EntityQueryService::new(Arc::new(T::schema()), Arc::new(executor.clone()), 5000)
}
