// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{auth::Auth, models::Department};

/// Law enforcement agency known to the portal.
#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentInfo {
    pub id: Department,
    pub name: &'static str,
    pub description: &'static str,
}

#[utoipa::path(
    get,
    path = "/api/departments",
    tag = "Departments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Departments", body = Vec<DepartmentInfo>)
    )
)]
pub async fn list_departments(Auth(_user): Auth) -> Json<Vec<DepartmentInfo>> {
    Json(
        Department::ALL
            .iter()
            .map(|d| DepartmentInfo {
                id: *d,
                name: d.display_name(),
                description: d.description(),
            })
            .collect(),
    )
}
