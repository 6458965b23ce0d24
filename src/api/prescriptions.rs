use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::domain::{validate_name, validate_quantity, validate_rate, PrescriptionView};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub quantity: f64,
    pub rate: f64,
}

/// Partial update. Absent fields are left alone; an explicit `0` is applied.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub quantity: Option<f64>,
    pub rate: Option<f64>,
}

pub async fn list_prescriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let prescriptions = state.store.read_all().await?;
    let names = prescriptions.into_iter().map(|p| p.name).collect();
    Ok(Json(names))
}

pub async fn get_prescription(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PrescriptionView>, AppError> {
    let prescription = state.store.read(&name).await?;
    Ok(Json(prescription.view(state.store.now())))
}

pub async fn create_prescription(
    Path(name): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PrescriptionView>), AppError> {
    let Json(body) = payload?;
    validate_name(&name)?;
    validate_quantity(body.quantity)?;
    validate_rate(body.rate)?;

    let prescription = state
        .store
        .create(&name, body.quantity, body.rate)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(prescription.view(state.store.now())),
    ))
}

pub async fn update_prescription(
    Path(name): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<PrescriptionView>, AppError> {
    let Json(body) = payload?;
    if let Some(quantity) = body.quantity {
        validate_quantity(quantity)?;
    }
    if let Some(rate) = body.rate {
        validate_rate(rate)?;
    }

    if let Some(quantity) = body.quantity {
        state.store.update_quantity(&name, quantity).await?;
    }
    if let Some(rate) = body.rate {
        state.store.update_rate(&name, rate).await?;
    }

    let prescription = state.store.read(&name).await?;
    Ok(Json(prescription.view(state.store.now())))
}

pub async fn delete_prescription(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.store.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
