use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::seller_applications::{ApplicationList, ApplyRequest, DecisionRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ApplicationStatus, SellerApplication},
    policy,
    response::{ApiResponse, Meta},
    state::AppState,
    store::ApplicationDecision,
};

/// One application per user, whatever the state of the earlier one.
pub async fn apply(
    state: &AppState,
    user: &AuthUser,
    payload: ApplyRequest,
) -> AppResult<ApiResponse<SellerApplication>> {
    if payload.business_name.trim().is_empty() {
        return Err(AppError::BadRequest("business_name is required".into()));
    }
    if state.accounts.application_exists_for(user.user_id).await? {
        return Err(AppError::Conflict(
            "seller application already exists".into(),
        ));
    }

    let now = Utc::now();
    let application = SellerApplication {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        business_name: payload.business_name,
        business_type: payload.business_type,
        tax_id: payload.tax_id,
        business_address: payload.business_address,
        status: ApplicationStatus::Pending,
        admin_notes: None,
        created_at: now,
        updated_at: now,
    };
    let application = state.accounts.insert_application(application).await?;

    tracing::info!(application_id = %application.id, user_id = %user.user_id, "seller application submitted");
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        "seller_application_create",
        "seller_applications",
        json!({ "application_id": application.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Application submitted",
        application,
        Some(Meta::empty()),
    ))
}

pub async fn list_applications(
    state: &AppState,
    user: &AuthUser,
    status: Option<ApplicationStatus>,
) -> AppResult<ApiResponse<ApplicationList>> {
    policy::can_decide_application(user)?;
    let items = state.accounts.list_applications(status).await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success(
        "Seller applications",
        ApplicationList { items },
        Some(meta),
    ))
}

/// Approve and promote the applicant to SELLER in one unit of work.
pub async fn approve(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: DecisionRequest,
) -> AppResult<ApiResponse<SellerApplication>> {
    decide(state, user, id, ApplicationStatus::Approved, payload.notes).await
}

pub async fn reject(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: DecisionRequest,
) -> AppResult<ApiResponse<SellerApplication>> {
    decide(state, user, id, ApplicationStatus::Rejected, payload.notes).await
}

async fn decide(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    status: ApplicationStatus,
    notes: Option<String>,
) -> AppResult<ApiResponse<SellerApplication>> {
    policy::can_decide_application(user)?;

    let decision = ApplicationDecision {
        application_id: id,
        status,
        admin_notes: notes,
        promote_applicant: status == ApplicationStatus::Approved,
        decided_at: Utc::now(),
    };
    let application = state
        .accounts
        .decide_application(decision)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(
        application_id = %id,
        applicant_id = %application.user_id,
        status = status.as_str(),
        "seller application decided"
    );
    let action = match status {
        ApplicationStatus::Approved => "seller_application_approve",
        _ => "seller_application_reject",
    };
    audit::record(
        state.audit.as_ref(),
        Some(user.user_id),
        action,
        "seller_applications",
        json!({ "application_id": id, "applicant_id": application.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        match status {
            ApplicationStatus::Approved => "Application approved",
            _ => "Application rejected",
        },
        application,
        Some(Meta::empty()),
    ))
}
