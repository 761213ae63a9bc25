mod common;

use common::{actor, memory_state, register};
use marketplace_api::{
    dto::seller_applications::{ApplyRequest, DecisionRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::{ApplicationStatus, Role},
    services::{account_service, seller_service},
    store::AccountStore,
};
use uuid::Uuid;

fn acme() -> ApplyRequest {
    ApplyRequest {
        business_name: "Acme".into(),
        business_type: Some("retail".into()),
        tax_id: Some("TX-1".into()),
        business_address: Some("2 Market Rd".into()),
    }
}

fn notes(text: &str) -> DecisionRequest {
    DecisionRequest {
        notes: Some(text.into()),
    }
}

#[tokio::test]
async fn approval_promotes_applicant_to_seller() {
    let (state, _) = memory_state();
    let user = register(&state, "acme@example.com").await;
    assert_eq!(user.role, Role::Customer);
    let applicant = AuthUser::new(user.id, user.role);
    let admin = actor(Role::Admin);

    let application = seller_service::apply(&state, &applicant, acme())
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Pending);

    let pending = seller_service::list_applications(&state, &admin, Some(ApplicationStatus::Pending))
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(pending.items.len(), 1);

    let approved = seller_service::approve(&state, &admin, application.id, notes("ok"))
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(approved.status, ApplicationStatus::Approved);
    assert_eq!(approved.admin_notes.as_deref(), Some("ok"));

    let me = account_service::me(&state, &applicant)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(me.role, Role::Seller);

    let pending = seller_service::list_applications(&state, &admin, Some(ApplicationStatus::Pending))
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(pending.items.is_empty());
}

#[tokio::test]
async fn rejection_keeps_customer_role_and_blocks_reapplying() {
    let (state, store) = memory_state();
    let user = register(&state, "reject@example.com").await;
    let applicant = AuthUser::new(user.id, user.role);
    let admin = actor(Role::Admin);

    let application = seller_service::apply(&state, &applicant, acme())
        .await
        .unwrap()
        .data
        .unwrap();
    let rejected = seller_service::reject(&state, &admin, application.id, notes("incomplete"))
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(rejected.status, ApplicationStatus::Rejected);

    let stored = store.find_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Customer);

    let err = seller_service::apply(&state, &applicant, acme())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn decisions_and_listings_are_admin_only() {
    let (state, _) = memory_state();
    let user = register(&state, "gate@example.com").await;
    let applicant = AuthUser::new(user.id, user.role);
    let application = seller_service::apply(&state, &applicant, acme())
        .await
        .unwrap()
        .data
        .unwrap();

    for outsider in [applicant, actor(Role::Seller)] {
        let err = seller_service::approve(&state, &outsider, application.id, notes("self"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = seller_service::list_applications(&state, &outsider, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    let err = seller_service::approve(
        &state,
        &actor(Role::Admin),
        Uuid::new_v4(),
        DecisionRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn approval_is_all_or_nothing_when_applicant_is_missing() {
    let (state, store) = memory_state();
    let ghost = actor(Role::Customer);
    let application = seller_service::apply(&state, &ghost, acme())
        .await
        .unwrap()
        .data
        .unwrap();

    let err = seller_service::approve(&state, &actor(Role::Admin), application.id, notes("ok"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let unchanged = store.find_application(application.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, ApplicationStatus::Pending);
    assert_eq!(unchanged.admin_notes, None);
}

#[tokio::test]
async fn blank_business_name_is_rejected() {
    let (state, _) = memory_state();
    let mut request = acme();
    request.business_name = "  ".into();
    let err = seller_service::apply(&state, &actor(Role::Customer), request)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}
