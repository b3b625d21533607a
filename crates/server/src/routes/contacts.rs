use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    contact::{Contact, ContactError, ContactFilter, CreateContact, UpdateContact},
    interaction::{CreateInteraction, Interaction, InteractionError},
};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_contact_middleware};

pub async fn get_contacts(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ContactFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Contact>>>, ApiError> {
    let contacts = Contact::find_all(&deployment.db().pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(contacts)))
}

pub async fn get_contact(
    Extension(contact): Extension<Contact>,
) -> Result<ResponseJson<ApiResponse<Contact>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(contact)))
}

pub async fn create_contact(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateContact>,
) -> Result<ResponseJson<ApiResponse<Contact>>, ApiError> {
    let contact = Contact::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    tracing::info!(
        contact_id = %contact.id,
        contact_type = %contact.contact_type,
        "Created contact"
    );
    Ok(ResponseJson(ApiResponse::success(contact)))
}

pub async fn update_contact(
    Extension(existing): Extension<Contact>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateContact>,
) -> Result<ResponseJson<ApiResponse<Contact>>, ApiError> {
    let contact = Contact::update(&deployment.db().pool, existing.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(contact)))
}

pub async fn delete_contact(
    Extension(contact): Extension<Contact>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Contact::delete(&deployment.db().pool, contact.id).await?;
    if rows_affected == 0 {
        Err(ContactError::ContactNotFound.into())
    } else {
        Ok(ResponseJson(ApiResponse::success(())))
    }
}

pub async fn get_contact_interactions(
    Extension(contact): Extension<Contact>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Interaction>>>, ApiError> {
    let interactions = Interaction::find_by_contact(&deployment.db().pool, contact.id).await?;
    Ok(ResponseJson(ApiResponse::success(interactions)))
}

pub async fn create_contact_interaction(
    Extension(contact): Extension<Contact>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateInteraction>,
) -> Result<ResponseJson<ApiResponse<Interaction>>, ApiError> {
    let interaction =
        Interaction::create(&deployment.db().pool, contact.id, &payload, Uuid::new_v4()).await?;
    tracing::debug!(
        contact_id = %contact.id,
        interaction_id = %interaction.id,
        "Logged interaction"
    );
    Ok(ResponseJson(ApiResponse::success(interaction)))
}

pub async fn delete_interaction(
    State(deployment): State<DeploymentImpl>,
    Path(interaction_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Interaction::delete(&deployment.db().pool, interaction_id).await?;
    if rows_affected == 0 {
        Err(InteractionError::InteractionNotFound.into())
    } else {
        Ok(ResponseJson(ApiResponse::success(())))
    }
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let contact_id_router = Router::new()
        .route(
            "/",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .route(
            "/interactions",
            get(get_contact_interactions).post(create_contact_interaction),
        )
        .layer(from_fn_with_state(
            deployment.clone(),
            load_contact_middleware::<DeploymentImpl>,
        ));

    let contacts_router = Router::new()
        .route("/", get(get_contacts).post(create_contact))
        .nest("/{contact_id}", contact_id_router);

    Router::new()
        .nest("/contacts", contacts_router)
        .route("/interactions/{interaction_id}", delete(delete_interaction))
}
