use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    database::ListQuery,
    error::AppError,
    models::{
        AuthUser, ChangePasswordRequest, CreateUserRequest, LoginRequest, TerminateUserRequest,
        UpdateUserRequest,
    },
    utils::{message_to_api_response, success_to_api_response},
    validation::ValidatedJson,
};

pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.create(req).await?;
    Ok((
        StatusCode::CREATED,
        success_to_api_response("User created successfully", user),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<impl IntoResponse, AppError> {
    let query = ListQuery::from_raw(raw.as_deref());
    let users = state.users.list(&query).await?;
    Ok(success_to_api_response("Users fetched successfully", users))
}

pub async fn find(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.find(id).await?;
    Ok(success_to_api_response("User fetched successfully", user))
}

pub async fn details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.details(id).await?;
    Ok(success_to_api_response("User fetched successfully", user))
}

pub async fn update(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.update(&actor, id, req).await?;
    Ok(success_to_api_response("User updated successfully", user))
}

pub async fn delete(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.users.delete(&actor, id).await?;
    Ok(message_to_api_response("User deleted successfully"))
}

pub async fn change_password(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.users.change_password(&actor, id, req).await?;
    Ok(message_to_api_response("Password changed successfully"))
}

pub async fn terminate(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<TerminateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.users.terminate(&actor, id, req).await?;
    Ok(message_to_api_response("User terminated successfully"))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.users.login(req).await?;
    Ok(success_to_api_response("Login successful", session))
}

/// Echoes the identity carried by the caller's token.
pub async fn me(actor: AuthUser) -> impl IntoResponse {
    success_to_api_response("Authenticated", actor)
}
