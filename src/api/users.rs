//! Registration, login and the current-user endpoint.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::auth::CurrentUser;
use crate::db::schema::UserRecord;
use crate::types::{Email, Username};

/// RealWorld wraps user payloads as `{"user": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope<T> {
    pub user: T,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserBody {
    pub email: String,
    pub token: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl UserBody {
    fn from_record(record: UserRecord, token: String) -> Self {
        Self {
            email: record.email,
            token,
            username: record.username,
            bio: record.bio,
            image: record.image,
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Unprocessable(format!("{} can't be blank", field)));
    }
    Ok(())
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::Unprocessable(rejection.body_text())
}

/// `POST /api/users`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<UserEnvelope<NewUser>>, JsonRejection>,
) -> Result<Json<UserEnvelope<UserBody>>, ApiError> {
    let Json(UserEnvelope { user }) = payload.map_err(bad_body)?;
    require("username", &user.username)?;
    require("email", &user.email)?;
    require("password", &user.password)?;

    let record = state
        .users
        .create_user(
            &Username::new(user.username.trim()),
            &Email::new(user.email.trim()),
            &user.password,
        )
        .await?;

    info!(user_id = record.id, "user registered");
    let token = state.gate.codec().encode(record.id.into())?;
    Ok(Json(UserEnvelope {
        user: UserBody::from_record(record, token),
    }))
}

/// `POST /api/users/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<UserEnvelope<LoginUser>>, JsonRejection>,
) -> Result<Json<UserEnvelope<UserBody>>, ApiError> {
    let Json(UserEnvelope { user }) = payload.map_err(bad_body)?;
    require("email", &user.email)?;
    require("password", &user.password)?;

    let record = state
        .users
        .verify_credentials(&Email::new(user.email.trim()), &user.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized {
            message: "invalid email or password".to_string(),
            detail: None,
        })?;

    let token = state.gate.codec().encode(record.id.into())?;
    Ok(Json(UserEnvelope {
        user: UserBody::from_record(record, token),
    }))
}

/// `GET /api/user`
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserEnvelope<UserBody>> {
    Json(UserEnvelope {
        user: UserBody {
            email: user.email().to_string(),
            token: user.token().to_string(),
            username: user.username().to_string(),
            bio: user.bio().map(str::to_string),
            image: user.image().map(str::to_string),
        },
    })
}
