use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::auth::password::{hash_password, verify_password};
use crate::error::ApiError;
use crate::model::user::PublicUser;
use crate::store::users::{NewUser, UserStore};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "jdoe@company.com", format = "email")]
    pub email: String,
    #[schema(example = "s3cret")]
    pub password: String,
    #[schema(example = "John Doe")]
    pub full_name: String,
    #[schema(example = "EMP-001")]
    pub employee_code: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "s3cret")]
    pub password: String,
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "success": true,
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing required field"),
        (status = 409, description = "Username or email already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn register(
    users: web::Data<UserStore>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let username = payload.username.trim();

    if username.is_empty() || payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::InvalidArgument(
            "username, email and password must not be empty".into(),
        ));
    }

    if !users.username_available(username).await {
        return Err(ApiError::Conflict("username already taken".into()));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Storage("password hashing failed".into())
    })?;

    let new_user = NewUser {
        username: username.to_string(),
        email: payload.email.trim().to_string(),
        password_hash,
        full_name: payload.full_name.trim().to_string(),
        employee_code: payload.employee_code.clone(),
    };

    // unique keys are the backstop behind the availability check
    let id = users.insert(&new_user).await?;

    info!(user_id = id, username, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User registered successfully",
        "user": PublicUser {
            id,
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            employee_code: new_user.employee_code,
        }
    })))
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = Object, example = json!({
            "success": true,
            "message": "Login successful"
        })),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(users, payload), fields(username = %payload.username))]
pub async fn login(
    users: web::Data<UserStore>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::InvalidArgument(
            "username and password are required".into(),
        ));
    }

    let user = users
        .find_by_username(payload.username.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    if verify_password(&payload.password, &user.password).is_err() {
        info!("Invalid credentials: password mismatch");
        return Ok(HttpResponse::Unauthorized().json(json!({
            "success": false,
            "message": "Invalid credentials"
        })));
    }

    users.touch_last_login(user.id).await;

    info!(user_id = user.id, "Login successful");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "user": PublicUser::from(user),
    })))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    params(
        ("user_id", Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = PublicUser),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users"
)]
pub async fn get_user(
    users: web::Data<UserStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user = users.require(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user,
    })))
}

/// List all users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All users", body = Object, example = json!({
            "success": true,
            "total_users": 1
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users"
)]
pub async fn list_users(users: web::Data<UserStore>) -> Result<HttpResponse, ApiError> {
    let all = users.list().await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "total_users": all.len(),
        "users": all,
    })))
}

/// Delete a user (administrative; does not touch attendance history)
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    params(
        ("user_id", Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted", body = Object, example = json!({
            "success": true,
            "message": "User deleted successfully"
        })),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users"
)]
pub async fn delete_user(
    users: web::Data<UserStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();

    let user = users
        .delete(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user_id)))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User deleted successfully",
        "user": user,
    })))
}
