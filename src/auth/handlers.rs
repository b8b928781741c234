use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RefreshRequest, ServiceStatus, SessionPayload,
            SessionUser, SignupRequest, UpdateProfileRequest, UserPayload,
        },
        repo,
        repo_types::{NewUser, Role, User},
        services::{
            clear_session_cookie, hash_password, session_cookie, validate_signup,
            verify_password, AuthUser, JwtKeys,
        },
    },
    error::{is_unique_violation, AppError, AppResult},
    extract::AppJson,
    response::{created, ok, ok_msg, ApiResponse, Empty},
    state::AppState,
};

type SetCookie = [(header::HeaderName, String); 1];

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/health", get(health))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/profile", get(get_profile).put(update_profile))
        .route("/auth/check", get(check))
}

fn issue_tokens(state: &AppState, user: User) -> AppResult<(SetCookie, AuthResponse)> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.user_id)?;
    let refresh_token = keys.sign_refresh(user.user_id)?;
    let cookie = session_cookie(&access_token, keys.access_ttl, state.config.cookie.secure);
    Ok((
        [(header::SET_COOKIE, cookie)],
        AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
        },
    ))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, SetCookie, Json<ApiResponse<AuthResponse>>)> {
    if let Err(e) = validate_signup(&mut payload) {
        warn!(error = %e, "signup rejected");
        return Err(e);
    }
    let role = payload.role.unwrap_or(Role::Customer);

    if User::exists(&state.db, &payload.email, &payload.username).await? {
        warn!(email = %payload.email, "user already exists");
        return Err(AppError::Conflict(
            "User with this email or username already exists".into(),
        ));
    }

    let hash = hash_password(&payload.password)?;

    let mut tx = state.db.begin().await?;
    let created_user = User::create(
        &mut *tx,
        &NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &hash,
            phone_number: payload.phone_number.as_deref(),
            address: payload.address.as_deref(),
            role,
        },
    )
    .await;
    let user = match created_user {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "User with this email or username already exists".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    if role == Role::Supplier {
        let name = payload
            .supplier_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&user.username);
        repo::create_supplier(&mut *tx, &user, name).await?;
    }
    tx.commit().await?;

    info!(user_id = %user.user_id, email = %user.email, role = ?role, "user registered");
    let (cookie, body) = issue_tokens(&state, user)?;
    let (status, json) = created("User created successfully", body);
    Ok((status, cookie, json))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<(SetCookie, Json<ApiResponse<AuthResponse>>)> {
    let identifier = payload.identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::bad_request("Email or username is required"));
    }
    if payload.password.is_empty() {
        return Err(AppError::bad_request("Password is required"));
    }

    let user = match User::find_by_identifier(&state.db, identifier).await? {
        Some(u) => u,
        None => {
            warn!(%identifier, "login unknown identifier");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.user_id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    User::touch(&state.db, user.user_id).await?;

    info!(user_id = %user.user_id, "user logged in");
    let (cookie, body) = issue_tokens(&state, user)?;
    Ok((cookie, ok_msg("Login successful", body)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> AppResult<(SetCookie, Json<ApiResponse<AuthResponse>>)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let (cookie, body) = issue_tokens(&state, user)?;
    Ok((cookie, ok(body)))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> (SetCookie, Json<ApiResponse<Empty>>) {
    info!(%user_id, "user logged out");
    (
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.config.cookie.secure),
        )],
        ok_msg("Logout successful", Empty {}),
    )
}

async fn load_user(state: &AppState, user_id: uuid::Uuid) -> AppResult<User> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<UserPayload>>> {
    let user = load_user(&state, user_id).await?;
    Ok(ok(UserPayload { user: user.into() }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserPayload>>> {
    if payload.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    if let Some(name) = username {
        if name.chars().count() < 3 {
            return Err(AppError::bad_request(
                "Username must be at least 3 characters long",
            ));
        }
        if User::username_taken_by_other(&state.db, name, user_id).await? {
            return Err(AppError::Conflict("Username is already taken".into()));
        }
    }

    let updated = User::update_profile(
        &state.db,
        user_id,
        username,
        payload.phone_number.as_deref(),
        payload.address.as_deref(),
    )
    .await;
    let user: PublicUser = match updated {
        Ok(Some(u)) => u.into(),
        Ok(None) => return Err(AppError::not_found("User not found")),
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("Username is already taken".into()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(ok_msg("Profile updated successfully", UserPayload { user }))
}

#[instrument(skip(state))]
pub async fn check(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<SessionPayload>>> {
    let user = load_user(&state, user_id).await?;
    Ok(ok_msg(
        "User is authenticated",
        SessionPayload {
            user: SessionUser {
                id: user.user_id,
                username: user.username,
                email: user.email,
                role: user.role,
            },
        },
    ))
}

pub async fn health() -> Json<ApiResponse<ServiceStatus>> {
    ok_msg(
        "Auth service is running",
        ServiceStatus {
            timestamp: OffsetDateTime::now_utc(),
        },
    )
}
