//! Membership service: registration, login, profile, password management
//! and email/phone verification.

use super::{hash_blocking, required, verify_blocking};
use crate::auth::Subject;
use crate::error::ApiError;
use crate::state::MembersState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use lifedash_core::database::{Location, Member};
use lifedash_core::tokens::generate_verification_code;
use lifedash_core::{TokenKind, TokenService};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_PROFILE_IMAGE: &str = "default.jpg";

#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterMemberRequest {
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    pub email: String,
    pub location: LocationInput,
    pub password: String,
    pub profile_picture_url: Option<String>,
}

#[derive(Deserialize)]
pub struct MemberLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateMemberRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    pub profile_picture_url: Option<String>,
    pub location: Option<LocationInput>,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetConfirmRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

/// Member profile as returned by the API.
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    #[serde(flatten)]
    pub member: Member,
    pub location: Option<Location>,
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::BadRequest("Invalid email address".to_string())),
    }
}

fn load_member(conn: &Connection, email: &str) -> Result<Option<Member>, ApiError> {
    let member = conn
        .query_row(
            &format!("SELECT {} FROM members WHERE email = ?1", Member::COLUMNS),
            [email],
            Member::from_row,
        )
        .optional()?;
    Ok(member)
}

fn require_member(conn: &Connection, email: &str) -> Result<Member, ApiError> {
    load_member(conn, email)?.ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Find a location matching every field, creating it when absent.
fn find_or_create_location(conn: &Connection, input: &LocationInput) -> Result<i64, ApiError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT location_id FROM locations
             WHERE country = ?1 AND state IS ?2 AND city IS ?3 AND country_code IS ?4
               AND time_zone IS ?5",
            params![
                input.country,
                input.state,
                input.city,
                input.country_code,
                input.time_zone
            ],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO locations (country, state, city, country_code, time_zone)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            input.country,
            input.state,
            input.city,
            input.country_code,
            input.time_zone
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn member_response(conn: &Connection, member: Member) -> Result<MemberResponse, ApiError> {
    let location = match member.location_id {
        Some(id) => conn
            .query_row(
                &format!("SELECT {} FROM locations WHERE location_id = ?1", Location::COLUMNS),
                [id],
                Location::from_row,
            )
            .optional()?,
        None => None,
    };
    Ok(MemberResponse { member, location })
}

fn phone_taken(conn: &Connection, phone: &str, except_email: &str) -> Result<bool, ApiError> {
    let taken = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM members WHERE phone_number = ?1 AND email != ?2)",
        params![phone, except_email],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub async fn register(
    State(state): State<MembersState>,
    Json(req): Json<RegisterMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let email = normalize_email(&req.email)?;
    let first_name = required(Some(req.first_name), "first_name is required")?;
    let last_name = required(Some(req.last_name), "last_name is required")?;
    let mobile = required(Some(req.mobile), "mobile is required")?;
    let password = required(Some(req.password), "password is required")?;
    let password_hash = hash_blocking(password).await?;

    let email_code = generate_verification_code();
    let phone_code = generate_verification_code();
    let now = Utc::now();

    let response = {
        let conn = state.storage.conn()?;
        if load_member(&conn, &email)?.is_some() {
            return Err(ApiError::BadRequest("Email already registered".to_string()));
        }
        if phone_taken(&conn, &mobile, &email)? {
            return Err(ApiError::BadRequest("Mobile number already registered".to_string()));
        }

        let location_id = find_or_create_location(&conn, &req.location)?;
        conn.execute(
            "INSERT INTO members (email, role, first_name, last_name, phone_number, location_id,
                                  password_hash, profile_image_url, created_at)
             VALUES (?1, 'member', ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                email,
                first_name,
                last_name,
                mobile,
                location_id,
                password_hash,
                req.profile_picture_url
                    .unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string()),
                now
            ],
        )?;

        let tokens = TokenService::new(&conn);
        let ttl = state.tokens.code_ttl;
        tokens.store_code(&email, TokenKind::EmailVerification, &email_code, ttl, now)?;
        tokens.store_code(&email, TokenKind::PhoneVerification, &phone_code, ttl, now)?;

        let member = require_member(&conn, &email)?;
        member_response(&conn, member)?
    };

    state.notifier.send_email_code(&email, &email_code);
    state.notifier.send_phone_code(&mobile, &phone_code);
    tracing::info!(%email, "Member registered");

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<MembersState>,
    Json(req): Json<MemberLoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !state.login_limiter.check(&email) {
        tracing::warn!(%email, "Member login rate limited");
        return Err(ApiError::RateLimited);
    }

    let member = {
        let conn = state.storage.conn()?;
        load_member(&conn, &email)?
    };
    let invalid = || ApiError::BadRequest("Invalid credentials".to_string());
    let member = member.filter(|m| m.role == "member").ok_or_else(invalid)?;
    if !verify_blocking(req.password, member.password_hash.clone()).await? {
        return Err(invalid());
    }

    let access_token = state.jwt.issue(&member.email)?;
    Ok(Json(json!({
        "access_token": access_token,
        "token_type": "bearer",
    })))
}

pub async fn get_profile(
    State(state): State<MembersState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<MemberResponse>, ApiError> {
    let conn = state.storage.conn()?;
    let member = require_member(&conn, subject.email())?;
    Ok(Json(member_response(&conn, member)?))
}

pub async fn update_profile(
    State(state): State<MembersState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    let conn = state.storage.conn()?;
    let mut member = require_member(&conn, subject.email())?;

    if let Some(first_name) = req.first_name {
        member.first_name = required(Some(first_name), "first_name cannot be empty")?;
    }
    if let Some(last_name) = req.last_name {
        member.last_name = required(Some(last_name), "last_name cannot be empty")?;
    }
    if let Some(mobile) = req.mobile {
        if member.phone_number.as_deref() != Some(mobile.as_str()) {
            if phone_taken(&conn, &mobile, &member.email)? {
                return Err(ApiError::BadRequest("Mobile number already registered".to_string()));
            }
            member.phone_verified = false;
        }
        member.phone_number = Some(mobile);
    }
    if let Some(url) = req.profile_picture_url {
        member.profile_image_url = Some(url);
    }
    if let Some(location) = req.location {
        member.location_id = Some(find_or_create_location(&conn, &location)?);
    }

    conn.execute(
        "UPDATE members SET first_name = ?1, last_name = ?2, phone_number = ?3,
                            phone_verified = ?4, profile_image_url = ?5, location_id = ?6
         WHERE email = ?7",
        params![
            member.first_name,
            member.last_name,
            member.phone_number,
            member.phone_verified,
            member.profile_image_url,
            member.location_id,
            member.email
        ],
    )?;
    let member = require_member(&conn, subject.email())?;

    Ok(Json(member_response(&conn, member)?))
}

pub async fn reset_request(
    State(state): State<MembersState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let token = {
        let conn = state.storage.conn()?;
        match load_member(&conn, &email)? {
            Some(member) if member.role == "member" => {}
            _ => return Err(ApiError::NotFound("User not found".to_string())),
        }
        TokenService::new(&conn).create_reset_token(
            &email,
            state.tokens.reset_ttl,
            state.tokens.reset_bytes,
            Utc::now(),
        )?
    };

    state.notifier.send_reset_token(&email, &token);

    let mut body = json!({ "message": "Password reset token sent" });
    if state.tokens.echo_reset_token {
        body["reset_token"] = Value::String(token);
    }
    Ok(Json(body))
}

pub async fn reset_confirm(
    State(state): State<MembersState>,
    Json(req): Json<ResetConfirmRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let new_password = required(Some(req.new_password), "new_password is required")?;

    {
        let conn = state.storage.conn()?;
        require_member(&conn, &email)?;
        if !TokenService::new(&conn).consume_reset_token(&email, &req.token, Utc::now())? {
            return Err(ApiError::BadRequest("Invalid or expired token".to_string()));
        }
    }

    let password_hash = hash_blocking(new_password).await?;
    let conn = state.storage.conn()?;
    conn.execute(
        "UPDATE members SET password_hash = ?1 WHERE email = ?2",
        params![password_hash, email],
    )?;

    tracing::info!(%email, "Password reset");
    Ok(Json(json!({ "message": "Password has been reset successfully" })))
}

pub async fn change_password(
    State(state): State<MembersState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let member = {
        let conn = state.storage.conn()?;
        require_member(&conn, subject.email())?
    };

    if !verify_blocking(req.current_password, member.password_hash.clone()).await? {
        return Err(ApiError::BadRequest("Current password is incorrect".to_string()));
    }
    let new_password = required(Some(req.new_password), "new_password is required")?;
    if verify_blocking(new_password.clone(), member.password_hash.clone()).await? {
        return Err(ApiError::BadRequest(
            "New password cannot be the same as the old password".to_string(),
        ));
    }
    let password_hash = hash_blocking(new_password).await?;

    let conn = state.storage.conn()?;
    conn.execute(
        "UPDATE members SET password_hash = ?1 WHERE email = ?2",
        params![password_hash, member.email],
    )?;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

fn verify(state: &MembersState, req: VerifyCodeRequest, kind: TokenKind) -> Result<(), ApiError> {
    let email = req.email.trim().to_lowercase();
    if !state.verify_limiter.check(&format!("{}:{}", kind, email)) {
        tracing::warn!(%email, %kind, "Verification attempts rate limited");
        return Err(ApiError::RateLimited);
    }

    let conn = state.storage.conn()?;
    if !TokenService::new(&conn).verify_code(&email, kind, req.code.trim(), Utc::now())? {
        return Err(ApiError::BadRequest("Invalid or expired verification code".to_string()));
    }

    let column = match kind {
        TokenKind::PhoneVerification => "phone_verified",
        _ => "email_verified",
    };
    let updated = conn.execute(
        &format!("UPDATE members SET {} = 1 WHERE email = ?1", column),
        [&email],
    )?;
    if updated == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn verify_email(
    State(state): State<MembersState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<Value>, ApiError> {
    verify(&state, req, TokenKind::EmailVerification)?;
    Ok(Json(json!({ "message": "Email verified successfully" })))
}

pub async fn verify_phone(
    State(state): State<MembersState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<Value>, ApiError> {
    verify(&state, req, TokenKind::PhoneVerification)?;
    Ok(Json(json!({ "message": "Phone number verified successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifedash_core::database::{open_in_memory, Schema};

    fn location(city: Option<&str>) -> LocationInput {
        LocationInput {
            country: "Kenya".to_string(),
            state: None,
            city: city.map(String::from),
            country_code: Some("KE".to_string()),
            time_zone: Some("Africa/Nairobi".to_string()),
        }
    }

    #[test]
    fn test_location_is_reused() {
        let conn = open_in_memory().unwrap();
        Schema::Membership.initialize(&conn).unwrap();

        let first = find_or_create_location(&conn, &location(Some("Nairobi"))).unwrap();
        let again = find_or_create_location(&conn, &location(Some("Nairobi"))).unwrap();
        let other = find_or_create_location(&conn, &location(None)).unwrap();
        let other_again = find_or_create_location(&conn, &location(None)).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(other, other_again);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("@example.com").is_err());
    }
}
