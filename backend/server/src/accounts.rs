//! # Accounts
//!
//! Registration, login and the profile fields a customer can edit.
//!
//! Password hashes never leave this module: [`Account`] has no field for one
//! and the only query that reads the column is [`authenticate`].
use catalog::{Address, Role};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    database::{is_constraint_violation, text_column},
    error::AppError,
    orders::{Order, client_orders},
    reviews::{ClientReview, client_reviews},
    utils::{
        check_password_rule, hash_password, is_valid_email, normalize_email, require, sanitize,
        verify_password,
    },
};

const INVALID_LOGIN: &str = "Invalid email or password";
const DUPLICATE_EMAIL: &str = "Email already exists. Please use a different email.";

const ACCOUNT_COLUMNS: &str = "client_id, full_name, email, phone, role, address_details, barangay,
     city, province, region, address, last_login, created_at";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub client_id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub address: Address,
    pub shipping_address: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RegisterRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PasswordChange {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct AccountOverview {
    pub profile: Account,
    pub orders: Vec<Order>,
    pub reviews: Vec<ClientReview>,
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let part = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };

    Ok(Account {
        client_id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        role: text_column(row, 4)?,
        address: Address {
            address_details: part(5)?,
            barangay: part(6)?,
            city: part(7)?,
            province: part(8)?,
            region: part(9)?,
        },
        shipping_address: row.get(10)?,
        last_login: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub fn profile(conn: &Connection, client_id: i64) -> Result<Account, AppError> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM clients WHERE client_id = ?1"),
        [client_id],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Account not found."))
}

pub fn list_clients(conn: &Connection) -> Result<Vec<Account>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM clients ORDER BY created_at DESC, client_id DESC"
    ))?;
    let clients = stmt
        .query_map([], account_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(clients)
}

pub fn register(conn: &Connection, request: &RegisterRequest) -> Result<Account, AppError> {
    let full_name = require(request.full_name.as_deref(), "Please fill out all fields.")?;
    let email = normalize_email(request.email.as_deref().unwrap_or_default());
    let password = request.password.as_deref().unwrap_or_default();
    let phone = request.phone.as_deref().map(sanitize).unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Please fill out all fields."));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Please enter a valid email address."));
    }
    check_password_rule(password)?;

    let taken = conn
        .query_row("SELECT 1 FROM clients WHERE email = ?1", [&email], |_| Ok(()))
        .optional()?
        .is_some();
    if taken {
        return Err(AppError::conflict(DUPLICATE_EMAIL));
    }

    conn.execute(
        "INSERT INTO clients (full_name, email, phone, password, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            full_name,
            email,
            phone,
            hash_password(password),
            Role::User.as_str(),
            Utc::now()
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::conflict(DUPLICATE_EMAIL)
        } else {
            e.into()
        }
    })?;

    let client_id = conn.last_insert_rowid();
    info!(client_id, "Registered account");

    profile(conn, client_id)
}

/// Same failure for an unknown email and a wrong password.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> Result<Account, AppError> {
    let email = normalize_email(email);

    let found: Option<(i64, String)> = conn
        .query_row(
            "SELECT client_id, password FROM clients WHERE email = ?1",
            [&email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let client_id = match found {
        Some((client_id, stored)) if verify_password(&stored, password) => client_id,
        _ => return Err(AppError::Unauthorized(INVALID_LOGIN.to_string())),
    };

    conn.execute(
        "UPDATE clients SET last_login = ?1 WHERE client_id = ?2",
        params![Utc::now(), client_id],
    )?;
    info!(client_id, "Login");

    profile(conn, client_id)
}

pub fn update_profile(conn: &Connection, client_id: i64, update: &ProfileUpdate) -> Result<Account, AppError> {
    let full_name = require(update.full_name.as_deref(), "Full name is required.")?;
    let phone = update.phone.as_deref().map(sanitize).unwrap_or_default();

    let changed = conn.execute(
        "UPDATE clients SET full_name = ?1, phone = ?2 WHERE client_id = ?3",
        params![full_name, phone, client_id],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Account not found."));
    }

    profile(conn, client_id)
}

pub fn update_password(conn: &Connection, client_id: i64, change: &PasswordChange) -> Result<(), AppError> {
    let current = change.current_password.as_deref().unwrap_or_default();
    let new = change.new_password.as_deref().unwrap_or_default();

    if current.is_empty() || new.is_empty() {
        return Err(AppError::validation("Please fill out all fields."));
    }
    check_password_rule(new)?;

    let stored: String = conn
        .query_row(
            "SELECT password FROM clients WHERE client_id = ?1",
            [client_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Account not found."))?;

    if !verify_password(&stored, current) {
        return Err(AppError::validation("Current password is incorrect."));
    }

    conn.execute(
        "UPDATE clients SET password = ?1 WHERE client_id = ?2",
        params![hash_password(new), client_id],
    )?;
    info!(client_id, "Password changed");

    Ok(())
}

pub fn update_address(conn: &Connection, client_id: i64, address: &Address) -> Result<Account, AppError> {
    let address = Address {
        address_details: sanitize(&address.address_details),
        barangay: sanitize(&address.barangay),
        city: sanitize(&address.city),
        province: sanitize(&address.province),
        region: sanitize(&address.region),
    };
    if address.is_empty() {
        return Err(AppError::validation("Please provide an address."));
    }

    let changed = conn.execute(
        "UPDATE clients
         SET address_details = ?1, barangay = ?2, city = ?3, province = ?4, region = ?5,
             address = ?6
         WHERE client_id = ?7",
        params![
            address.address_details,
            address.barangay,
            address.city,
            address.province,
            address.region,
            address.compose(),
            client_id
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Account not found."));
    }

    profile(conn, client_id)
}

pub fn account_overview(conn: &Connection, client_id: i64) -> Result<AccountOverview, AppError> {
    Ok(AccountOverview {
        profile: profile(conn, client_id)?,
        orders: client_orders(conn, client_id)?,
        reviews: client_reviews(conn, client_id)?,
    })
}
