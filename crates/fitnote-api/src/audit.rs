//! Security audit logging for authentication events
//!
//! Registrations, logins, token refreshes and rejected bearer tokens are
//! logged at INFO level with the "audit" target, so they can be filtered
//! and routed separately from application logs.
//!
//! Passwords and tokens never appear in an event.
//!
//! # Example
//!
//! ```ignore
//! use fitnote_api::audit::{audit_log, AuditContext, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: principal.id,
//!     email: principal.email.clone(),
//!     ip_address: context.ip_address.clone(),
//!     user_agent: context.user_agent.clone(),
//! });
//! ```
//!
//! Author: sd207@naver.com

use axum::http::HeaderMap;
use chrono::Utc;
use fitnote_core::UserId;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events for authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: UserId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginSuccess {
        user_id: UserId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// New token pair issued from a refresh token
    TokenRefresh {
        user_id: UserId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    TokenRefreshFailure {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Bearer token rejected by the authentication gate
    InvalidToken {
        path: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },
}

/// Client metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is also serialized to JSON in the `event` field for log
/// aggregators.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::RegistrationSuccess {
            user_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::LoginSuccess {
            user_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::TokenRefresh {
            user_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Token refreshed"
            );
        }
        AuditEvent::TokenRefreshFailure {
            reason, ip_address, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                reason = %reason,
                ip_address = ?ip_address,
                "Token refresh failed"
            );
        }
        AuditEvent::InvalidToken {
            path,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                path = %path,
                reason = %reason,
                ip_address = ?ip_address,
                "Invalid token"
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop) then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
