//! Account resolution: turn a verified external identity into a local
//! account, applying the domain allow-list and ban status.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::AsyncPgConnection;

use super::google::ExternalIdentity;
use crate::config::AppConfig;
use crate::db;
use crate::models::User;

/// Why a login attempt was turned away without a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeniedReason {
    DomainNotAllowed,
    Banned,
}

impl DeniedReason {
    pub fn message(&self) -> &'static str {
        match self {
            DeniedReason::DomainNotAllowed => "domain not allowed",
            DeniedReason::Banned => "user is banned",
        }
    }
}

#[derive(Debug)]
pub enum Resolution {
    Allowed(User),
    Denied(DeniedReason),
}

/// Whether `email` passes the configured allow-list.
///
/// `None` means no restriction. The literal `"edu"` is a wildcard accepting
/// any domain ending in `.edu`; any other value requires an exact match on
/// the part after the first `@`.
pub fn domain_allowed(allowed: Option<&str>, email: &str) -> bool {
    let domain = email.split_once('@').map(|(_, d)| d).unwrap_or("");

    match allowed {
        None => true,
        Some("edu") => domain.ends_with(".edu"),
        Some(exact) => domain == exact,
    }
}

/// Photo to store on refresh: an empty provider photo keeps the stored one.
fn effective_photo<'a>(incoming: &'a str, stored: &'a str) -> &'a str {
    if incoming.is_empty() {
        stored
    } else {
        incoming
    }
}

/// What a login attempt against an existing account should do.
#[derive(Debug, PartialEq, Eq)]
enum RefreshPlan<'a> {
    Deny(DeniedReason),
    Refresh {
        name: &'a str,
        subject: &'a str,
        photo: &'a str,
    },
}

/// The ban check comes before any write: a banned user's stored profile
/// must not pick up fields from the rejected attempt.
fn plan_refresh<'a>(user: &'a User, identity: &'a ExternalIdentity) -> RefreshPlan<'a> {
    if user.banned {
        return RefreshPlan::Deny(DeniedReason::Banned);
    }

    RefreshPlan::Refresh {
        name: &identity.name,
        subject: &identity.subject,
        photo: effective_photo(&identity.photo, &user.photo),
    }
}

/// Find-or-create the account for a verified identity.
///
/// Denials (domain mismatch, banned account) terminate the attempt without
/// creating or mutating anything. A unique violation on create means a
/// concurrent login won the race for the same new email, so the attempt is
/// retried as an update.
pub async fn resolve(
    conn: &mut AsyncPgConnection,
    config: &AppConfig,
    identity: &ExternalIdentity,
) -> anyhow::Result<Resolution> {
    if !domain_allowed(config.allowed_domain.as_deref(), &identity.email) {
        tracing::warn!("Login denied for {}: domain not allowed", identity.email);
        return Ok(Resolution::Denied(DeniedReason::DomainNotAllowed));
    }

    match db::users::get_by_email(conn, &identity.email).await? {
        Some(user) => refresh_existing(conn, user, identity).await,
        None => {
            let created = db::users::create(
                conn,
                &identity.name,
                &identity.email,
                &identity.subject,
                &identity.photo,
            )
            .await;

            match created {
                Ok(user) => {
                    tracing::info!("Created account for {}", user.email);
                    Ok(Resolution::Allowed(user))
                }
                Err(e) if is_unique_violation(&e) => {
                    let user = db::users::get_by_email(conn, &identity.email)
                        .await?
                        .ok_or_else(|| {
                            anyhow::anyhow!("account missing after duplicate insert")
                        })?;
                    refresh_existing(conn, user, identity).await
                }
                Err(e) => Err(e),
            }
        }
    }
}

async fn refresh_existing(
    conn: &mut AsyncPgConnection,
    user: User,
    identity: &ExternalIdentity,
) -> anyhow::Result<Resolution> {
    let (name, subject, photo) = match plan_refresh(&user, identity) {
        RefreshPlan::Deny(reason) => {
            tracing::warn!("Login denied for {}: {}", user.email, reason.message());
            return Ok(Resolution::Denied(reason));
        }
        RefreshPlan::Refresh {
            name,
            subject,
            photo,
        } => (name.to_string(), subject.to_string(), photo.to_string()),
    };

    let updated = db::users::refresh_identity(conn, user.id, &name, &subject, &photo).await?;

    Ok(Resolution::Allowed(updated))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DieselError>(),
        Some(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _
        ))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn stored_user(banned: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Old Name".to_string(),
            email: "a@andrew.cmu.edu".to_string(),
            google_id: "google-sub-1".to_string(),
            photo: "https://old/photo.jpg".to_string(),
            bio: None,
            links: None,
            is_admin: false,
            banned,
            created_at: now,
            updated_at: now,
        }
    }

    fn incoming_identity() -> ExternalIdentity {
        ExternalIdentity {
            email: "a@andrew.cmu.edu".to_string(),
            name: "New Name".to_string(),
            photo: "https://new/photo.jpg".to_string(),
            subject: "google-sub-2".to_string(),
        }
    }

    #[test]
    fn no_allow_list_accepts_anything() {
        assert!(domain_allowed(None, "a@gmail.com"));
        assert!(domain_allowed(None, "a@andrew.cmu.edu"));
    }

    #[test]
    fn edu_wildcard_accepts_any_edu_domain() {
        assert!(domain_allowed(Some("edu"), "a@andrew.cmu.edu"));
        assert!(domain_allowed(Some("edu"), "b@mit.edu"));
        assert!(!domain_allowed(Some("edu"), "a@gmail.com"));
        // "edu" alone is not ".edu"
        assert!(!domain_allowed(Some("edu"), "a@edu"));
    }

    #[test]
    fn exact_domain_requires_exact_match() {
        assert!(domain_allowed(Some("andrew.cmu.edu"), "a@andrew.cmu.edu"));
        assert!(!domain_allowed(Some("andrew.cmu.edu"), "a@cmu.edu"));
        assert!(!domain_allowed(Some("andrew.cmu.edu"), "a@gmail.com"));
        // suffix match is not enough for an exact allow-list
        assert!(!domain_allowed(Some("cmu.edu"), "a@andrew.cmu.edu"));
    }

    #[test]
    fn domain_is_everything_after_first_at() {
        assert!(domain_allowed(Some("edu"), "weird@name@x.edu"));
        assert!(!domain_allowed(Some("x.edu"), "weird@name@x.edu"));
    }

    #[test]
    fn missing_at_sign_denied_under_any_allow_list() {
        assert!(!domain_allowed(Some("edu"), "not-an-email"));
        assert!(!domain_allowed(Some("cmu.edu"), "not-an-email"));
        assert!(domain_allowed(None, "not-an-email"));
    }

    #[test]
    fn empty_provider_photo_keeps_stored_photo() {
        assert_eq!(effective_photo("", "https://old/photo.jpg"), "https://old/photo.jpg");
        assert_eq!(
            effective_photo("https://new/photo.jpg", "https://old/photo.jpg"),
            "https://new/photo.jpg"
        );
        assert_eq!(effective_photo("", ""), "");
    }

    #[test]
    fn banned_account_is_denied_before_any_refresh() {
        let user = stored_user(true);
        let identity = incoming_identity();

        assert_eq!(
            plan_refresh(&user, &identity),
            RefreshPlan::Deny(DeniedReason::Banned)
        );
    }

    #[test]
    fn refresh_carries_incoming_identity_fields() {
        let user = stored_user(false);
        let identity = incoming_identity();

        assert_eq!(
            plan_refresh(&user, &identity),
            RefreshPlan::Refresh {
                name: "New Name",
                subject: "google-sub-2",
                photo: "https://new/photo.jpg",
            }
        );
    }

    #[test]
    fn refresh_keeps_stored_photo_when_provider_sends_none() {
        let user = stored_user(false);
        let mut identity = incoming_identity();
        identity.photo = String::new();

        assert_eq!(
            plan_refresh(&user, &identity),
            RefreshPlan::Refresh {
                name: "New Name",
                subject: "google-sub-2",
                photo: "https://old/photo.jpg",
            }
        );
    }

    #[test]
    fn unique_violation_is_recognized_for_create_retry() {
        let unique: anyhow::Error = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        )
        .into();
        assert!(is_unique_violation(&unique));

        let other: anyhow::Error = DieselError::NotFound.into();
        assert!(!is_unique_violation(&other));

        let non_diesel = anyhow::anyhow!("connection reset");
        assert!(!is_unique_violation(&non_diesel));
    }
}
