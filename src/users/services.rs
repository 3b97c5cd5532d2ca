use tracing::{info, warn};

use super::repo::UserRepo;
use super::repo_types::{NewUser, Role, User};
use crate::{auth::Identity, config::BookingConfig, error::ApiError};

/// Maps the caller to a local user, creating the record on first sight.
pub async fn get_or_create_user(
    users: &dyn UserRepo,
    identity: &Identity,
    cfg: &BookingConfig,
) -> Result<User, ApiError> {
    if let Some(user) = users.find_by_external_id(&identity.subject).await? {
        return Ok(user);
    }

    let Some(email) = identity.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
        warn!(subject = %identity.subject, "token has no email; cannot create user");
        return Err(ApiError::Unauthorized("Identity token has no email address".into()));
    };

    let name = identity
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| email.split('@').next().filter(|n| !n.is_empty()))
        .unwrap_or("User")
        .to_string();
    let role = if cfg.is_admin_email(email) { Role::Admin } else { Role::User };

    let user = users
        .create(NewUser {
            external_id: identity.subject.clone(),
            email: email.to_lowercase(),
            name,
            role,
        })
        .await?;
    info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::MemoryUserRepo;

    fn identity(sub: &str, email: Option<&str>, name: Option<&str>) -> Identity {
        Identity {
            subject: sub.into(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    fn cfg() -> BookingConfig {
        BookingConfig {
            admin_emails: vec!["admin@example.com".into()],
            ..BookingConfig::default()
        }
    }

    #[tokio::test]
    async fn first_sight_creates_then_reuses() {
        let repo = MemoryUserRepo::default();
        let who = identity("user_1", Some("Mali@Example.com"), None);
        let first = get_or_create_user(&repo, &who, &cfg()).await.unwrap();
        assert_eq!(first.email, "mali@example.com");
        assert_eq!(first.name, "Mali");
        assert_eq!(first.role, Role::User);

        let again = get_or_create_user(&repo, &who, &cfg()).await.unwrap();
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn configured_admins_get_admin_role() {
        let repo = MemoryUserRepo::default();
        let who = identity("user_2", Some("admin@example.com"), Some("Boss"));
        let user = get_or_create_user(&repo, &who, &cfg()).await.unwrap();
        assert!(user.is_admin());
        assert_eq!(user.name, "Boss");
    }

    #[tokio::test]
    async fn missing_email_cannot_create() {
        let repo = MemoryUserRepo::default();
        let err = get_or_create_user(&repo, &identity("user_3", None, None), &cfg())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
