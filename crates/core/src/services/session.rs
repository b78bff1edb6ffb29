//! Session service: who is calling, and may they moderate.

use serde::{Deserialize, Serialize};
use showcase_common::{AppError, AppResult};
use showcase_forum::{ForumUser, LoginInput, RegisterInput, SharedGateway};
use validator::Validate;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    /// Bearer credential the viewer was resolved from, forwarded to the forum.
    #[serde(skip)]
    pub token: String,
}

impl Viewer {
    /// Build a viewer from the forum account behind `token`.
    #[must_use]
    pub fn from_user(user: ForumUser, token: String, admin_role: &str) -> Self {
        let is_admin = user.is_admin || user.roles.iter().any(|r| r == admin_role);
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            is_admin,
            token,
        }
    }

    /// Name shown on the viewer's submissions.
    #[must_use]
    pub fn author_name(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }

    /// The token in the shape the gateway expects.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        Some(self.token.as_str())
    }
}

/// Require a signed-in caller.
pub fn require_viewer(viewer: Option<&Viewer>) -> AppResult<&Viewer> {
    viewer.ok_or(AppError::Unauthorized)
}

/// Require a signed-in caller with moderation rights.
pub fn require_admin(viewer: Option<&Viewer>) -> AppResult<&Viewer> {
    let viewer = require_viewer(viewer)?;
    if viewer.is_admin {
        Ok(viewer)
    } else {
        Err(AppError::Forbidden("Admin privileges required".to_string()))
    }
}

/// Input for signing in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email.
    #[validate(length(min = 1, max = 256, message = "is required"))]
    pub login: String,

    #[validate(length(min = 1, max = 128, message = "is required"))]
    pub password: String,
}

/// Input for creating an account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "must be 1 to 64 characters"))]
    pub username: String,

    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,

    #[validate(length(max = 256))]
    pub display_name: Option<String>,
}

/// A freshly issued credential and the viewer it belongs to.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub viewer: Viewer,
}

/// Session service.
#[derive(Clone)]
pub struct SessionService {
    gateway: SharedGateway,
    admin_role: String,
}

impl SessionService {
    /// Create a new session service.
    #[must_use]
    pub fn new(gateway: SharedGateway, admin_role: impl Into<String>) -> Self {
        Self {
            gateway,
            admin_role: admin_role.into(),
        }
    }

    /// Resolve a bearer credential into a viewer.
    ///
    /// Anything that does not resolve cleanly (no token, an expired one, an
    /// unreachable backend) yields an anonymous caller.
    pub async fn resolve(&self, token: Option<&str>) -> Option<Viewer> {
        let token = token.map(str::trim).filter(|t| !t.is_empty())?;
        match self.gateway.me(token).await {
            Ok(user) => Some(Viewer::from_user(user, token.to_string(), &self.admin_role)),
            Err(e) => {
                tracing::debug!(error = %e, "Treating caller as anonymous");
                None
            }
        }
    }

    /// Exchange credentials for a session.
    pub async fn login(&self, input: LoginRequest) -> AppResult<AuthSession> {
        input.validate()?;

        let issued = self
            .gateway
            .login(LoginInput {
                login: input.login.trim().to_string(),
                password: input.password,
            })
            .await?;
        self.open(issued.token).await
    }

    /// Create an account and sign it in.
    pub async fn register(&self, input: RegisterRequest) -> AppResult<AuthSession> {
        input.validate()?;

        let username = input.username.trim().to_string();
        let display_name = input
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let user = self
            .gateway
            .register(RegisterInput {
                username: username.clone(),
                email: input.email.trim().to_string(),
                password: input.password.clone(),
                display_name,
            })
            .await?;
        tracing::info!(user_id = %user.id, username = %user.username, "Account registered");

        let issued = self
            .gateway
            .login(LoginInput {
                login: username,
                password: input.password,
            })
            .await?;
        self.open(issued.token).await
    }

    async fn open(&self, token: String) -> AppResult<AuthSession> {
        let user = self.gateway.me(&token).await?;
        let viewer = Viewer::from_user(user, token.clone(), &self.admin_role);
        Ok(AuthSession { token, viewer })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use showcase_forum::InMemoryForum;
    use std::sync::Arc;

    fn service(forum: &Arc<InMemoryForum>) -> SessionService {
        SessionService::new(forum.clone(), "admin")
    }

    #[tokio::test]
    async fn test_resolve_known_token() {
        let forum = Arc::new(InMemoryForum::new());
        let (user, token) = forum.add_user("alice", Some("Alice")).await;

        let viewer = service(&forum).resolve(Some(&token)).await.unwrap();
        assert_eq!(viewer.id, user.id);
        assert_eq!(viewer.author_name(), "Alice");
        assert!(!viewer.is_admin);
        assert_eq!(viewer.token, token);
    }

    #[tokio::test]
    async fn test_resolve_unknown_or_missing_token_is_anonymous() {
        let forum = Arc::new(InMemoryForum::new());
        let service = service(&forum);
        assert!(service.resolve(None).await.is_none());
        assert!(service.resolve(Some("")).await.is_none());
        assert!(service.resolve(Some("bogus")).await.is_none());
    }

    #[tokio::test]
    async fn test_admin_role_grants_admin() {
        let forum = Arc::new(InMemoryForum::new());
        let (_, token) = forum.add_admin("root").await;

        let viewer = service(&forum).resolve(Some(&token)).await.unwrap();
        assert!(viewer.is_admin);
        assert!(require_admin(Some(&viewer)).is_ok());

        let other_role = SessionService::new(forum.clone(), "moderator");
        let viewer = other_role.resolve(Some(&token)).await.unwrap();
        assert!(!viewer.is_admin);
    }

    #[test]
    fn test_require_helpers() {
        assert!(matches!(require_viewer(None), Err(AppError::Unauthorized)));
        assert!(matches!(require_admin(None), Err(AppError::Unauthorized)));

        let viewer = Viewer {
            id: "u1".to_string(),
            username: "alice".to_string(),
            display_name: None,
            is_admin: false,
            token: "t".to_string(),
        };
        assert!(require_viewer(Some(&viewer)).is_ok());
        assert!(matches!(
            require_admin(Some(&viewer)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_author_name_falls_back_to_username() {
        let mut viewer = Viewer {
            id: "u1".to_string(),
            username: "alice".to_string(),
            display_name: Some("  ".to_string()),
            is_admin: false,
            token: "t".to_string(),
        };
        assert_eq!(viewer.author_name(), "alice");

        viewer.display_name = Some("Alice A.".to_string());
        assert_eq!(viewer.author_name(), "Alice A.");
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let forum = Arc::new(InMemoryForum::new());
        let service = service(&forum);

        let session = service
            .register(RegisterRequest {
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password: "correct horse".to_string(),
                display_name: Some("Bob".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(session.viewer.username, "bob");
        assert_eq!(session.viewer.author_name(), "Bob");

        let again = service
            .login(LoginRequest {
                login: "bob".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(again.viewer.id, session.viewer.id);
        assert_ne!(again.token, session.token);
    }

    #[tokio::test]
    async fn test_register_validation_reports_fields() {
        let forum = Arc::new(InMemoryForum::new());
        let err = service(&forum)
            .register(RegisterRequest {
                username: String::new(),
                email: "not-an-email".to_string(),
                password: "short".to_string(),
                display_name: None,
            })
            .await
            .unwrap_err();

        let AppError::Validation(fields) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(fields.get("username").is_some());
        assert!(fields.get("email").is_some());
        assert!(fields.get("password").is_some());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_unauthorized() {
        let forum = Arc::new(InMemoryForum::new());
        forum.add_user("alice", None).await;

        let err = service(&forum)
            .login(LoginRequest {
                login: "alice".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
