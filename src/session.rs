//! Per-view session identity.

use serde::{Deserialize, Serialize};

/// Identity handed to the engine when a presentation view is created.
///
/// Built once by the auth/session collaborator and immutable for the
/// lifetime of the view. Both channels derive their endpoint from
/// `client_id`; `auth_token` travels with every HTTP request the outer
/// application makes, the engine only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub client_id: String,
    pub document_id: String,
    pub auth_token: String,
    pub user_id: Option<String>,
}

impl Session {
    pub fn new(
        client_id: impl Into<String>,
        document_id: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            document_id: document_id.into(),
            auth_token: auth_token.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
