//! Correlation context passed explicitly down the call chain.
//!
//! Carried for log enrichment only; absence of user/session labels has no
//! functional effect.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub user: Option<String>,
    pub session: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            user: None,
            session: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
