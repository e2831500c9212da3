use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Role granted to the identity system. Tokens carrying it may call the
/// service endpoints in place of the API key.
pub const SERVICE_ROLE: &str = "service";

/// JWT payload. `sub` is the user id whose inbox, history and preferences
/// the token grants access to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_service(&self) -> bool {
        self.has_role(SERVICE_ROLE)
    }
}
