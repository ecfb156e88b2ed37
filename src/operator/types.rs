use serde::{Deserialize, Serialize};

/// JWT claims identifying the staff member driving a collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperatorClaims {
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub can_manage_pbis: bool,
    #[serde(default)]
    pub is_super_admin: bool,
    pub exp: usize,
    pub iat: usize,
}

impl OperatorClaims {
    /// Claims without timestamps; [`super::TokenConfig::create_token`] fills them in
    pub fn new(
        sub: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
        can_manage_pbis: bool,
        is_super_admin: bool,
    ) -> Self {
        Self {
            sub: sub.into(),
            name: name.into(),
            email,
            can_manage_pbis,
            is_super_admin,
            exp: 0,
            iat: 0,
        }
    }

    pub fn is_pbis_manager(&self) -> bool {
        self.can_manage_pbis || self.is_super_admin
    }
}
