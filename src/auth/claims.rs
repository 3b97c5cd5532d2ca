use serde::{Deserialize, Serialize};

/// Session token payload issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // provider user ID
    #[serde(default)]
    pub email: Option<String>, // primary email address
    #[serde(default)]
    pub name: Option<String>,  // display name
    pub iat: usize,            // issued at (unix timestamp)
    pub exp: usize,            // expires at (unix timestamp)
    pub iss: String,           // issuer
    pub aud: String,           // audience
}
