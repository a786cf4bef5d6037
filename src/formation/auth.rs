//! Credentials and bearer-token bookkeeping for the Formation client.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use super::error::FormationError;

/// Tokens are considered expired this long before the server says they are.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the login response does not report `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Username/password pair exchanged for a token via `POST /login`.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginPair {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginPair")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How the client authenticates.
///
/// Holds a pre-obtained bearer token, a login pair, or both. The token is
/// used while it is usable; the login pair mints a new one once it is not.
/// At least one of the two is always present.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: Option<String>,
    login: Option<LoginPair>,
}

impl Credentials {
    /// Static token only. Cannot be refreshed.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            login: None,
        }
    }

    /// Login pair only. The first call logs in.
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            token: None,
            login: Some(LoginPair {
                username: username.into(),
                password: password.into(),
            }),
        }
    }

    /// Build credentials from optional parts.
    ///
    /// Empty values count as absent. A token and a complete login pair are
    /// both kept. Fails when neither is present.
    pub fn from_parts(
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, FormationError> {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());

        let token = non_empty(token);
        let login = match (non_empty(username), non_empty(password)) {
            (Some(username), Some(password)) => Some(LoginPair { username, password }),
            _ => None,
        };
        if token.is_none() && login.is_none() {
            return Err(FormationError::Configuration(
                "either a token or both username and password must be provided".to_string(),
            ));
        }
        Ok(Self { token, login })
    }

    pub fn static_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn login_pair(&self) -> Option<&LoginPair> {
        self.login.as_ref()
    }

    pub fn can_refresh(&self) -> bool {
        self.login.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("login", &self.login)
            .finish()
    }
}

/// The mutable half of the credential state: the current token and when it stops being usable.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    pub token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenState {
    /// Initial state for the given credentials.
    pub fn for_credentials(credentials: &Credentials) -> Self {
        match credentials.static_token() {
            Some(token) => TokenState {
                expiry: jwt_expiry(token),
                token: Some(token.to_string()),
            },
            None => TokenState::default(),
        }
    }

    /// Returns the token if it can still be used at `now`.
    ///
    /// A token without a known expiry is always usable.
    pub fn usable_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref()?;
        match self.expiry {
            Some(expiry) if now >= expiry => None,
            _ => Some(token),
        }
    }

    /// Store a freshly minted token.
    pub fn replace(&mut self, token: String, expires_in_secs: i64, now: DateTime<Utc>) {
        self.expiry = Some(expiry_after_login(now, expires_in_secs));
        self.token = Some(token);
    }
}

/// `login_time + expires_in - margin`.
pub fn expiry_after_login(login_time: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    login_time + ChronoDuration::seconds(expires_in_secs - TOKEN_EXPIRY_MARGIN_SECS)
}

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    #[serde(default)]
    exp: Option<i64>,
}

/// Reads the `exp` claim of a JWT without verifying its signature.
///
/// Opaque (non-JWT) tokens and JWTs without `exp` yield `None`.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data =
        jsonwebtoken::decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()?;
    let exp = data.claims.exp?;
    Utc.timestamp_opt(exp, 0).single()
}
