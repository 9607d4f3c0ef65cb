use axum_extra::extract::cookie::CookieJar;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{RngCore, SeedableRng};
use rand_hc::Hc128Rng;
use schemars::JsonSchema;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const SESSION_COOKIE: &str = "SESSION-COOKIE";

/// Sessions outlive the login response by this long; refreshed on every
/// authenticated request by the middleware.
const SESSION_SECONDS: u64 = 8 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenId(String);

impl TryFrom<&str> for TokenId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err("Empty session token".to_string());
        }
        Ok(Self(value.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SessionToken {
    pub token: String,
    pub expiry: u64,
}

/// The password gate in front of the booking UI: one shared credential,
/// checked once at login, then a random session token in a cookie.
pub struct GateApp {
    password: String,
    tokens: HashMap<String, SessionToken>,
    rng: Hc128Rng,
}

impl GateApp {
    pub fn new(password: String) -> Self {
        Self {
            password,
            tokens: HashMap::new(),
            rng: Hc128Rng::from_entropy(),
        }
    }

    pub fn authenticate(&mut self, password: &str) -> Result<(String, SessionToken), String> {
        if password != self.password {
            return Err("Wrong password".to_string());
        }
        self.drop_expired();

        let mut seed = [0u8; 32];
        self.rng.fill_bytes(&mut seed);
        let token = URL_SAFE_NO_PAD.encode(Sha1::digest(seed));

        let session = SessionToken {
            token: token.clone(),
            expiry: now_unix() + SESSION_SECONDS,
        };
        self.tokens.insert(token, session.clone());
        debug!("Issued session token expiring at {}", session.expiry);
        Ok((cookie_string(&session), session))
    }

    pub fn assert_login(&self, cookies: CookieJar) -> Result<SessionToken, String> {
        let cookie = cookies.get(SESSION_COOKIE).ok_or("No cookie found")?;
        let session = self
            .tokens
            .get(cookie.value())
            .ok_or("Unknown session token")?;
        if session.expiry <= now_unix() {
            return Err("Session expired".to_string());
        }
        Ok(session.clone())
    }

    /// Sliding expiry: bump the session and hand back a fresh cookie.
    pub fn update_token(&mut self, token_id: &TokenId) -> Result<String, String> {
        let session = self
            .tokens
            .get_mut(&token_id.0)
            .ok_or("Unknown session token")?;
        if session.expiry <= now_unix() {
            return Err("Session expired".to_string());
        }
        session.expiry = now_unix() + SESSION_SECONDS;
        Ok(cookie_string(session))
    }

    pub fn logout(&mut self, token_id: &TokenId) -> Result<(), String> {
        self.tokens
            .remove(&token_id.0)
            .ok_or("Unknown session token")?;
        Ok(())
    }

    fn drop_expired(&mut self) {
        let now = now_unix();
        self.tokens.retain(|_, session| session.expiry > now);
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn cookie_string(session: &SessionToken) -> String {
    format!(
        "{}={}; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, session.token, SESSION_SECONDS
    )
}
