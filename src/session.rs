use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::logging::log_gate;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "runboard_session";

/// Requests for these are never gated, session or not.
const EXEMPT_PATHS: &[&str] = &["/favicon.ico", "/robots.txt", "/sitemap.xml"];

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Hand the request to the session-management handler; carries the
    /// verified session id when one was presented.
    PassThrough { session: Option<String> },
    /// Send the caller to the login flow, original path preserved.
    Redirect { location: String },
}

/// Session-gating filter: verifies signed cookies and redirects
/// unauthenticated requests under the protected prefix to the login path
/// with the original path as the return destination.
pub struct SessionGate {
    protected_prefix: String,
    login_path: String,
    secret: String,
}

impl SessionGate {
    pub fn new(protected_prefix: &str, login_path: &str, secret: &str) -> Self {
        Self {
            protected_prefix: protected_prefix.to_string(),
            login_path: login_path.to_string(),
            secret: secret.to_string(),
        }
    }

    /// Token format: `base64url(session id).hex(HMAC-SHA256(session id))`.
    pub fn issue(&self, session_id: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| anyhow!("HMAC error: {}", e))?;
        mac.update(session_id.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(session_id), sig))
    }

    /// Verify a presented token and recover the session id. Constant-time
    /// on the signature comparison; any malformed piece is just `None`.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (id_b64, sig_hex) = token.split_once('.')?;
        let id_bytes = URL_SAFE_NO_PAD.decode(id_b64).ok()?;
        let sig = hex::decode(sig_hex).ok()?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(&id_bytes);
        mac.verify_slice(&sig).ok()?;
        String::from_utf8(id_bytes).ok()
    }

    /// Gate one request. Only the path and the (optional) session cookie
    /// value participate in the decision.
    pub fn decide(&self, path: &str, cookie_value: Option<&str>) -> GateDecision {
        if EXEMPT_PATHS.contains(&path) {
            return GateDecision::PassThrough { session: None };
        }

        let session = cookie_value.and_then(|v| self.verify(v));
        let fp = cookie_value.map(fingerprint);

        if path.starts_with(&self.protected_prefix) && session.is_none() {
            let query: String = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("returnTo", path)
                .finish();
            let location = format!("{}?{}", self.login_path, query);
            log_gate(path, "redirect", fp.as_deref());
            return GateDecision::Redirect { location };
        }

        log_gate(path, "pass", fp.as_deref());
        GateDecision::PassThrough { session }
    }
}

/// Log-safe token reference: a short SHA-256 prefix, never the token.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())[..12].to_string()
}

/// Fresh random session id for the login flow.
pub fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Pull one cookie's value out of a raw `Cookie:` header.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SessionGate {
        SessionGate::new("/dashboard", "/auth/login", "test-secret")
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let g = gate();
        let token = g.issue("sess-123").unwrap();
        assert_eq!(g.verify(&token).as_deref(), Some("sess-123"));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let g = gate();
        let token = g.issue("sess-123").unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('0');
        assert!(g.verify(&tampered).is_none());
        assert!(g.verify("garbage").is_none());
        assert!(g.verify("a.b").is_none());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = gate().issue("sess-123").unwrap();
        let other = SessionGate::new("/dashboard", "/auth/login", "other-secret");
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn test_unauthenticated_protected_path_redirects() {
        let g = gate();
        match g.decide("/dashboard/bots/runs", None) {
            GateDecision::Redirect { location } => {
                assert_eq!(location, "/auth/login?returnTo=%2Fdashboard%2Fbots%2Fruns");
            }
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_cookie_still_redirects() {
        let g = gate();
        assert!(matches!(
            g.decide("/dashboard", Some("forged.token")),
            GateDecision::Redirect { .. }
        ));
    }

    #[test]
    fn test_valid_session_passes_protected_path() {
        let g = gate();
        let token = g.issue("sess-9").unwrap();
        match g.decide("/dashboard", Some(&token)) {
            GateDecision::PassThrough { session } => {
                assert_eq!(session.as_deref(), Some("sess-9"))
            }
            other => panic!("expected pass, got {:?}", other),
        }
    }

    #[test]
    fn test_unprotected_paths_pass_through() {
        let g = gate();
        assert!(matches!(
            g.decide("/auth/login", None),
            GateDecision::PassThrough { session: None }
        ));
        assert!(matches!(
            g.decide("/favicon.ico", None),
            GateDecision::PassThrough { session: None }
        ));
    }

    #[test]
    fn test_cookie_parsing() {
        let header = format!("other=1; {}=abc.def; last=2", SESSION_COOKIE);
        assert_eq!(
            cookie_value(&header, SESSION_COOKIE).as_deref(),
            Some("abc.def")
        );
        assert!(cookie_value("other=1", SESSION_COOKIE).is_none());
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let a = fingerprint("token-a");
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint("token-a"));
        assert_ne!(a, fingerprint("token-b"));
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
        assert_eq!(new_session_id().len(), 32);
    }
}
