//! Session Gateway
//!
//! Minimal HTTP front door applying the session gate: unauthenticated
//! requests under the protected prefix are redirected to the login path
//! with the original path as `returnTo`; the login path issues a signed
//! session cookie. Run with: cargo run --bin gateway

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use runboard::config::ServerConfig;
use runboard::logging::{json_log, obj, v_str};
use runboard::session::{
    cookie_value, new_session_id, GateDecision, SessionGate, SESSION_COOKIE,
};

fn main() {
    let cfg = ServerConfig::from_env();
    let secret = cfg.session_secret.clone().unwrap_or_else(|| {
        // Dev fallback: sessions die with the process
        json_log("gateway", obj(&[("warning", v_str("SESSION_SECRET unset, using ephemeral secret"))]));
        new_session_id()
    });
    let gate = SessionGate::new(&cfg.protected_prefix, &cfg.login_path, &secret);

    let listener = TcpListener::bind(&cfg.gateway_addr).expect("Failed to bind");
    println!("Session gateway running at http://{}", cfg.gateway_addr);
    println!();
    println!("Routes:");
    println!("  GET /api/health      - Health check");
    println!("  GET {}   - Login, sets {} cookie", cfg.login_path, SESSION_COOKIE);
    println!("  GET {}/**   - Gated", cfg.protected_prefix);
    println!();

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(_) => continue,
        };

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            continue;
        }
        let target = match request_line.split_whitespace().nth(1) {
            Some(t) => t.to_string(),
            None => continue,
        };

        // Drain headers, keeping the cookie line
        let mut cookie_header = None;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) if line.trim().is_empty() => break,
                Ok(_) => {
                    if let Some(rest) = line
                        .strip_prefix("Cookie:")
                        .or_else(|| line.strip_prefix("cookie:"))
                    {
                        cookie_header = Some(rest.trim().to_string());
                    }
                }
                Err(_) => break,
            }
        }

        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (target.clone(), String::new()),
        };
        let token = cookie_header
            .as_deref()
            .and_then(|h| cookie_value(h, SESSION_COOKIE));

        let response = if path == "/api/health" {
            plain_response("200 OK", r#"{"status":"ok"}"#, None)
        } else if path == cfg.login_path {
            let return_to: String = url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == "returnTo")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_else(|| "/".to_string());
            match gate.issue(&new_session_id()) {
                Ok(token) => {
                    let body = format!(r#"{{"status":"signed_in","returnTo":"{}"}}"#, return_to);
                    let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, token);
                    plain_response("200 OK", &body, Some(&cookie))
                }
                Err(_) => plain_response("500 INTERNAL SERVER ERROR", r#"{"status":"error"}"#, None),
            }
        } else {
            match gate.decide(&path, token.as_deref()) {
                GateDecision::Redirect { location } => redirect_response(&location),
                GateDecision::PassThrough { session } => {
                    // Stand-in for the session-management handler
                    let body = format!(
                        r#"{{"path":"{}","authenticated":{}}}"#,
                        path,
                        session.is_some()
                    );
                    plain_response("200 OK", &body, None)
                }
            }
        };

        let _ = stream.write_all(response.as_bytes());
    }
}

fn plain_response(status: &str, body: &str, set_cookie: Option<&str>) -> String {
    let cookie_line = set_cookie
        .map(|c| format!("Set-Cookie: {}\r\n", c))
        .unwrap_or_default();
    format!(
        "HTTP/1.1 {}\r\n\
         Content-Type: application/json\r\n\
         {}Content-Length: {}\r\n\r\n{}",
        status,
        cookie_line,
        body.len(),
        body
    )
}

fn redirect_response(location: &str) -> String {
    format!(
        "HTTP/1.1 302 FOUND\r\n\
         Location: {}\r\n\
         Content-Length: 0\r\n\r\n",
        location
    )
}
