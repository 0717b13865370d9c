//! Portable VC verifier.
//!
//! Verifies a credo VC-JWT with nothing but HTTP(S): resolves the issuer's
//! did:web document, fetches and verifies the signed status list, and tests
//! the revocation bit. Prints a one-line JSON verdict; exit code 2 on any
//! verification error.

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use credo_core::did::{did_web_to_url, DidDocument};
use credo_core::error::{CoreError, CoreResult};
use credo_core::status::verify_and_extract;
use credo_core::vc::{verify_vc_jwt, DidResolver, StatusChecker};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "credo-verifier", about = "Portable VC verifier (no database)")]
struct Args {
    /// VC-JWT to verify; read from stdin when omitted.
    #[arg(long)]
    jwt: Option<String>,

    /// HTTP timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn resolution(err: impl std::fmt::Display) -> CoreError {
    CoreError::Resolution(err.to_string())
}

/// did:web has no scheme of its own; default to https, but talk plain
/// http to localhost so local stacks verify without TLS.
fn document_url(did: &str) -> CoreResult<String> {
    let url = did_web_to_url(did, "https")?;
    let parsed = Url::parse(&url).map_err(resolution)?;
    if matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1")) {
        return Ok(url.replacen("https://", "http://", 1));
    }
    Ok(url)
}

#[derive(Clone)]
struct HttpResolver {
    http: reqwest::Client,
}

impl HttpResolver {
    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> CoreResult<T> {
        self.http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(resolution)?
            .error_for_status()
            .map_err(resolution)?
            .json()
            .await
            .map_err(resolution)
    }
}

#[async_trait]
impl DidResolver for HttpResolver {
    async fn resolve(&self, did: &str) -> CoreResult<DidDocument> {
        self.fetch_json(&document_url(did)?).await
    }
}

struct HttpStatusChecker {
    resolver: HttpResolver,
}

#[async_trait]
impl StatusChecker for HttpStatusChecker {
    async fn is_revoked(&self, url: &str, index: u64) -> CoreResult<bool> {
        let data: Value = self.resolver.fetch_json(url).await?;
        let token = data
            .get("jwt")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Validation("status endpoint missing jwt".to_string()))?;

        let (raw, _) = verify_and_extract(token, &self.resolver).await?;

        let index = index as usize;
        if index >= raw.len() * 8 {
            return Ok(false);
        }
        Ok(raw[index / 8] & (1 << (index % 8)) != 0)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let token = match args.jwt {
        Some(token) => token,
        None => {
            let mut buf = String::new();
            if std::io::stdin().read_to_string(&mut buf).is_err() {
                eprintln!("failed to read token from stdin");
                std::process::exit(2);
            }
            buf.trim().to_string()
        }
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .unwrap_or_default();
    let resolver = HttpResolver { http };
    let checker = HttpStatusChecker {
        resolver: resolver.clone(),
    };

    match verify_vc_jwt(&token, &resolver, &checker).await {
        Ok(result) => {
            let revoked = result.status.revoked.unwrap_or(false);
            let verdict = json!({
                "verified": !revoked,
                "revoked": revoked,
                "reason": if revoked { Some("revoked") } else { None },
                "iss": result.payload.get("iss"),
                "sub": result.payload.get("sub"),
                "jti": result.payload.get("jti"),
            });
            println!("{}", verdict);
        }
        Err(err) => {
            println!("{}", json!({"verified": false, "error": err.to_string()}));
            std::process::exit(2);
        }
    }
}
