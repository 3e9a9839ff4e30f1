use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use order_edge::services::auth::Role;
use uuid::Uuid;

/// Mint a bearer token the edge will accept (HMAC, shared JWT_SECRET).
///
/// Local testing aid:
/// - Claims: sub, email, role, iat, exp, jti (+ iss/aud when given)
/// - Same secret/algorithm as the edge's JWT_SECRET / JWT_ALGORITHM
#[derive(Parser, Debug)]
#[command(name = "token-gen", version, about)]
struct Args {
    /// Subject (user id)
    #[arg(long)]
    sub: String,

    #[arg(long, default_value = "")]
    email: String,

    /// ADMIN or USER (case-insensitive)
    #[arg(long, default_value = "USER")]
    role: Role,

    /// Lifetime in seconds from now
    #[arg(long, default_value_t = 3600)]
    ttl_seconds: i64,

    /// HS256 / HS384 / HS512
    #[arg(long, env = "JWT_ALGORITHM", default_value = "HS256")]
    algorithm: Algorithm,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    secret: String,

    #[arg(long, env = "JWT_ISSUER")]
    issuer: Option<String>,

    #[arg(long, env = "JWT_AUDIENCE")]
    audience: Option<String>,

    /// Print only the token (no extra lines)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn now_unix() -> Result<i64, Box<dyn std::error::Error>> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

fn build_claims(args: &Args, iat: i64, jti: &str) -> serde_json::Value {
    let mut claims = serde_json::json!({
        "sub": args.sub,
        "email": args.email,
        "role": args.role.as_str(),
        "iat": iat,
        "exp": iat + args.ttl_seconds,
        "jti": jti,
    });
    if let Some(iss) = &args.issuer {
        claims["iss"] = serde_json::Value::String(iss.clone());
    }
    if let Some(aud) = &args.audience {
        claims["aud"] = serde_json::Value::String(aud.clone());
    }
    claims
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if !matches!(
        args.algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        return Err(format!("unsupported algorithm {:?} (HMAC only)", args.algorithm).into());
    }
    if args.sub.trim().is_empty() {
        return Err("--sub must not be empty".into());
    }

    let iat = now_unix()?;
    let jti = Uuid::new_v4().to_string();
    let claims = build_claims(&args, iat, &jti);

    let token = jsonwebtoken::encode(
        &Header::new(args.algorithm),
        &claims,
        &EncodingKey::from_secret(args.secret.as_bytes()),
    )?;

    if args.quiet {
        println!("{}", token);
        return Ok(());
    }

    println!("token: {}", token);
    println!("sub: {}", args.sub);
    println!("role: {}", args.role);
    println!("exp: {}", claims["exp"]);
    println!("jti: {}", jti);

    Ok(())
}
