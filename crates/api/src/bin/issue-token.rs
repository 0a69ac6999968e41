#!/usr/bin/env cargo
//! Identity token utility for ChatDesk
//!
//! Mints a signed token for local development and manual testing. Real
//! deployments get tokens from the identity provider that shares JWT_SECRET.
//!
//! Usage:
//!   cargo run --bin issue-token -- agent
//!   cargo run --bin issue-token -- customer 6ba7b810-9dad-11d1-80b4-00c04fd430c8
//!
//! Reads JWT_SECRET and JWT_EXPIRY_HOURS from the environment (or .env).

use std::env;

use chatdesk_api::auth::JwtManager;
use chatdesk_shared::{UserId, UserType};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);

    let user_type: UserType = match args.next() {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("Unknown user type '{raw}', expected customer or agent"))?,
        None => {
            eprintln!("Usage: issue-token <customer|agent> [user-id]");
            std::process::exit(1);
        }
    };

    let user_id = match args.next() {
        Some(raw) => raw
            .parse::<UserId>()
            .map_err(|e| format!("Invalid user id '{raw}': {e}"))?,
        None => UserId::new(),
    };

    let secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET is not set")?;
    if secret.len() < 32 {
        eprintln!("Warning: JWT_SECRET is shorter than 32 characters; the server will refuse it.");
    }
    let expiry_hours = env::var("JWT_EXPIRY_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(24);

    let token = JwtManager::new(&secret, expiry_hours).issue_token(user_id, user_type)?;

    println!("\n===========================================");
    println!("Identity Token ({user_type}, {expiry_hours}h):");
    println!("===========================================");
    println!("{token}");
    println!("===========================================\n");

    println!("User ID: {user_id}");
    println!("\nUsage:");
    println!("  curl -H 'Authorization: Bearer {token}' http://localhost:3000/api/v1/rooms");
    println!("  websocat 'ws://localhost:3000/api/v1/ws?token={token}'");

    Ok(())
}
