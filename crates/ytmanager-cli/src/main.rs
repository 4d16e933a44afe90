//! ytmanager - command line client for the channel management backend.
//!
//! Logs in against the backend, keeps the session token in local storage
//! between runs, and reports which views the current session may open.

use std::io;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ytmanager_core::api::SignupRequest;
use ytmanager_core::auth::TokenStore;
use ytmanager_core::{
    ApiClient, ApiError, Config, GuardDecision, Role, Route, SessionEvent, SessionManager,
    SessionState,
};

#[derive(Parser)]
#[command(name = "ytmanager", version, about = "Client for the ytmanager backend")]
struct Cli {
    /// Backend address (overrides YTMANAGER_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "editor")]
        role: Role,
    },
    /// Forget the stored session
    Logout,
    /// Show who the stored session belongs to
    Whoami,
    /// Show whether the current session may open a path
    Route { path: String },
    /// Check that the backend is reachable
    Ping,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    let store = config.open_token_store()?;
    let mut session = SessionManager::new(store).with_expiry_leeway(config.expiry_leeway());
    session.initialize();

    let api = ApiClient::new(config.api_base_url(cli.api_url.as_deref()))?;
    info!(api = api.base_url(), "ytmanager starting");

    match cli.command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => bail!("No email given and none remembered; pass --email"),
            };
            login(&mut session, &api, &email).await?;
            config.last_email = Some(email);
            config.save()?;
        }
        Command::Signup { name, email, role } => {
            let password = rpassword::prompt_password("Password: ")?;
            let request = SignupRequest {
                name,
                email,
                password,
                role,
            };
            let message = api.signup(&request).await.map_err(describe)?;
            if message.is_empty() {
                println!("Signup successful");
            } else {
                println!("{}", message);
            }
            println!("Run `ytmanager login --email {}` to sign in.", request.email);
        }
        Command::Logout => {
            session.logout();
            println!("Logged out.");
        }
        Command::Whoami => print_identity(session.state()),
        Command::Route { path } => {
            let route = Route::parse(&path);
            match session.guard(&route) {
                GuardDecision::Allow => println!("allow {}", route),
                GuardDecision::Redirect(to) => println!("redirect {} -> {}", route, to),
                GuardDecision::Defer => println!("defer {}", route),
            }
        }
        Command::Ping => {
            let health = api.health().await.map_err(describe)?;
            println!("{}: {} {}", api.base_url(), health.status, health.message);
        }
    }

    Ok(())
}

async fn login<S: TokenStore>(
    session: &mut SessionManager<S>,
    api: &ApiClient,
    email: &str,
) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let token = api.login(email, &password).await.map_err(describe)?;

    let mut events = session.subscribe();
    session.login(token);

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::DecodeFailed { reason } => {
                bail!("Backend returned an unusable token: {}", reason)
            }
            SessionEvent::StorageFailed { reason } => {
                eprintln!("Warning: session will not be remembered: {}", reason)
            }
            _ => {}
        }
    }

    print_identity(session.state());
    Ok(())
}

fn print_identity(state: &SessionState) {
    match state {
        SessionState::Present(identity) => {
            let claims = identity.claims();
            println!("Logged in as {} ({})", identity.display_name(), identity.role());
            if let Some(email) = &claims.email {
                println!("  email:   {}", email);
            }
            if let Some(expires_at) = claims.expires_at() {
                println!("  expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
            }
            println!("  sees:    Channels, {}", identity.role().partner_label());
        }
        SessionState::Absent | SessionState::Unknown => println!("Not logged in."),
    }
}

/// Replace an error chain with the backend's message when it has one.
fn describe(err: anyhow::Error) -> anyhow::Error {
    let message = match err.chain().find_map(|cause| cause.downcast_ref::<ApiError>()) {
        Some(ApiError::Unauthorized(message)) | Some(ApiError::BadRequest(message)) => {
            Some(message.clone())
        }
        _ => None,
    };
    match message {
        Some(message) => anyhow::anyhow!(message),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signup_role() {
        let cli = Cli::try_parse_from([
            "ytmanager", "signup", "--name", "Ana", "--email", "ana@example.com", "--role", "owner",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Signup { role: Role::Owner, .. }));

        let cli = Cli::try_parse_from(["ytmanager", "signup", "--name", "A", "--email", "a@b.c"])
            .unwrap();
        assert!(matches!(cli.command, Command::Signup { role: Role::Editor, .. }));

        assert!(Cli::try_parse_from([
            "ytmanager", "signup", "--name", "A", "--email", "a@b.c", "--role", "admin",
        ])
        .is_err());
    }

    #[test]
    fn test_global_api_url_after_subcommand() {
        let cli = Cli::try_parse_from(["ytmanager", "whoami", "--api-url", "http://x:1"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://x:1"));
        assert!(matches!(cli.command, Command::Whoami));
    }

    #[test]
    fn test_describe_surfaces_backend_message() {
        let err = anyhow::Error::from(ApiError::Unauthorized("invalid email or password".into()))
            .context("Login failed");
        assert_eq!(describe(err).to_string(), "invalid email or password");

        let err = anyhow::Error::from(ApiError::RateLimited).context("Login failed");
        assert_eq!(describe(err).to_string(), "Login failed");
    }
}
