//! Lorley CLI - command-line client for the Lorley business directory API.
//!
//! Every command prints the operation's JSON result on stdout and exits
//! non-zero when the operation did not succeed.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lorley_core::api::ImageFile;
use lorley_core::mail::{self, LogMailer, MailConfig, OtpEmail};
use lorley_core::{
    AccountApi, AccountKind, CategoryApi, Config, OperationResult, ReqwestTransport, SessionManager,
};

#[derive(Parser)]
#[command(name = "lorley")]
#[command(about = "Command-line client for the Lorley business directory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Act as a business account instead of a user account
    #[arg(long, global = true)]
    business: bool,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (prompts for a password)
    Register { name: String, email: String },

    /// Email a verification OTP
    SendOtp { email: String },

    /// Verify an emailed OTP and sign in
    VerifyOtp { email: String, otp: String },

    /// Sign in (prompts for a password)
    Login {
        /// Defaults to the last email used
        email: Option<String>,
    },

    /// Sign out and forget stored tokens
    Logout,

    /// Request a password-reset OTP
    ForgotPassword { email: String },

    /// Set a new password (prompts for it)
    ResetPassword { email: String },

    /// Show an account profile
    Profile { id: String },

    /// Update profile fields from a JSON object
    UpdateProfile {
        /// e.g. '{"name": "Ada"}'
        fields: String,
    },

    /// Delete an account (prompts for the password)
    DeleteAccount { id: String },

    /// Upload a new profile image
    UploadImage { path: PathBuf },

    /// Exchange the refresh token for a new access token
    Refresh,

    /// List business categories
    Categories,

    /// Add a business category
    AddCategory {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Compose the OTP email from MAIL_* settings and log it
    MailPreview { email: String, otp: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lorley.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_ref());

    let mut config = Config::load()?;
    let account = if cli.business {
        AccountKind::Business
    } else {
        config.account_kind
    };
    info!(account = %account, api = %config.api_url, "Lorley CLI starting");

    let transport = Arc::new(ReqwestTransport::new(&config.api_url, config.request_timeout())?);
    let store = config.token_store(account)?;
    let session = SessionManager::new(transport, store, config.session_options(account));
    let accounts = AccountApi::new(session.clone());

    match cli.command {
        Commands::Register { name, email } => {
            let password = rpassword::prompt_password("Password: ")?;
            emit(&accounts.register(&name, &email, &password).await)
        }
        Commands::SendOtp { email } => emit(&accounts.send_otp(&email).await),
        Commands::VerifyOtp { email, otp } => {
            let result = accounts.verify_otp(&email, &otp).await;
            if result.success {
                remember_login(&mut config, account, &email);
            }
            emit(&result)
        }
        Commands::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => anyhow::bail!("No email given and none remembered from a previous login"),
            };
            let password = rpassword::prompt_password(format!("Password for {}: ", email))?;
            let result = accounts.login(&email, &password).await;
            if result.success {
                remember_login(&mut config, account, &email);
            }
            emit(&result)
        }
        Commands::Logout => {
            accounts.logout();
            emit(&OperationResult::ok(()).with_message(Some("Logged out.".into())))
        }
        Commands::ForgotPassword { email } => emit(&accounts.forgot_password(&email).await),
        Commands::ResetPassword { email } => {
            let password = rpassword::prompt_password("New password: ")?;
            emit(&accounts.reset_password(&email, &password).await)
        }
        Commands::Profile { id } => emit(&accounts.fetch_profile(&id).await),
        Commands::UpdateProfile { fields } => {
            let fields: Value =
                serde_json::from_str(&fields).context("Profile fields must be a JSON object")?;
            emit(&accounts.update_profile(fields).await)
        }
        Commands::DeleteAccount { id } => {
            let password = rpassword::prompt_password("Password: ")?;
            emit(&accounts.delete_account(&id, &password).await)
        }
        Commands::UploadImage { path } => {
            let file = ImageFile::from_path(&path)?;
            emit(&accounts.upload_profile_image(file).await)
        }
        Commands::Refresh => emit(&session.refresh().await),
        Commands::Categories => emit(&CategoryApi::new(session).fetch_categories().await),
        Commands::AddCategory { name, description } => {
            let mut category = json!({ "name": name });
            if let Some(description) = description {
                category["description"] = Value::String(description);
            }
            emit(&CategoryApi::new(session).add_category(category).await)
        }
        Commands::MailPreview { email, otp } => {
            let mail_config = MailConfig::from_env()?;
            let mail = OtpEmail::compose(&mail_config, &email, &otp)?;
            println!("Subject: {}\nFrom: {}\nTo: {}\n\n{}", mail.subject, mail.from, mail.to, mail.text);
            emit(&mail::send_otp_mail(&LogMailer, &mail_config, &email, &otp).await)
        }
    }
}

/// Remember who signed in so `login` can default to it next time.
fn remember_login(config: &mut Config, account: AccountKind, email: &str) {
    config.last_email = Some(email.to_string());
    config.account_kind = account;
    if let Err(e) = config.save() {
        debug!(error = %e, "Failed to save config");
    }
}

fn emit<T: Serialize>(result: &OperationResult<T>) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
