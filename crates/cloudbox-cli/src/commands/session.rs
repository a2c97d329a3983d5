//! Login, logout and status commands.

use clap::Args;
use serde::Serialize;

use cloudbox_client::ClientContext;
use cloudbox_client::context::Session;
use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the login command
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// One-time bootstrap token issued by the service
    pub token: String,
}

#[derive(Debug, Serialize)]
struct StatusView {
    state: String,
    mode: String,
    user: Option<String>,
    is_admin: bool,
    access_expires_at: Option<String>,
    access_fresh: Option<bool>,
    idle_seconds_left: Option<u64>,
}

/// Execute the login command
pub async fn login(
    args: &LoginArgs,
    config: ClientConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let ctx = ClientContext::new(config)?;
    ctx.login(args.token.trim()).await?;
    let user = ctx.resume().await?;
    match format {
        OutputFormat::Table => output::print_success(&format!("Signed in as {}", user.display_name)),
        OutputFormat::Json => output::print_item(&user, format),
    }
    Ok(())
}

/// Execute the logout command
pub async fn logout(config: ClientConfig) -> Result<(), AppError> {
    let ctx = ClientContext::new(config)?;
    ctx.logout().await;
    output::print_success("Signed out");
    Ok(())
}

/// Execute the status command
pub async fn status(config: ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    let mode = config.session.mode.to_string();
    let ctx = ClientContext::new(config)?;
    let user = match ctx.resume().await {
        Ok(user) => Some(user),
        Err(e) if e.is_authentication() => None,
        Err(e) => return Err(e),
    };

    let (access_expires_at, access_fresh, idle_seconds_left) = match ctx.session() {
        Session::Rotating(s) => (
            s.access_expiry().map(|t| t.to_rfc3339()),
            Some(s.is_access_fresh()),
            None,
        ),
        Session::Idle(s) => (None, None, s.remaining().map(|d| d.as_secs())),
    };
    let view = StatusView {
        state: ctx.state().to_string(),
        mode,
        user: user.as_ref().map(|u| u.display_name.clone()),
        is_admin: user.as_ref().is_some_and(|u| u.is_admin),
        access_expires_at,
        access_fresh,
        idle_seconds_left,
    };

    match format {
        OutputFormat::Json => output::print_item(&view, format),
        OutputFormat::Table => {
            output::print_kv("State", &view.state);
            output::print_kv("Mode", &view.mode);
            output::print_kv("User", view.user.as_deref().unwrap_or("-"));
            output::print_kv("Admin", if view.is_admin { "yes" } else { "no" });
            if let Some(expiry) = &view.access_expires_at {
                output::print_kv("Access token expires", expiry);
            }
            if let Some(fresh) = view.access_fresh {
                output::print_kv("Access token", if fresh { "fresh" } else { "stale" });
            }
            if let Some(left) = view.idle_seconds_left {
                output::print_kv("Idle logout in", &format!("{}s", left));
            }
        }
    }
    Ok(())
}
