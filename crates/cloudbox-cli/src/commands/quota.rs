//! Quota command.

use cloudbox_core::config::ClientConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::types::{QuotaLevel, format_bytes};

use crate::output::{self, OutputFormat};

/// Execute the quota command
pub async fn execute(config: ClientConfig, format: OutputFormat) -> Result<(), AppError> {
    let ctx = super::connect(config).await?;
    let listing = ctx.browser().refresh().await?;
    let quota = listing.quota;

    if format == OutputFormat::Json {
        output::print_item(&quota, format);
        return Ok(());
    }

    output::print_kv("Used", &format_bytes(quota.used));
    output::print_kv("Quota", &format_bytes(quota.quota));
    output::print_kv("Remaining", &format_bytes(quota.remaining));
    output::print_kv("Filled", &format!("{:.1}%", quota.clamped_percentage()));
    match quota.level() {
        QuotaLevel::Normal => {}
        QuotaLevel::Warning => output::print_warning("Storage is filling up"),
        QuotaLevel::Critical => output::print_warning("Storage is almost full"),
    }
    Ok(())
}
