//! Certificates command - download the platform certificates

use std::path::Path;

use anyhow::{Context, Result};
use wechat_trust_lib::certificates::fetch_all;
use wechat_trust_lib::client::HttpPlatformClient;
use wechat_trust_lib::config::ClientConfig;

use super::MerchantArgs;
use crate::ui;

/// Download, decrypt and list the platform certificates, optionally
/// writing each one to `<out>/<serial>.pem`.
pub async fn run(merchant: &MerchantArgs, api_v3_key: &str, base_url: Option<String>, out: Option<&str>) -> Result<()> {
    let signer = merchant.signer()?;

    let mut config = ClientConfig::from_env();
    if let Some(url) = base_url {
        config.pay_base_url = url;
    }
    let client = HttpPlatformClient::new(config)?;

    tracing::info!(mch_id = %signer.mch_id(), "downloading platform certificates");
    let certificates = fetch_all(&client, &signer, api_v3_key.as_bytes()).await?;

    if certificates.is_empty() {
        ui::warning("The platform published no certificates");
        return Ok(());
    }

    ui::header("Platform Certificates");
    let now = chrono::Utc::now();
    let mut sorted: Vec<_> = certificates.iter().collect();
    sorted.sort_by_key(|c| c.effective_time);

    for certificate in sorted {
        ui::key_value("Serial", &certificate.serial_no);
        ui::key_value("Effective", &certificate.effective_time.to_rfc3339());
        ui::key_value("Expires", &certificate.expire_time.to_rfc3339());
        ui::key_value(
            "Status",
            if certificate.is_valid_at(now) { "valid" } else { "not currently valid" },
        );
        ui::separator();
    }

    if let Some(dir) = out {
        let dir = Path::new(dir);
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        for certificate in certificates.iter() {
            let path = dir.join(format!("{}.pem", certificate.serial_no));
            std::fs::write(&path, &certificate.pem).with_context(|| format!("writing {}", path.display()))?;
        }
        ui::success(&format!("Wrote {} certificate(s) to {}", certificates.len(), dir.display()));
    }

    Ok(())
}
