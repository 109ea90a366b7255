//! Jssdk command - `wx.config` signatures

use anyhow::Result;
use wechat_trust_lib::nonce::{create_nonce_str, unix_timestamp, NONCE_DEFAULT_LEN};
use wechat_trust_lib::tokens::sign_jssdk_url;

/// Print the JSON object a page passes to `wx.config`, minus the app id.
pub fn run(ticket: &str, url: &str, nonce: Option<String>, timestamp: Option<i64>) -> Result<()> {
    let nonce = nonce.unwrap_or_else(|| create_nonce_str(NONCE_DEFAULT_LEN));
    let timestamp = timestamp.unwrap_or_else(unix_timestamp);

    let signature = sign_jssdk_url(ticket, &nonce, timestamp, url);
    let value = serde_json::json!({
        "timestamp": timestamp,
        "nonceStr": nonce,
        "signature": signature,
    });
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}
