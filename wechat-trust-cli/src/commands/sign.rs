//! Sign command - pay API request signatures

use anyhow::Result;

use super::{read_input, MerchantArgs};
use crate::ui;

/// Sign a request and print its `Authorization` header value.
pub fn run(merchant: &MerchantArgs, method: &str, path: &str, body: Option<&str>, verbose: bool) -> Result<()> {
    let signer = merchant.signer()?;
    let body = body.map(read_input).transpose()?;

    let signed = signer.sign_request(method, path, body.as_deref())?;

    if verbose {
        ui::header("Signed Request");
        ui::key_value("Method", &signed.method);
        ui::key_value("Path", &signed.path);
        ui::key_value("Timestamp", &signed.timestamp.to_string());
        ui::key_value("Nonce", &signed.nonce);
        ui::key_value("Signature", &signed.signature);
        ui::separator();
    }
    println!("{}", signed.authorization);
    Ok(())
}
