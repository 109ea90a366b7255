//! WeChat Trust CLI
//!
//! Command-line access to the trust layer: callback handshakes, push-message
//! encryption, pay API request signing, webhook verification and platform
//! certificate downloads.
//!
//! Secrets are read from the same environment variables the library's
//! `from_env` loaders use, so they never need to appear on the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

use commands::{AppArgs, MerchantArgs};

#[derive(Parser)]
#[command(name = "wechat-trust")]
#[command(about = "WeChat trust layer CLI - sign, verify and decrypt platform traffic", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a server URL handshake (prints echostr or "fail")
    Handshake {
        /// Callback token
        #[arg(long, env = "WECHAT_TOKEN", hide_env_values = true)]
        token: String,

        /// `signature` query parameter
        #[arg(long)]
        signature: String,

        /// `timestamp` query parameter
        #[arg(long)]
        timestamp: String,

        /// `nonce` query parameter
        #[arg(long)]
        nonce: String,

        /// `echostr` query parameter
        #[arg(long)]
        echostr: String,
    },

    /// Encrypt a push message into its XML wire form
    Encrypt {
        #[command(flatten)]
        app: AppArgs,

        /// File with the plaintext message, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Timestamp to sign with (defaults to now)
        #[arg(long)]
        timestamp: Option<String>,

        /// Nonce to sign with (defaults to a random one)
        #[arg(long)]
        nonce: Option<String>,
    },

    /// Verify and decrypt a push message body
    Decrypt {
        #[command(flatten)]
        app: AppArgs,

        /// File with the XML body, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        /// `msg_signature` query parameter (defaults to the body's MsgSignature)
        #[arg(long)]
        msg_signature: Option<String>,

        /// `timestamp` query parameter (defaults to the body's TimeStamp)
        #[arg(long)]
        timestamp: Option<String>,

        /// `nonce` query parameter (defaults to the body's Nonce)
        #[arg(long)]
        nonce: Option<String>,
    },

    /// Sign a pay API request and print its Authorization header
    Sign {
        #[command(flatten)]
        merchant: MerchantArgs,

        /// HTTP method
        method: String,

        /// Request path including the query string
        path: String,

        /// File with the request body
        #[arg(long)]
        body: Option<String>,
    },

    /// Verify and decrypt a webhook notification against local certificates
    VerifyWebhook {
        /// Platform certificate PEM files
        #[arg(long = "cert", required = true)]
        certs: Vec<String>,

        /// APIv3 key (32 bytes)
        #[arg(long, env = "WECHATPAY_API_V3_KEY", hide_env_values = true)]
        api_v3_key: String,

        /// `Wechatpay-Signature` header
        #[arg(long)]
        signature: String,

        /// `Wechatpay-Serial` header
        #[arg(long)]
        serial: String,

        /// `Wechatpay-Timestamp` header
        #[arg(long)]
        timestamp: String,

        /// `Wechatpay-Nonce` header
        #[arg(long)]
        nonce: String,

        /// File with the notification body, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Reject timestamps further than this many seconds from now
        #[arg(long)]
        max_skew: Option<u64>,
    },

    /// Download and decrypt the platform certificates
    Certificates {
        #[command(flatten)]
        merchant: MerchantArgs,

        /// APIv3 key (32 bytes)
        #[arg(long, env = "WECHATPAY_API_V3_KEY", hide_env_values = true)]
        api_v3_key: String,

        /// Pay API base URL
        #[arg(long, env = "WECHATPAY_API_BASE_URL")]
        base_url: Option<String>,

        /// Directory to write `<serial>.pem` files into
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Sign a page URL for the JS-SDK `wx.config`
    Jssdk {
        /// jsapi ticket
        #[arg(long, env = "WECHAT_JSAPI_TICKET", hide_env_values = true)]
        ticket: String,

        /// Page URL (the fragment is ignored)
        url: String,

        /// Nonce to sign with (defaults to a random one)
        #[arg(long)]
        nonce: Option<String>,

        /// Timestamp to sign with (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Encrypt a sensitive field for a platform certificate (RSA-OAEP)
    EncryptField {
        /// Platform certificate PEM file
        #[arg(long)]
        cert: String,

        /// Field value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG overrides the defaults
    let default_filter = if cli.verbose {
        "wechat_trust_cli=debug,wechat_trust_lib=debug"
    } else {
        "wechat_trust_cli=info,wechat_trust_lib=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch commands
    let result = match cli.command {
        Commands::Handshake {
            token,
            signature,
            timestamp,
            nonce,
            echostr,
        } => commands::handshake::run(&token, &signature, &timestamp, &nonce, &echostr),
        Commands::Encrypt {
            app,
            input,
            timestamp,
            nonce,
        } => commands::message::encrypt(&app, &input, timestamp, nonce),
        Commands::Decrypt {
            app,
            input,
            msg_signature,
            timestamp,
            nonce,
        } => commands::message::decrypt(&app, &input, msg_signature, timestamp, nonce),
        Commands::Sign {
            merchant,
            method,
            path,
            body,
        } => commands::sign::run(&merchant, &method, &path, body.as_deref(), cli.verbose),
        Commands::VerifyWebhook {
            certs,
            api_v3_key,
            signature,
            serial,
            timestamp,
            nonce,
            input,
            max_skew,
        } => {
            let headers = commands::webhook::HeaderArgs {
                signature,
                serial,
                timestamp,
                nonce,
            };
            commands::webhook::run(&certs, &api_v3_key, headers, &input, max_skew)
        }
        Commands::Certificates {
            merchant,
            api_v3_key,
            base_url,
            out,
        } => commands::certificates::run(&merchant, &api_v3_key, base_url, out.as_deref()).await,
        Commands::Jssdk {
            ticket,
            url,
            nonce,
            timestamp,
        } => commands::jssdk::run(&ticket, &url, nonce, timestamp),
        Commands::EncryptField { cert, value } => commands::sensitive::encrypt(&cert, &value),
    };

    if let Err(err) = &result {
        ui::error(&format!("{:#}", err));
        std::process::exit(1);
    }
    Ok(())
}
