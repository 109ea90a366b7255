//! Third-party platform ("component") credentials.
//!
//! The platform pushes a `component_verify_ticket` to the component's
//! callback URL every ten minutes. The latest ticket is the only way to
//! obtain a component access token, so [`ComponentService`] stores each
//! pushed ticket and refuses to request a token until one has arrived.

use std::sync::Arc;
use std::time::Duration;

use crate::client::PlatformApi;
use crate::config::AppIdentity;
use crate::credentials::{CredentialKey, CredentialKind, CredentialManager, IssuedCredential};
use crate::message_crypto::{xml, CallbackQuery, MessageCrypto};
use crate::{Result, TrustError};

/// `InfoType` of a verify ticket push.
pub const INFO_TYPE_VERIFY_TICKET: &str = "component_verify_ticket";

/// A pushed verify ticket stays usable for twelve hours.
pub const VERIFY_TICKET_LIFETIME: Duration = Duration::from_secs(12 * 3600);

/// Verify tickets, access tokens and push messages of one third-party platform.
pub struct ComponentService {
    crypto: MessageCrypto,
    api: Arc<dyn PlatformApi>,
    credentials: Arc<CredentialManager>,
}

impl ComponentService {
    /// Create a service for the component `identity`.
    ///
    /// Fails when the identity's message key is malformed.
    pub fn new(identity: AppIdentity, api: Arc<dyn PlatformApi>, credentials: Arc<CredentialManager>) -> Result<Self> {
        Ok(Self {
            crypto: MessageCrypto::new(identity)?,
            api,
            credentials,
        })
    }

    /// The component identity.
    pub fn identity(&self) -> &AppIdentity {
        self.crypto.identity()
    }

    fn key(&self, kind: CredentialKind) -> CredentialKey {
        CredentialKey::new(self.identity().app_id.as_str(), kind)
    }

    /// Ask the platform to start pushing verify tickets.
    pub async fn start_push_ticket(&self) -> Result<()> {
        let identity = self.identity();
        self.api.start_push_ticket(&identity.app_id, &identity.secret).await?;
        tracing::info!(component_app_id = %identity.app_id, "verify ticket push started");
        Ok(())
    }

    /// Decrypt a verify ticket push and store the ticket.
    ///
    /// Returns the ticket. Pushes of any other `InfoType` are rejected with
    /// `InvalidData`, nothing is stored for them.
    pub async fn handle_ticket_push(&self, query: &CallbackQuery, body: &str) -> Result<String> {
        let plaintext = self.crypto.decrypt_callback(query, body)?;

        let info_type = xml::required_element(&plaintext, "InfoType")?;
        if info_type != INFO_TYPE_VERIFY_TICKET {
            return Err(TrustError::invalid_data(
                "InfoType",
                format!("expected {}, got {}", INFO_TYPE_VERIFY_TICKET, info_type),
            ));
        }
        let ticket = xml::required_element(&plaintext, "ComponentVerifyTicket")?.to_string();

        self.set_ticket(&ticket).await?;
        Ok(ticket)
    }

    /// Store a verify ticket obtained out of band.
    pub async fn set_ticket(&self, ticket: &str) -> Result<()> {
        let key = self.key(CredentialKind::ComponentVerifyTicket);
        self.credentials
            .store(&key, IssuedCredential::new(ticket, VERIFY_TICKET_LIFETIME))
            .await?;
        tracing::debug!(key = %key, "verify ticket stored");
        Ok(())
    }

    /// The latest verify ticket, if one is cached and fresh.
    pub async fn ticket(&self) -> Option<String> {
        self.credentials
            .cached(&self.key(CredentialKind::ComponentVerifyTicket))
            .await
            .map(|credential| credential.value)
    }

    /// A fresh component access token.
    ///
    /// Without a stored verify ticket this fails with `CredentialUnavailable`
    /// and the platform is not contacted.
    pub async fn component_access_token(&self) -> Result<String> {
        let key = self.key(CredentialKind::ComponentAccessToken);
        let token_key = &key;
        let credential = self
            .credentials
            .get_or_refresh(&key, move || async move {
                let ticket = self.ticket().await.ok_or_else(|| {
                    TrustError::credential_unavailable(token_key, "component verify ticket not received")
                })?;
                let identity = self.identity();
                self.api
                    .fetch_component_access_token(&identity.app_id, &identity.secret, &ticket)
                    .await
            })
            .await?;
        Ok(credential.value)
    }

    /// Drop the cached component access token.
    pub async fn invalidate_access_token(&self) -> Result<bool> {
        self.credentials
            .invalidate(&self.key(CredentialKind::ComponentAccessToken))
            .await
    }

    /// Encrypt a reply with the component's message key.
    pub fn encrypt_message(&self, plaintext: &str, timestamp: &str, nonce: &str) -> Result<String> {
        self.crypto.encrypt_message(plaintext, timestamp, nonce)
    }

    /// Verify and decrypt a push addressed to the component.
    pub fn decrypt_message(&self, msg_signature: &str, timestamp: &str, nonce: &str, body: &str) -> Result<String> {
        self.crypto.decrypt_message(msg_signature, timestamp, nonce, body)
    }
}

impl std::fmt::Debug for ComponentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentService")
            .field("component_app_id", &self.identity().app_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialCache;
    use crate::test_utils::{fixtures, MockPlatformApi};

    const COMPONENT_APP_ID: &str = "wx3d4f0cbc1c9a1d2e";
    const TICKET: &str = "ticket@@@lEHjsBEi_TPDey0IZxw4Zbb7JRYLOtEf9ksvDpSwzkwog3R6xEpdaK0yIee7JOyOXM0V7cp0dpM58GKmb8FSKA";

    fn identity() -> AppIdentity {
        AppIdentity::new(COMPONENT_APP_ID, "component-secret")
            .with_token("componenttoken")
            .with_encoding_aes_key(fixtures::ENCODING_AES_KEY)
    }

    fn service_with(identity: AppIdentity, api: Arc<MockPlatformApi>) -> ComponentService {
        let credentials = Arc::new(CredentialManager::new(Arc::new(InMemoryCredentialCache::new())));
        ComponentService::new(identity, api, credentials).unwrap()
    }

    fn service(api: Arc<MockPlatformApi>) -> ComponentService {
        service_with(identity(), api)
    }

    /// Encrypt `inner` the way the platform pushes it to the component.
    fn push(inner: &str) -> (CallbackQuery, String) {
        let crypto = MessageCrypto::new(identity()).unwrap();
        let envelope = crypto.encrypt(inner, "1413192605", "1320562132").unwrap();
        let body = format!(
            "<xml><AppId><![CDATA[{}]]></AppId><Encrypt><![CDATA[{}]]></Encrypt></xml>",
            COMPONENT_APP_ID, envelope.ciphertext
        );
        let query = CallbackQuery {
            timestamp: envelope.timestamp,
            nonce: envelope.nonce,
            msg_signature: Some(envelope.signature),
            encrypt_type: Some("aes".into()),
            ..Default::default()
        };
        (query, body)
    }

    fn ticket_push(ticket: &str) -> (CallbackQuery, String) {
        push(&format!(
            "<xml><AppId><![CDATA[{}]]></AppId><CreateTime>1413192605</CreateTime><InfoType><![CDATA[component_verify_ticket]]></InfoType><ComponentVerifyTicket><![CDATA[{}]]></ComponentVerifyTicket></xml>",
            COMPONENT_APP_ID, ticket
        ))
    }

    #[tokio::test]
    async fn test_ticket_push_is_stored() {
        let service = service(Arc::new(MockPlatformApi::default()));
        assert_eq!(service.ticket().await, None);

        let (query, body) = ticket_push(TICKET);
        assert_eq!(service.handle_ticket_push(&query, &body).await.unwrap(), TICKET);
        assert_eq!(service.ticket().await.as_deref(), Some(TICKET));
    }

    #[tokio::test]
    async fn test_newer_ticket_replaces_older() {
        let service = service(Arc::new(MockPlatformApi::default()));
        let (query, body) = ticket_push("ticket@@@first");
        service.handle_ticket_push(&query, &body).await.unwrap();
        let (query, body) = ticket_push("ticket@@@second");
        service.handle_ticket_push(&query, &body).await.unwrap();

        assert_eq!(service.ticket().await.as_deref(), Some("ticket@@@second"));
    }

    #[tokio::test]
    async fn test_other_info_type_rejected() {
        let service = service(Arc::new(MockPlatformApi::default()));
        let (query, body) = push(&format!(
            "<xml><AppId><![CDATA[{}]]></AppId><InfoType><![CDATA[unauthorized]]></InfoType><AuthorizerAppid><![CDATA[wxabc]]></AuthorizerAppid></xml>",
            COMPONENT_APP_ID
        ));

        let err = service.handle_ticket_push(&query, &body).await.unwrap_err();
        assert!(matches!(err, TrustError::InvalidData { ref field, .. } if field == "InfoType"));
        assert_eq!(service.ticket().await, None);
    }

    #[tokio::test]
    async fn test_forged_push_rejected() {
        let service = service(Arc::new(MockPlatformApi::default()));
        let (mut query, body) = ticket_push(TICKET);
        query.msg_signature = Some("0".repeat(40));

        assert!(service.handle_ticket_push(&query, &body).await.is_err());
        assert_eq!(service.ticket().await, None);
    }

    #[tokio::test]
    async fn test_token_requires_ticket() {
        let api = Arc::new(MockPlatformApi::default());
        let service = service(api.clone());

        let err = service.component_access_token().await.unwrap_err();
        assert!(matches!(err, TrustError::CredentialUnavailable { ref reason, .. } if reason.contains("verify ticket")));
        assert_eq!(api.component_token_calls(), 0);
    }

    #[tokio::test]
    async fn test_token_uses_latest_ticket_and_is_cached() {
        let api = Arc::new(MockPlatformApi::default());
        let service = service(api.clone());
        service.set_ticket(TICKET).await.unwrap();

        let first = service.component_access_token().await.unwrap();
        let second = service.component_access_token().await.unwrap();

        assert_eq!(first, format!("component-{}-{}-1", COMPONENT_APP_ID, TICKET));
        assert_eq!(first, second);
        assert_eq!(api.component_token_calls(), 1);

        assert!(service.invalidate_access_token().await.unwrap());
        service.component_access_token().await.unwrap();
        assert_eq!(api.component_token_calls(), 2);
    }

    #[tokio::test]
    async fn test_token_refresh_failure() {
        let api = Arc::new(MockPlatformApi::default());
        let service = service_with(
            AppIdentity::new(COMPONENT_APP_ID, "").with_encoding_aes_key(fixtures::ENCODING_AES_KEY),
            api.clone(),
        );
        service.set_ticket(TICKET).await.unwrap();

        let err = service.component_access_token().await.unwrap_err();
        assert!(matches!(err, TrustError::CredentialUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_start_push_ticket() {
        let api = Arc::new(MockPlatformApi::default());
        service(api.clone()).start_push_ticket().await.unwrap();
        assert_eq!(api.push_ticket_calls(), 1);
    }

    #[test]
    fn test_message_roundtrip() {
        let service = service(Arc::new(MockPlatformApi::default()));
        let reply = "<xml><Content><![CDATA[ok]]></Content></xml>";
        let xml = service.encrypt_message(reply, "1413192605", "1320562132").unwrap();

        let signed = crate::message_crypto::SignedEnvelope::from_xml(&xml).unwrap();
        let body = format!("<xml><Encrypt><![CDATA[{}]]></Encrypt></xml>", signed.ciphertext);
        let plain = service
            .decrypt_message(&signed.signature, &signed.timestamp, &signed.nonce, &body)
            .unwrap();
        assert_eq!(plain, reply);
    }

    #[test]
    fn test_malformed_message_key() {
        let credentials = Arc::new(CredentialManager::new(Arc::new(InMemoryCredentialCache::new())));
        let identity = AppIdentity::new(COMPONENT_APP_ID, "secret").with_encoding_aes_key("short");
        let err = ComponentService::new(identity, Arc::new(MockPlatformApi::default()), credentials).unwrap_err();
        assert!(matches!(err, TrustError::InvalidKey(_)));
    }
}
