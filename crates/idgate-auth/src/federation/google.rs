//! Google identity provider.
//!
//! Requests offline access by default so the token response carries a
//! refresh token. Revocation at Google invalidates the whole grant: revoking
//! either the access token or the refresh token kills both.

use async_trait::async_trait;
use url::Url;

use super::claims;
use super::client::{ProviderHttpClient, map_oauth_error};
use super::jwks::{JwksCache, JwksCacheConfig};
use super::provider::{IdentityProvider, ProviderConfig, authorization_url, resolve_endpoint};
use super::types::{IdTokenClaims, OAuthErrorResponse, TokenResponse, UserInfo, bool_field, str_field};
use crate::AuthResult;
use crate::error::AuthError;

/// Registered provider name.
pub const NAME: &str = "google";

const AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const REVOCATION_URL: &str = "https://oauth2.googleapis.com/revoke";
const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

const ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];
const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];
const DEFAULT_ACCESS_TYPE: &str = "offline";

/// Google OAuth 2.0 / OpenID Connect provider.
pub struct GoogleProvider {
    config: ProviderConfig,
    authorization_url: Url,
    token_url: Url,
    userinfo_url: Url,
    revocation_url: Url,
    jwks_url: Url,
    http: ProviderHttpClient,
    jwks: JwksCache,
}

impl GoogleProvider {
    /// Builds the provider from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` for missing credentials or
    /// unusable endpoint overrides.
    pub fn new(config: ProviderConfig) -> AuthResult<Self> {
        config.validate(NAME)?;

        let endpoints = &config.options.endpoints;
        let allow_http = config.options.allow_insecure_http;
        let http = ProviderHttpClient::new(config.request_timeout)?;
        let jwks = JwksCache::new(
            http.inner().clone(),
            JwksCacheConfig::default().with_allow_http(allow_http),
        );

        Ok(Self {
            authorization_url: resolve_endpoint(
                NAME,
                endpoints.authorization.as_ref(),
                AUTHORIZATION_URL,
                allow_http,
            )?,
            token_url: resolve_endpoint(NAME, endpoints.token.as_ref(), TOKEN_URL, allow_http)?,
            userinfo_url: resolve_endpoint(
                NAME,
                endpoints.userinfo.as_ref(),
                USERINFO_URL,
                allow_http,
            )?,
            revocation_url: resolve_endpoint(
                NAME,
                endpoints.revocation.as_ref(),
                REVOCATION_URL,
                allow_http,
            )?,
            jwks_url: resolve_endpoint(NAME, endpoints.jwks.as_ref(), JWKS_URL, allow_http)?,
            http,
            jwks,
            config,
        })
    }

    /// Provider-specific authorization parameters.
    fn provider_params(&self) -> Vec<(&'static str, String)> {
        let options = &self.config.options;
        let mut params = vec![(
            "access_type",
            options
                .access_type
                .clone()
                .unwrap_or_else(|| DEFAULT_ACCESS_TYPE.to_string()),
        )];
        if options.force_consent {
            params.push(("prompt", "consent".to_string()));
        }
        if let [domain] = options.allowed_domains.as_slice() {
            params.push(("hd", domain.clone()));
        }
        params
    }
}

/// Maps a Google user-info payload. Accepts both the OIDC shape
/// (`sub`, `email_verified`) and the legacy v2 shape (`id`, `verified_email`).
fn normalize(raw: serde_json::Value) -> UserInfo {
    UserInfo {
        id: str_field(&raw, "sub")
            .or_else(|| str_field(&raw, "id"))
            .unwrap_or_default(),
        email: str_field(&raw, "email"),
        email_verified: bool_field(&raw, "email_verified")
            .or_else(|| bool_field(&raw, "verified_email"))
            .unwrap_or(false),
        name: str_field(&raw, "name"),
        picture: str_field(&raw, "picture"),
        locale: str_field(&raw, "locale"),
        provider: NAME.to_string(),
        raw,
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_authorization_url(&self, state: &str, extra_params: &[(&str, &str)]) -> Url {
        let scope = self.config.effective_scopes(DEFAULT_SCOPES).join(" ");
        authorization_url(
            &self.authorization_url,
            &self.config,
            &scope,
            state,
            &self.provider_params(),
            extra_params,
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> AuthResult<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.http.exchange_code(self, &self.token_url, &params).await
    }

    async fn get_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let raw = self
            .http
            .get_json(NAME, &self.userinfo_url, access_token, "application/json")
            .await?;
        let user = self.normalize_user_info(raw);
        if user.id.is_empty() {
            return Err(AuthError::token_exchange(NAME, "user info has no subject"));
        }
        Ok(user)
    }

    fn normalize_user_info(&self, raw: serde_json::Value) -> UserInfo {
        normalize(raw)
    }

    fn expected_issuers(&self) -> &[&str] {
        ISSUERS
    }

    fn validate_extension_claims(&self, claims: &IdTokenClaims) -> AuthResult<()> {
        let options = &self.config.options;

        if options.require_verified_email && claims.email_verified != Some(true) {
            return Err(AuthError::EmailNotVerified);
        }

        if !options.allowed_domains.is_empty() {
            let domain = claims.hd.as_deref().unwrap_or_default();
            if domain.is_empty() || !options.is_domain_allowed(domain) {
                tracing::warn!(provider = NAME, domain, "sign-in from disallowed domain");
                return Err(AuthError::domain_not_allowed(domain));
            }
        }

        Ok(())
    }

    async fn decode_id_token(&self, id_token: &str) -> AuthResult<IdTokenClaims> {
        claims::verify_id_token(self, &self.jwks, &self.jwks_url, id_token).await
    }

    /// Revokes the grant behind `token`. Google ignores the hint: access
    /// and refresh tokens of the grant are both invalidated.
    async fn revoke_token(&self, token: &str, _token_type_hint: Option<&str>) -> AuthResult<()> {
        let request = self
            .http
            .inner()
            .post(self.revocation_url.as_str())
            .form(&[("token", token)]);
        self.http.revoke(NAME, request).await
    }

    fn handle_provider_error(&self, body: &str) -> AuthError {
        match OAuthErrorResponse::parse(body) {
            Some(error) => map_oauth_error(NAME, &error),
            None => AuthError::token_exchange(NAME, "unrecognized error response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::provider::{ProviderEndpoints, ProviderOptions};
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &[u8] = b"idgate-signing-secret-for-tests-0001";
    const SECRET_B64: &str = "aWRnYXRlLXNpZ25pbmctc2VjcmV0LWZvci10ZXN0cy0wMDAx";

    fn config() -> ProviderConfig {
        ProviderConfig::new("client-1", "secret-1", "https://app.example/auth/google/callback")
    }

    fn provider(config: ProviderConfig) -> GoogleProvider {
        GoogleProvider::new(config).unwrap()
    }

    fn mocked(server: &MockServer, options: ProviderOptions) -> GoogleProvider {
        let base = server.uri();
        let url = |p: &str| Some(Url::parse(&format!("{base}{p}")).unwrap());
        let endpoints = ProviderEndpoints {
            token: url("/token"),
            userinfo: url("/userinfo"),
            revocation: url("/revoke"),
            jwks: url("/certs"),
            ..ProviderEndpoints::default()
        };
        provider(
            config().with_options(
                options
                    .with_endpoints(endpoints)
                    .with_allow_insecure_http(true),
            ),
        )
    }

    fn claims() -> IdTokenClaims {
        let now = claims::now_unix();
        IdTokenClaims {
            iss: "https://accounts.google.com".to_string(),
            sub: "10769150350006150715113082367".to_string(),
            aud: vec!["client-1".to_string()],
            exp: now + 3600,
            iat: now,
            azp: None,
            email: Some("jsmith@example.com".to_string()),
            email_verified: Some(true),
            hd: Some("example.com".to_string()),
            name: None,
            picture: None,
            locale: None,
            extra: HashMap::new(),
        }
    }

    fn sign(claims: &IdTokenClaims) -> String {
        let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some("test-key".to_string());
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    async fn mount_jwks(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "oct", "kid": "test-key", "alg": "HS256", "k": SECRET_B64}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_authorization_url_defaults() {
        let google = provider(config());
        let url = google.build_authorization_url("xyz", &[]);

        assert!(url.as_str().starts_with(AUTHORIZATION_URL));
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["redirect_uri"], "https://app.example/auth/google/callback");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["access_type"], "offline");
        assert!(!params.contains_key("prompt"));
        assert!(!params.contains_key("hd"));
    }

    #[test]
    fn test_authorization_url_consent_and_domain_hint() {
        let google = provider(
            config().with_options(
                ProviderOptions::default()
                    .with_force_consent(true)
                    .with_allowed_domains(["example.com"]),
            ),
        );
        let url = google.build_authorization_url("s", &[("login_hint", "a@example.com")]);
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["hd"], "example.com");
        assert_eq!(params["login_hint"], "a@example.com");

        let again = google.build_authorization_url("s", &[("login_hint", "a@example.com")]);
        assert_eq!(url, again);
    }

    #[test]
    fn test_normalize_oidc_and_v2_payloads() {
        let google = provider(config());

        let user = google.normalize_user_info(json!({
            "sub": "123",
            "email": "a@example.com",
            "email_verified": true,
            "name": "A",
            "picture": "https://lh3.googleusercontent.com/a",
            "locale": "en"
        }));
        assert_eq!(user.id, "123");
        assert!(user.email_verified);
        assert_eq!(user.locale.as_deref(), Some("en"));
        assert_eq!(user.provider, "google");

        let user = google.normalize_user_info(json!({
            "id": "456",
            "email": "b@example.com",
            "verified_email": true
        }));
        assert_eq!(user.id, "456");
        assert!(user.email_verified);
        assert!(user.picture.is_none());
        assert!(user.name.is_none());
    }

    #[test]
    fn test_normalize_tolerates_missing_fields() {
        let google = provider(config());
        let user = google.normalize_user_info(json!({}));
        assert_eq!(user.id, "");
        assert!(user.email.is_none());
        assert!(!user.email_verified);
    }

    #[test]
    fn test_claims_valid() {
        let google = provider(config());
        assert!(google.validate_id_token_claims(&claims()).is_ok());
    }

    #[test]
    fn test_claims_unverified_email() {
        let google = provider(config());
        let mut c = claims();
        c.email_verified = Some(false);
        assert!(matches!(
            google.validate_id_token_claims(&c),
            Err(AuthError::EmailNotVerified)
        ));

        let lenient = provider(
            config().with_options(ProviderOptions::default().with_require_verified_email(false)),
        );
        assert!(lenient.validate_id_token_claims(&c).is_ok());
    }

    #[test]
    fn test_claims_domain_allow_list() {
        let google = provider(
            config().with_options(ProviderOptions::default().with_allowed_domains(["corp.example"])),
        );

        let c = claims();
        assert!(matches!(
            google.validate_id_token_claims(&c),
            Err(AuthError::DomainNotAllowed { domain }) if domain == "example.com"
        ));

        let mut c = claims();
        c.hd = None;
        assert!(matches!(
            google.validate_id_token_claims(&c),
            Err(AuthError::DomainNotAllowed { .. })
        ));

        let mut c = claims();
        c.hd = Some("corp.example".to_string());
        assert!(google.validate_id_token_claims(&c).is_ok());
    }

    #[test]
    fn test_generic_checks_run_before_extensions() {
        let google = provider(
            config().with_options(ProviderOptions::default().with_allowed_domains(["corp.example"])),
        );
        let mut c = claims();
        c.iss = "https://evil.example".to_string();
        c.email_verified = Some(false);
        assert!(matches!(
            google.validate_id_token_claims(&c),
            Err(AuthError::InvalidIdToken { .. })
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let google = provider(config());
        let mut c = claims();
        c.exp = claims::now_unix() - 1;
        assert!(matches!(
            google.validate_id_token_claims(&c),
            Err(AuthError::InvalidIdToken { .. })
        ));
    }

    #[test]
    fn test_handle_provider_error() {
        let google = provider(config());
        assert!(matches!(
            google.handle_provider_error(r#"{"error":"access_denied"}"#),
            AuthError::InvalidRequest { .. }
        ));
        assert!(matches!(
            google.handle_provider_error(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#),
            AuthError::TokenExchangeFailure { .. }
        ));
        assert!(matches!(
            google.handle_provider_error("<html>oops</html>"),
            AuthError::TokenExchangeFailure { .. }
        ));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=4%2F0Adeu"))
            .and(body_string_contains("client_secret=secret-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.a0",
                "expires_in": 3599,
                "refresh_token": "1//0g",
                "scope": "openid email profile",
                "token_type": "Bearer",
                "id_token": "eyJ.x.y"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let google = mocked(&server, ProviderOptions::default());
        let token = google
            .exchange_code("4/0Adeu", "https://app.example/auth/google/callback")
            .await
            .unwrap();
        assert_eq!(token.access_token, "ya29.a0");
        assert_eq!(token.refresh_token.as_deref(), Some("1//0g"));
        assert_eq!(token.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_exchange_code_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Malformed auth code."
            })))
            .mount(&server)
            .await;

        let google = mocked(&server, ProviderOptions::default());
        let err = google.exchange_code("bad", "https://app.example/cb").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeFailure { .. }));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_exchange_code_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let google = mocked(&server, ProviderOptions::default());
        let err = google.exchange_code("c", "https://app.example/cb").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeFailure { .. }));
    }

    #[tokio::test]
    async fn test_exchange_code_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "late"}))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let base = config().with_request_timeout(std::time::Duration::from_millis(50));
        let endpoints = ProviderEndpoints {
            token: Some(Url::parse(&format!("{}/token", server.uri())).unwrap()),
            ..ProviderEndpoints::default()
        };
        let google = provider(base.with_options(
            ProviderOptions::default()
                .with_endpoints(endpoints)
                .with_allow_insecure_http(true),
        ));

        let err = google.exchange_code("c", "https://app.example/cb").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeFailure { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_get_user_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer ya29.a0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "110169484474386276334",
                "email": "jsmith@example.com",
                "email_verified": true,
                "hd": "example.com"
            })))
            .mount(&server)
            .await;

        let google = mocked(&server, ProviderOptions::default());
        let user = google.get_user_info("ya29.a0").await.unwrap();
        assert_eq!(user.id, "110169484474386276334");
        assert_eq!(user.raw["hd"], "example.com");
    }

    #[tokio::test]
    async fn test_decode_id_token() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;

        let google = mocked(&server, ProviderOptions::default());
        let token = sign(&claims());
        let decoded = google.decode_id_token(&token).await.unwrap();
        assert_eq!(decoded.sub, "10769150350006150715113082367");
        assert_eq!(decoded.hd.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_decode_id_token_rejects_bad_signature() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;

        let google = mocked(&server, ProviderOptions::default());
        let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some("test-key".to_string());
        let forged = jsonwebtoken::encode(
            &header,
            &claims(),
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();

        assert!(matches!(
            google.decode_id_token(&forged).await,
            Err(AuthError::InvalidIdToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_decode_id_token_expired() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;

        let google = mocked(&server, ProviderOptions::default());
        let mut c = claims();
        c.exp = claims::now_unix() - 1;
        let err = google.decode_id_token(&sign(&c)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidIdToken { .. }));
    }

    #[tokio::test]
    async fn test_decode_id_token_domain_violation() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;

        let google = mocked(
            &server,
            ProviderOptions::default().with_allowed_domains(["corp.example"]),
        );
        let err = google.decode_id_token(&sign(&claims())).await.unwrap_err();
        assert!(matches!(err, AuthError::DomainNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .and(body_string_contains("token=1%2F%2F0g"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_token"})),
            )
            .mount(&server)
            .await;

        let google = mocked(&server, ProviderOptions::default());
        google.revoke_token("1//0g", Some("refresh_token")).await.unwrap();
        google.revoke_token("1//0g", Some("refresh_token")).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_network_failure() {
        let endpoints = ProviderEndpoints {
            revocation: Some(Url::parse("http://127.0.0.1:1/revoke").unwrap()),
            ..ProviderEndpoints::default()
        };
        let google = provider(config().with_options(
            ProviderOptions::default()
                .with_endpoints(endpoints)
                .with_allow_insecure_http(true),
        ));

        assert!(matches!(
            google.revoke_token("t", None).await,
            Err(AuthError::RevocationFailure { .. })
        ));
    }
}
