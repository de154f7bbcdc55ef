//! Federated login orchestration.
//!
//! Ties a configured set of providers to the two halves of the external
//! authorization-code flow: sending the user to the provider, and turning
//! the callback `code` into a verified [`UserInfo`].

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use super::provider::{IdentityProvider, ProviderConfig};
use super::registry::ProviderRegistry;
use super::types::{IdTokenClaims, TokenResponse, UserInfo};
use crate::AuthResult;
use crate::error::AuthError;

/// Result of a completed federated login.
#[derive(Debug)]
pub struct FederatedIdentity {
    /// Verified, normalized user identity.
    pub user: UserInfo,

    /// Validated ID token claims, for providers that issue ID tokens.
    pub claims: Option<IdTokenClaims>,

    /// Provider tokens. Callers that do not need them should revoke them.
    pub tokens: TokenResponse,
}

/// Configured providers keyed by name.
pub struct FederationService {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl FederationService {
    /// Builds every configured provider through `registry`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedProvider` for a configured name that is not
    /// registered, or the provider's configuration error.
    pub fn from_config(
        registry: &ProviderRegistry,
        configs: &BTreeMap<String, ProviderConfig>,
    ) -> AuthResult<Self> {
        let providers = configs
            .iter()
            .map(|(name, config)| registry.create(name, config.clone()))
            .collect::<AuthResult<Vec<_>>>()?;

        for provider in &providers {
            tracing::info!(provider = provider.name(), "identity provider enabled");
        }
        Ok(Self { providers })
    }

    /// Wraps already-built providers.
    #[must_use]
    pub fn with_providers(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    /// Looks up an enabled provider by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedProvider` if it is not enabled.
    pub fn provider(&self, name: &str) -> AuthResult<Arc<dyn IdentityProvider>> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| AuthError::unsupported_provider(name.to_ascii_lowercase()))
    }

    /// Names of the enabled providers.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Returns the provider authorization URL for `state`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedProvider` for unknown providers.
    pub fn login_url(&self, name: &str, state: &str, extra_params: &[(&str, &str)]) -> AuthResult<Url> {
        let provider = self.provider(name)?;
        Ok(provider.build_authorization_url(state, extra_params))
    }

    /// Completes a login from the provider callback `code`.
    ///
    /// Exchanges the code, verifies the ID token when the provider issues
    /// one, fetches user info and checks that both name the same subject.
    ///
    /// # Errors
    ///
    /// Propagates provider errors unchanged; a missing or mismatched ID token
    /// is `InvalidIdToken`.
    pub async fn complete_login(&self, name: &str, code: &str) -> AuthResult<FederatedIdentity> {
        let provider = self.provider(name)?;
        let tokens = provider
            .exchange_code(code, &provider.config().redirect_uri)
            .await?;

        let claims = match tokens.id_token.as_deref() {
            Some(id_token) if provider.issues_id_tokens() => {
                Some(provider.decode_id_token(id_token).await?)
            }
            None if provider.issues_id_tokens() => {
                return Err(AuthError::invalid_id_token(
                    "token response did not include an ID token",
                ));
            }
            _ => None,
        };

        let user = provider.get_user_info(&tokens.access_token).await?;
        if let Some(claims) = &claims
            && claims.sub != user.id
        {
            return Err(AuthError::invalid_id_token(
                "user info subject does not match the ID token",
            ));
        }

        tracing::info!(
            provider = provider.name(),
            subject = %user.id,
            email_verified = user.email_verified,
            "federated login completed"
        );

        Ok(FederatedIdentity {
            user,
            claims,
            tokens,
        })
    }

    /// Revokes a provider token, logging instead of failing.
    pub async fn revoke(&self, name: &str, token: &str, token_type_hint: Option<&str>) {
        let result = match self.provider(name) {
            Ok(provider) => provider.revoke_token(token, token_type_hint).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(provider = name, error = %e, "token revocation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::provider::{ProviderEndpoints, ProviderOptions};
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &[u8] = b"idgate-signing-secret-for-tests-0001";
    const SECRET_B64: &str = "aWRnYXRlLXNpZ25pbmctc2VjcmV0LWZvci10ZXN0cy0wMDAx";

    fn google_config(server: &MockServer) -> ProviderConfig {
        let base = server.uri();
        let url = |p: &str| Some(Url::parse(&format!("{base}{p}")).unwrap());
        ProviderConfig::new("client-1", "secret-1", "https://app.example/auth/google/callback")
            .with_options(
                ProviderOptions::default()
                    .with_endpoints(ProviderEndpoints {
                        token: url("/token"),
                        userinfo: url("/userinfo"),
                        jwks: url("/certs"),
                        ..ProviderEndpoints::default()
                    })
                    .with_allow_insecure_http(true),
            )
    }

    fn service(server: &MockServer) -> FederationService {
        let registry = ProviderRegistry::with_builtin().unwrap();
        let mut configs = BTreeMap::new();
        configs.insert("google".to_string(), google_config(server));
        FederationService::from_config(&registry, &configs).unwrap()
    }

    fn id_token(sub: &str) -> String {
        let now = crate::federation::claims::now_unix();
        let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some("k1".to_string());
        jsonwebtoken::encode(
            &header,
            &json!({
                "iss": "https://accounts.google.com",
                "sub": sub,
                "aud": "client-1",
                "exp": now + 600,
                "iat": now,
                "email": "a@example.com",
                "email_verified": true
            }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    async fn mount(server: &MockServer, token_sub: &str, userinfo_sub: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.x",
                "token_type": "Bearer",
                "expires_in": 3599,
                "id_token": id_token(token_sub)
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": userinfo_sub,
                "email": "a@example.com",
                "email_verified": true
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "oct", "kid": "k1", "alg": "HS256", "k": SECRET_B64}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_unknown_provider() {
        let svc = FederationService::with_providers(Vec::new());
        assert!(matches!(
            svc.provider("google"),
            Err(AuthError::UnsupportedProvider { .. })
        ));
        assert!(svc.login_url("google", "s", &[]).is_err());
    }

    #[tokio::test]
    async fn test_complete_login() {
        let server = MockServer::start().await;
        mount(&server, "sub-1", "sub-1").await;

        let svc = service(&server);
        assert_eq!(svc.provider_names(), vec!["google"]);

        let identity = svc.complete_login("Google", "code").await.unwrap();
        assert_eq!(identity.user.id, "sub-1");
        assert_eq!(identity.user.provider, "google");
        assert!(identity.user.email_verified);
        assert_eq!(identity.claims.unwrap().sub, "sub-1");
    }

    #[tokio::test]
    async fn test_subject_mismatch_rejected() {
        let server = MockServer::start().await;
        mount(&server, "sub-1", "sub-2").await;

        let svc = service(&server);
        assert!(matches!(
            svc.complete_login("google", "code").await,
            Err(AuthError::InvalidIdToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_id_token_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "ya29.x"})),
            )
            .mount(&server)
            .await;

        let svc = service(&server);
        assert!(matches!(
            svc.complete_login("google", "code").await,
            Err(AuthError::InvalidIdToken { .. })
        ));
    }
}
