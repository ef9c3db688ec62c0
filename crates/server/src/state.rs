use std::sync::Arc;

use services::services::{
    auth::AuthService, crypto::CredentialCipher, invitations::InvitationService,
};
use sqlx::PgPool;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth: Arc<AuthService>,
    pub cipher: Arc<CredentialCipher>,
    pub invitations: Arc<InvitationService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        auth: AuthService,
        cipher: CredentialCipher,
        invitations: InvitationService,
        config: ServerConfig,
    ) -> Self {
        Self {
            pool,
            auth: Arc::new(auth),
            cipher: Arc::new(cipher),
            invitations: Arc::new(invitations),
            config: Arc::new(config),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
