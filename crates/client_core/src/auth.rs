use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::UserIdentity;
use storage::DocumentStore;
use tokio::sync::watch;
use tracing::info;

use crate::{
    error::{PlannerError, Result},
    ClientContext,
};

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Interactive sign-in; resolves once the provider hands back an identity.
    async fn sign_in_with_popup(&self) -> Result<UserIdentity>;
    /// Current identity, updated on every sign-in and sign-out.
    fn auth_state(&self) -> watch::Receiver<Option<UserIdentity>>;
    fn sign_out(&self);
}

/// Signs in a fixed identity without any external provider.
pub struct LocalAuthProvider {
    identity: UserIdentity,
    state: watch::Sender<Option<UserIdentity>>,
}

impl LocalAuthProvider {
    pub fn new(identity: UserIdentity) -> Self {
        let (state, _) = watch::channel(None);
        Self { identity, state }
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in_with_popup(&self) -> Result<UserIdentity> {
        info!(uid = %self.identity.uid, "signed in");
        self.state.send_replace(Some(self.identity.clone()));
        Ok(self.identity.clone())
    }

    fn auth_state(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.state.subscribe()
    }

    fn sign_out(&self) {
        info!(uid = %self.identity.uid, "signed out");
        self.state.send_replace(None);
    }
}

/// Top-level branch driven by the auth state stream.
pub enum AuthBranch {
    SignedOut,
    SignedIn(ClientContext),
}

/// Turns auth-state changes into fresh client contexts.
pub struct AuthGate {
    store: Arc<dyn DocumentStore>,
    state: watch::Receiver<Option<UserIdentity>>,
}

impl AuthGate {
    pub fn new(store: Arc<dyn DocumentStore>, auth: &dyn AuthProvider) -> Self {
        Self {
            store,
            state: auth.auth_state(),
        }
    }

    pub fn current(&self) -> AuthBranch {
        self.branch_for(self.state.borrow().clone())
    }

    /// Context of the signed-in user, for commands that need one.
    pub fn context(&self) -> Result<ClientContext> {
        match self.current() {
            AuthBranch::SignedIn(ctx) => Ok(ctx),
            AuthBranch::SignedOut => Err(PlannerError::SignedOut),
        }
    }

    /// Waits for the next sign-in or sign-out; `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<AuthBranch> {
        self.state.changed().await.ok()?;
        let identity = self.state.borrow_and_update().clone();
        Some(self.branch_for(identity))
    }

    fn branch_for(&self, identity: Option<UserIdentity>) -> AuthBranch {
        match identity {
            Some(user) => AuthBranch::SignedIn(ClientContext::new(Arc::clone(&self.store), user)),
            None => AuthBranch::SignedOut,
        }
    }
}
