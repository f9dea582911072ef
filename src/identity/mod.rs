//! Central identity, session and authorization flow for clubgate.
//! Keep the public surface thin and split implementation across sub-modules.

mod flow;
mod principal;
mod provider;
mod session;

pub use flow::{AuthFlow, LoginRequest, LoginResponse};
pub use principal::{authorities_for, AuthSubject, Origin, Principal, Role, AUTHORITY_PREFIX};
pub use provider::{
    add_user, ensure_seed_accounts, Identity, IdentityProvider, InMemoryProvider,
    PersistedProvider, ResolveError,
};
pub use session::{Session, SessionManager, SessionToken};
