use meshlink_identity::{CertificateAuthority, IdentityResult};
use tokio::sync::RwLock;

pub struct AppState {
    pub ca: RwLock<CertificateAuthority>,
}

impl AppState {
    /// Generate a fresh root key; nothing is persisted across restarts.
    pub fn generate() -> IdentityResult<Self> {
        Ok(Self::with_authority(CertificateAuthority::generate()?))
    }

    pub fn with_authority(ca: CertificateAuthority) -> Self {
        Self {
            ca: RwLock::new(ca),
        }
    }
}
