/// Identity of the authenticated notebook user.
///
/// Authentication itself belongs to the notebook server fronting this proxy;
/// it forwards the resolved username with every request. The middleware
/// inserts this into request extensions so handlers never read it from the
/// client-supplied body.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub username: String,
}
