use crate::config::GoogleConfig;

/// Outcome of checking a provider profile against the login policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDecision {
    /// Email is allowed; `grant_admin` is set for addresses on the admin list.
    Allowed { grant_admin: bool },
    UnverifiedEmail,
    DomainNotAllowed,
}

#[derive(Debug, Clone)]
pub struct DomainPolicy {
    allowed_domain: String,
    admin_emails: Vec<String>,
}

impl DomainPolicy {
    pub fn new(allowed_domain: &str, admin_emails: &[String]) -> Self {
        Self {
            allowed_domain: allowed_domain.trim_start_matches('@').to_lowercase(),
            admin_emails: admin_emails.iter().map(|e| e.trim().to_lowercase()).collect(),
        }
    }

    pub fn from_config(cfg: &GoogleConfig) -> Self {
        Self::new(&cfg.allowed_domain, &cfg.admin_emails)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|a| *a == email)
    }

    pub fn check(&self, email: &str, email_verified: bool) -> LoginDecision {
        if !email_verified {
            return LoginDecision::UnverifiedEmail;
        }
        let email = email.trim().to_lowercase();
        if self.is_admin_email(&email) {
            return LoginDecision::Allowed { grant_admin: true };
        }
        match email.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && domain == self.allowed_domain => {
                LoginDecision::Allowed { grant_admin: false }
            }
            _ => LoginDecision::DomainNotAllowed,
        }
    }
}
