/// The name written into `created_by` / `updated_by`.
pub const SYSTEM_AUDITOR: &str = "system";
const ANONYMOUS_PRINCIPAL: &str = "anonymousUser";

/// Whoever is behind the current request, as far as auditing cares.
pub trait Principal {
    fn name(&self) -> &str;

    fn is_authenticated(&self) -> bool {
        true
    }
}

impl Principal for str {
    fn name(&self) -> &str {
        self
    }
}

/// Resolved actor for a mutation. Passed explicitly into every
/// create/update/delete so the persistence layer never looks it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auditor(String);

impl Auditor {
    pub fn system() -> Self {
        Auditor(SYSTEM_AUDITOR.to_string())
    }

    pub fn resolve<P: Principal + ?Sized>(principal: Option<&P>) -> Self {
        match principal {
            Some(p)
                if p.is_authenticated()
                    && !p.name().trim().is_empty()
                    && p.name() != ANONYMOUS_PRINCIPAL =>
            {
                Auditor(p.name().to_string())
            }
            _ => Self::system(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
