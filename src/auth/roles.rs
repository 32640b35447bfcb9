pub const ADMIN: &str = "ROLE_ADMIN";
pub const AGENT: &str = "ROLE_AGENT";
pub const NORMAL: &str = "ROLE_NORMAL";

/// Given to users created without any role.
pub const DEFAULT: &str = NORMAL;

pub const ADMIN_ONLY: &[&str] = &[ADMIN];
pub const STAFF: &[&str] = &[ADMIN, AGENT];

/// `agent` -> `ROLE_AGENT`
pub fn normalize(name: &str) -> String {
    let upper = name.trim().to_ascii_uppercase();
    if upper.starts_with("ROLE_") {
        upper
    } else {
        format!("ROLE_{}", upper)
    }
}
