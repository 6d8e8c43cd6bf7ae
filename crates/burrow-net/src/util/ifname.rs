//! Interface name validation and index lookup.

use std::ffi::CString;

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Error type for interface name operations.
#[derive(Debug, thiserror::Error)]
pub enum IfError {
    #[error("interface not found: {0}")]
    NotFound(String),

    #[error("invalid interface name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IfError>;

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IfError::InvalidName("empty name".to_string()));
    }

    if name.len() >= IFNAMSIZ {
        return Err(IfError::InvalidName(format!(
            "name too long (max {} chars)",
            IFNAMSIZ - 1
        )));
    }

    if name.contains('/') || name.contains('\0') {
        return Err(IfError::InvalidName(
            "name contains invalid characters".to_string(),
        ));
    }

    if name.chars().any(|c| c.is_whitespace()) {
        return Err(IfError::InvalidName("name contains whitespace".to_string()));
    }

    Ok(())
}

/// Resolve an interface name to its index in the current namespace.
///
/// Uses if_nametoindex rather than /sys so the lookup is correct inside
/// namespaces where sysfs has not been remounted.
pub fn index(name: &str) -> Result<u32> {
    validate(name)?;
    let c_name =
        CString::new(name).map_err(|_| IfError::InvalidName("embedded null".to_string()))?;

    // SAFETY: c_name is a valid null-terminated string.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(IfError::NotFound(name.to_string()));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate("eth0").is_ok());
        assert!(validate("veth-a1").is_ok());
        assert!(validate("a23456789012345").is_ok()); // 15 chars
    }

    #[test]
    fn invalid_names() {
        assert!(validate("").is_err());
        assert!(validate("a234567890123456").is_err()); // 16 chars
        assert!(validate("has space").is_err());
        assert!(validate("has/slash").is_err());
    }

    #[test]
    fn loopback_resolves() {
        assert!(index("lo").unwrap() >= 1);
    }

    #[test]
    fn missing_interface_is_not_found() {
        assert!(matches!(
            index("bw-no-such-dev"),
            Err(IfError::NotFound(_))
        ));
    }
}
