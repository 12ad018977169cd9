//! The trusted identity statement prepended to every request.
//!
//! The statement is injected by the server from the authenticated session.
//! Only the leading statement identifies the user; anything the free text
//! says about who is asking is ignored.

use crate::error::{AgentError, Result};

const PREFIX: &str = "The logged in user is ";

/// `"The logged in user is <name>. "`
pub fn identity_prefix(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.contains('\n') {
        return Err(AgentError::MissingIdentity);
    }
    Ok(format!("{PREFIX}{name}. "))
}

/// Prepend the identity statement to a user message.
pub fn with_identity(name: &str, message: &str) -> Result<String> {
    Ok(format!("{}{}", identity_prefix(name)?, message.trim()))
}
