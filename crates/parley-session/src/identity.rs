//! Who the user claims to be.

use parley_protocol::{ValidationError, validate};

/// Credentials and the name shown to other users.
///
/// Every field is validated on construction, so an `Identity` can always
/// be put on the wire. The secret is opaque: it is forwarded to the server
/// and never interpreted.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    username: String,
    secret: String,
    display_name: String,
}

impl Identity {
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let (username, secret, display_name) =
            (username.into(), secret.into(), display_name.into());
        validate::username(&username)?;
        validate::secret(&secret)?;
        validate::display_name(&display_name)?;
        Ok(Self {
            username,
            secret,
            display_name,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Changes the display name. Purely local: the server learns the new
    /// name from the next message that carries it.
    pub fn rename(&mut self, display_name: impl Into<String>) -> Result<(), ValidationError> {
        let display_name = display_name.into();
        validate::display_name(&display_name)?;
        self.display_name = display_name;
        Ok(())
    }
}

// Keeps the secret out of logs.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}
