use std::fmt;

/// Fatal for the whole run. Raised before any write is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required identifier is empty (e.g. `registry.contract_id`).
    MissingIdentifier(&'static str),
    /// Two items target the same slot.
    DuplicateItemId(String),
    /// Namespace ids must start with the master registry's prefix.
    NamespacePrefixMismatch {
        namespace_id: String,
        expected_prefix: String,
    },
    /// The namespace exists but was registered by another key; nothing in
    /// it can be written with the configured signer.
    NamespaceKeyMismatch {
        namespace_id: String,
        recorded: String,
        signer: String,
    },
    InvalidPolicy(String),
    /// `reconcile` on a reconciler built without a signing key.
    MissingSigner,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingIdentifier(what) => {
                write!(f, "missing required identifier: {what}")
            }
            ConfigurationError::DuplicateItemId(id) => write!(f, "duplicate item id: {id}"),
            ConfigurationError::NamespacePrefixMismatch {
                namespace_id,
                expected_prefix,
            } => write!(
                f,
                "namespace id {namespace_id} must start with the master registry prefix {expected_prefix}"
            ),
            ConfigurationError::NamespaceKeyMismatch {
                namespace_id,
                recorded,
                signer,
            } => write!(
                f,
                "namespace {namespace_id} is registered to {recorded}, configured key is {signer}"
            ),
            ConfigurationError::InvalidPolicy(m) => write!(f, "invalid run policy: {m}"),
            ConfigurationError::MissingSigner => {
                write!(f, "no signing key configured, cannot write to the ledger")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}
