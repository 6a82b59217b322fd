use aws_smithy_types::DateTime;

pub mod credentials;
pub mod roles;
pub mod sts;

/// AWS temporary credentials, produced entirely by the STS exchange and
/// treated as opaque output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

pub use roles::RoleMapping;
