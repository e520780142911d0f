//! Cryptographic primitives: the master key, the encrypted container
//! codec, and password hashing.

mod container;
mod key;
mod password;

pub use container::{decrypt_stream, encrypt_stream, CodecError, BLOCK_SIZE, IV_SIZE};
pub use key::{VaultKey, KeyError, KEY_SIZE};
pub use password::{hash_password, verify_password, PasswordError};
