//! Credential primitives: salted bcrypt hashing and unguessable random handles.

pub mod password;
pub mod random;

pub use password::{
    generate_salt, hash_password, prepare_dummy_hash, verify_dummy, verify_password,
};
pub use random::{random_hash, random_password, random_suffix, session_id};
