//! Service layer modules.
//!
//! Local file storage for the upload endpoints and password hashing.

pub mod password;
pub mod storage;

pub use password::hash_password;
pub use storage::FileStorage;
