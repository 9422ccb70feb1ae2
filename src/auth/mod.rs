//! Authentication: password hashing, bearer tokens, and the request extractor
//! that resolves a token back to a stored account.

pub mod extractor;
pub mod password;
pub mod token;

pub use extractor::CurrentUser;
