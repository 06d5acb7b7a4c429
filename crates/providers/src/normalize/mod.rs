//! Pure raw-response-to-`Work` mappers, one module per provider. No I/O;
//! each function takes an already-deserialized response body and returns
//! a [`crate::client::NormalizedResponse`].

pub mod google_books;
pub mod isbndb;
pub mod open_library;
