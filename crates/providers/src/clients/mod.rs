pub mod google_books;
pub mod isbndb;
pub mod open_library;

pub use google_books::GoogleBooksClient;
pub use isbndb::IsbndbClient;
pub use open_library::OpenLibraryClient;
