pub mod book;
pub mod visit;

pub use book::Book;
pub use visit::Visit;
