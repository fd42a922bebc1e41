//! Data models for the circulation desk

pub mod book;
pub mod enums;
pub mod fine;
pub mod report;
pub mod scan;
pub mod shelf;
pub mod transaction;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookState, ShelfPlacement};
pub use enums::{PaymentMethod, ReturnCondition};
pub use fine::{Fine, FineStatus, FineStatusUpdate};
pub use scan::ScanEvent;
pub use shelf::Shelf;
pub use transaction::{Transaction, TransactionStatus};
pub use user::User;
