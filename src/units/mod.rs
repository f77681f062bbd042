//! Store units: the reference table and the message matcher.

pub mod matcher;
pub mod record;
pub mod sheet;
pub mod store;


pub use matcher::{Matcher, Query};
pub use sheet::{read_xlsx, read_xlsx_file};
pub use store::TableStore;
