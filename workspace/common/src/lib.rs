//! Pure helpers shared by the service and the entity layer.
//!
//! Nothing in here touches the database or the network.

mod pagination;
pub mod sheet;
pub mod template;

pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE, MAX_PAGE_SIZE, PageRequest, Pagination};
pub use sheet::{SheetRecord, normalize_header, rows_to_records};
pub use template::{extract_placeholders, render};
