//! API response types, pagination and request validation

pub mod pagination;
pub mod response;
pub mod validation;

pub use pagination::{paginate, PageSource, Pagination};
pub use response::{ApiResponse, Created};
pub use validation::{ApiPath, ValidatedJson, ValidatedQuery};
