//! Wire types shared between the server and its typed frontend clients.

pub mod pagination;

pub use pagination::{Paginated, PaginationParams, SortOrder};
