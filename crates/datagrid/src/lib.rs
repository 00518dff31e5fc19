//! Datagrid
//!
//! Filter, sort and pagination layer for admin list views. Raw request
//! values are bound to filters, applied to a backend-agnostic proxy query
//! (SQL through sea-query, or a search engine's `_search` API) and paged.

pub mod backend;
pub mod config;
pub mod datagrid;
pub mod error;
pub mod facet;
pub mod field;
pub mod filter;
pub mod form;
pub mod pager;
pub mod proxy_query;
pub mod value;

pub use config::DatagridConfig;
pub use datagrid::{Datagrid, DatagridBuilder, DatagridFactory};
pub use error::{DatagridError, DatagridResult};
pub use field::{AssociationMapping, FieldDescription, FieldMapping};
pub use filter::{Filter, FilterCondition, FilterFactory};
pub use pager::Pager;
pub use proxy_query::{Engine, ProxyQuery, SortOrder};
pub use value::{FilterData, Options, Row, Values};
