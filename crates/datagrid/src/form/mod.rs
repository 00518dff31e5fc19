//! Filter form: the widgets a datagrid's filters render with and the
//! binding of raw request values onto them.

mod binder;
mod types;

pub use binder::{FilterForm, FormBinder};
pub use types::{FormField, Widget};
