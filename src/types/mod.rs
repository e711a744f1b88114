//! Type definitions for hpitrack

mod error;
mod mode;
mod observation;
mod query;
mod series;
mod table;

pub use error::*;
pub use mode::*;
pub use observation::*;
pub use query::*;
pub use series::*;
pub use table::*;
