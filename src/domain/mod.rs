pub mod forecast;
pub mod output;
pub mod price;
pub mod snapshot;

pub use forecast::*;
pub use output::*;
pub use price::*;
pub use snapshot::*;
