pub mod ids;
pub mod identity;
pub mod product;
pub mod order;

pub use ids::*;
pub use identity::*;
pub use product::*;
pub use order::*;
