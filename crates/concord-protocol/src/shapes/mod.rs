//! The six protocol shapes. Each is a [`Reduce`](crate::Reduce) node that also
//! resolves and reports whenever its children do.

pub mod ids;
pub mod keys;
pub mod leaf;
pub mod literal;
pub mod properties;
pub mod search;

pub use ids::{Ids, IdsAnswer};
pub use keys::{Keys, KeysAnswer};
pub use leaf::{Leaf, LeafAnswer};
pub use literal::Literal;
pub use properties::{Lens, Properties};
pub use search::{Search, SearchAnswer};
