pub mod align;
pub mod bbox;
pub mod corpus;
pub mod normalize;
