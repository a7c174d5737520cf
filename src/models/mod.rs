mod cart;
mod order;

pub use cart::*;
pub use order::*;
