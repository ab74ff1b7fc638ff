pub mod check;
pub mod import;
pub mod item_ops;
pub mod merge;
pub mod search;
pub mod tree;
