pub mod indexing;
pub mod knowledge_base;
pub mod resource;
pub mod tree;
