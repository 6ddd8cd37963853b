pub mod gateway;
pub mod indexing_queue;
pub mod listing_cache;
pub mod prefetch;
pub mod queue_worker;
pub mod session;
#[cfg(test)]
pub(crate) mod test_support;
pub mod tree_store;
