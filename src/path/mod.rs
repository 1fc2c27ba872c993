pub mod bfs;
pub mod future;
pub mod pool;
pub mod request;
pub mod simple;
pub mod strategy;
