pub mod archive;
pub mod audit;
pub mod changelog;
pub mod checkpoint;
pub mod config;
pub mod event;
pub mod lock;
pub mod paths;
pub mod pool;
pub mod reconcile;
pub mod retrieve;
pub mod run;
pub mod snapshot;
pub mod source;
pub mod util;
pub mod warn;
