pub mod game_tester;
pub mod policy;
pub mod reports;
pub mod seeds;
pub mod storage;
pub mod tester;

pub use game_tester::GameTester;
pub use seeds::{SeedInfo, resolve_seed_inputs};
pub use tester::*;
