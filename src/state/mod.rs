pub mod session;
pub mod wallet;
