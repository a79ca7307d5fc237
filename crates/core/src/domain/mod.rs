pub mod intent;
pub mod session;
