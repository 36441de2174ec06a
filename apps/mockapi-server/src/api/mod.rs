pub mod mock;
pub mod profiles;
