pub mod health;
pub mod restrictions;
