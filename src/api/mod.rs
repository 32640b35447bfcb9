pub mod crud;
pub mod extract;
pub mod health;
pub mod response;
