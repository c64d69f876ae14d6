pub mod health;
pub mod visits;
pub mod whoami;
