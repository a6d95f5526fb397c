pub mod auth;
pub mod banners;
pub mod cart;
pub mod categories;
pub mod debts;
pub mod home;
pub mod operators;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod shipping;
pub mod stats;
