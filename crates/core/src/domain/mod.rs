pub mod activity;
pub mod booking;
pub mod intent;
