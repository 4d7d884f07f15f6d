pub mod order;
pub mod profiles;

pub use order::{Order, OrderEvents, OrderSpec, OrderState};
pub use profiles::{CustomerProfile, ProductProfile};
