//! Application services.
//!
//! Each service owns the orchestration for one area and talks to storage,
//! payments and messaging only through the traits it was built with.

mod cart;
mod catalog;
mod checkout;
mod profile;
mod wishlist;

pub use cart::{CartService, CartView};
pub use catalog::{CatalogService, NewProduct, ReviewsView};
pub use checkout::{CheckoutService, CheckoutSession, PaymentConfirmation};
pub use profile::{Activities, ProfileService};
pub use wishlist::{WishlistService, WishlistView};
