//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod wishlist;
pub mod profile;

pub use product::{Product, ProductError, ProductSnapshot, Review, ReviewSummary, StarBucket};
pub use order::{Order, OrderError, OrderLine, OrderPricing, OrderStatus, PaymentRef, PendingPayment};
pub use cart::{Cart, CartError, CartItem};
pub use wishlist::{Wishlist, WishlistError, WishlistItem};
pub use profile::{ContactDetails, UserProfile};
