//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;

pub use product::{NewProduct, Product, ProductError};
pub use order::{Order, OrderError, OrderItem, OrderRecord, PaymentMethod, PaymentResult, ShippingAddress};
pub use cart::{Cart, CartError, CartItem, OwnerKey};
pub use user::{Registration, Role, User, UserError, UserUpdate};
