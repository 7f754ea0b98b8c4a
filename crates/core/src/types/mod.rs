//! Domain types for the storefront.
//!
//! Everything here is plain data plus validation. Wire field names follow
//! the API's camelCase convention.

pub mod cart;
pub mod filter;
pub mod id;
pub mod notification;
pub mod order;
pub mod price;
pub mod product;
pub mod status;
pub mod user;
pub mod validation;

pub use cart::{AddCartItem, Cart, CartItem, UpdateCartItem};
pub use filter::{DEFAULT_PAGE_SIZE, ProductFilter, SortKey};
pub use id::*;
pub use notification::{Notification, NotificationKind, NotificationPayload};
pub use order::{Address, CheckoutRequest, Order, OrderItem, Shipment};
pub use price::PriceTag;
pub use product::{
    Category, CategoryPath, ColorVariant, MainFlag, Product, ProductAttribute, ProductImage,
    ProductPage, RatingSummary, Review, SizeVariant, normalize_main_image,
};
pub use status::*;
pub use user::{ADMIN_ROLE, ProfileUpdate, StockSubscriptionKey, StockSubscriptionKeyError, User};
pub use validation::{
    ColorDraft, Email, EmailError, ImageUpload, LoginForm, ProductDraft, RegisterForm,
    ValidationErrors, check_password,
};
