//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, MoneyError, Quantity, Slug, SlugError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub category: String,
    pub brand: String,
    pub description: String,
    pub images: Vec<String>,
    pub stock: Quantity,
    pub price: Money,
    pub rating: Decimal,
    pub num_reviews: u32,
    pub is_featured: bool,
    pub banner: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// Admin product form, used for both create and update.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: String,
    pub slug: String,
    #[validate(length(min = 3, message = "Category must be at least 3 characters"))]
    pub category: String,
    #[validate(length(min = 3, message = "Brand must be at least 3 characters"))]
    pub brand: String,
    #[validate(length(min = 3, message = "Description must be at least 3 characters"))]
    pub description: String,
    #[validate(length(min = 1, message = "Product must have at least one image"))]
    pub images: Vec<String>,
    pub price: Decimal,
    pub stock: u32,
    #[serde(default)]
    pub is_featured: bool,
    pub banner: Option<String>,
}

impl Product {
    pub fn create(form: NewProduct) -> Result<Self, ProductError> {
        let slug = Slug::new(form.slug)?;
        let price = Money::parse_price(form.price)?;
        let id = Uuid::new_v4();
        let mut product = Self {
            id, name: form.name, slug: slug.clone(), category: form.category, brand: form.brand,
            description: form.description, images: form.images, stock: Quantity::new(form.stock), price,
            rating: Decimal::ZERO, num_reviews: 0, is_featured: form.is_featured, banner: form.banner,
            created_at: Utc::now(), events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, slug }));
        Ok(product)
    }

    /// Applies an admin edit. Rating and review counts are left alone.
    pub fn update(&mut self, form: NewProduct) -> Result<(), ProductError> {
        self.slug = Slug::new(form.slug)?;
        self.price = Money::parse_price(form.price)?;
        self.name = form.name;
        self.category = form.category;
        self.brand = form.brand;
        self.description = form.description;
        self.images = form.images;
        self.stock = Quantity::new(form.stock);
        self.is_featured = form.is_featured;
        self.banner = form.banner;
        Ok(())
    }

    /// First image, used as the cart thumbnail.
    pub fn thumbnail(&self) -> &str { self.images.first().map_or("", String::as_str) }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("invalid slug: {0}")]
    InvalidSlug(#[from] SlugError),
    #[error("invalid price: {0}")]
    InvalidPrice(#[from] MoneyError),
}
