//! Product listing queries: filter, sort and paginate.
//!
//! [`ProductQuery`] is parsed from raw request parameters once and then
//! interpreted either in memory ([`ProductQuery::apply`]) or as SQL by the
//! Postgres store. Both must agree, so the filter and sort rules live here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::aggregates::Product;

/// Default number of products per page.
pub const PAGE_SIZE: u32 = 12;
/// How many products the home page carousels show.
pub const LATEST_PRODUCTS_LIMIT: usize = 4;

/// Sentinel used by listing links to mean "no filter".
const ALL: &str = "all";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Lowest,
    Highest,
    Rating,
}

impl SortOrder {
    /// Unknown values fall back to newest first.
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "lowest" => Self::Lowest,
            "highest" => Self::Highest,
            "rating" => Self::Rating,
            _ => Self::Newest,
        }
    }

    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        match self {
            Self::Newest => b.created_at.cmp(&a.created_at),
            Self::Lowest => a.price.cmp(&b.price),
            Self::Highest => b.price.cmp(&a.price),
            Self::Rating => b.rating.cmp(&a.rating),
        }
    }
}

/// Inclusive price bounds, written as `min-max` in query strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceRange {
    pub fn contains(&self, price: Decimal) -> bool { price >= self.min && price <= self.max }
}

impl FromStr for PriceRange {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CatalogError::InvalidPriceRange(s.to_string());
        let (min, max) = s.split_once('-').ok_or_else(invalid)?;
        let min = Decimal::from_str(min.trim()).map_err(|_| invalid())?;
        let max = Decimal::from_str(max.trim()).map_err(|_| invalid())?;
        if min > max {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }
}

/// Raw listing parameters as they arrive on the query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListingParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProductQuery {
    pub text: Option<String>,
    pub category: Option<String>,
    pub price_range: Option<PriceRange>,
    pub min_rating: Option<Decimal>,
    pub sort: SortOrder,
    pub page: u32,
}

pub(crate) fn filter_value(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty() && v != ALL)
}

impl ProductQuery {
    pub fn parse(params: ListingParams) -> Result<Self, CatalogError> {
        let price_range = filter_value(params.price).map(|p| p.parse()).transpose()?;
        let min_rating = filter_value(params.rating)
            .map(|r| Decimal::from_str(&r).map_err(|_| CatalogError::InvalidRating(r)))
            .transpose()?;

        Ok(Self {
            text: filter_value(params.q),
            category: filter_value(params.category),
            price_range,
            min_rating,
            sort: params.sort.as_deref().map(SortOrder::parse_lenient).unwrap_or_default(),
            page: params.page.unwrap_or(1).max(1),
        })
    }

    pub fn matches(&self, product: &Product) -> bool {
        if let Some(text) = &self.text {
            if !product.name.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &product.category != category {
                return false;
            }
        }
        if let Some(range) = &self.price_range {
            if !range.contains(product.price.amount()) {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if product.rating < min {
                return false;
            }
        }
        true
    }

    /// Runs the query over an in-memory product list.
    pub fn apply(&self, products: impl IntoIterator<Item = Product>, page_size: u32) -> Page<Product> {
        let mut matching: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        matching.sort_by(|a, b| self.sort.compare(a, b));
        Page::slice(matching, self.page, page_size)
    }
}

/// One page of a listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Cuts page `page` (1-indexed) out of the full result set.
    pub fn slice(all: Vec<T>, page: u32, page_size: u32) -> Self {
        let total_pages = total_pages(all.len() as u64, page_size);
        let skip = offset(page, page_size) as usize;
        let data = all.into_iter().skip(skip).take(page_size as usize).collect();
        Self { data, total_pages }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { data: self.data.into_iter().map(f).collect(), total_pages: self.total_pages }
    }
}

pub fn total_pages(count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    u32::try_from(count.div_ceil(page_size)).unwrap_or(u32::MAX)
}

/// Rows to skip for a 1-indexed page.
pub fn offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(page_size)
}

/// Category name with the number of products in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("invalid price range: {0}")]
    InvalidPriceRange(String),
    #[error("invalid rating: {0}")]
    InvalidRating(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::form;
    use chrono::{Duration, Utc};

    fn product(name: &str, price_cents: i64, rating: i64, age_days: i64) -> Product {
        let slug = name.to_lowercase().replace(' ', "-");
        let mut p = Product::create(form(&slug, price_cents, 5)).unwrap();
        p.name = name.to_string();
        p.rating = Decimal::new(rating, 1);
        p.created_at = Utc::now() - Duration::days(age_days);
        p
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("Polo Shirt", 2999, 45, 3),
            product("Denim Jacket", 8999, 38, 1),
            product("Linen Shirt", 5000, 42, 2),
            product("Canvas Shoes", 12000, 49, 0),
        ]
    }

    fn names(page: &Page<Product>) -> Vec<&str> {
        page.data.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn parse_treats_all_as_no_filter() {
        let q = ProductQuery::parse(ListingParams {
            q: Some("all".into()),
            category: Some("".into()),
            price: Some("all".into()),
            rating: Some("all".into()),
            sort: Some("bogus".into()),
            page: Some(0),
        })
        .unwrap();
        assert_eq!(q, ProductQuery { page: 1, ..ProductQuery::default() });
    }

    #[test]
    fn price_range_parsing() {
        let r: PriceRange = "51-100".parse().unwrap();
        assert!(r.contains(Decimal::new(51, 0)));
        assert!(r.contains(Decimal::new(100, 0)));
        assert!(!r.contains(Decimal::new(10001, 2)));
        assert!("100".parse::<PriceRange>().is_err());
        assert!("9-1".parse::<PriceRange>().is_err());
        assert!("a-b".parse::<PriceRange>().is_err());
    }

    #[test]
    fn text_filter_is_case_insensitive() {
        let q = ProductQuery { text: Some("SHIRT".into()), page: 1, ..Default::default() };
        let page = q.apply(catalog(), 10);
        assert_eq!(names(&page), vec!["Linen Shirt", "Polo Shirt"]);
    }

    #[test]
    fn price_and_rating_filters() {
        let q = ProductQuery {
            price_range: Some("1-100".parse().unwrap()),
            min_rating: Some(Decimal::new(4, 0)),
            sort: SortOrder::Lowest,
            page: 1,
            ..Default::default()
        };
        assert_eq!(names(&q.apply(catalog(), 10)), vec!["Polo Shirt", "Linen Shirt"]);
    }

    #[test]
    fn sort_orders() {
        let mut q = ProductQuery { page: 1, ..Default::default() };
        assert_eq!(names(&q.apply(catalog(), 10))[0], "Canvas Shoes");
        q.sort = SortOrder::Highest;
        assert_eq!(names(&q.apply(catalog(), 10))[0], "Canvas Shoes");
        q.sort = SortOrder::Lowest;
        assert_eq!(names(&q.apply(catalog(), 10))[0], "Polo Shirt");
        q.sort = SortOrder::Rating;
        assert_eq!(names(&q.apply(catalog(), 10)), vec!["Canvas Shoes", "Polo Shirt", "Linen Shirt", "Denim Jacket"]);
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let first = ProductQuery { page: 1, ..Default::default() }.apply(catalog(), 3);
        let beyond = ProductQuery { page: 9, ..Default::default() }.apply(catalog(), 3);
        assert_eq!(first.data.len(), 3);
        assert_eq!(first.total_pages, 2);
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total_pages, first.total_pages);
    }

    #[test]
    fn pagination_math() {
        assert_eq!(total_pages(0, 12), 0);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
        assert_eq!(offset(1, 12), 0);
        assert_eq!(offset(3, 12), 24);
    }
}
