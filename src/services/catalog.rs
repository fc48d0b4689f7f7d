//! Public catalog reads.

use uuid::Uuid;

use crate::catalog::{CategoryCount, ListingParams, Page, ProductQuery, LATEST_PRODUCTS_LIMIT};
use crate::domain::aggregates::Product;
use crate::state::AppState;
use crate::{EcommerceError, Result};

pub async fn query_products(state: &AppState, params: ListingParams) -> Result<Page<Product>> {
    let query = ProductQuery::parse(params)?;
    Ok(state.repos().products.search_products(&query, state.page_size()).await?)
}

pub async fn product_by_slug(state: &AppState, slug: &str) -> Result<Product> {
    state.repos().products.product_by_slug(slug).await?.ok_or(EcommerceError::NotFound("Product"))
}

pub async fn product_by_id(state: &AppState, id: Uuid) -> Result<Product> {
    state.repos().products.product_by_id(id).await?.ok_or(EcommerceError::NotFound("Product"))
}

pub async fn latest_products(state: &AppState) -> Result<Vec<Product>> {
    Ok(state.repos().products.latest_products(LATEST_PRODUCTS_LIMIT).await?)
}

pub async fn featured_products(state: &AppState) -> Result<Vec<Product>> {
    Ok(state.repos().products.featured_products(LATEST_PRODUCTS_LIMIT).await?)
}

pub async fn categories(state: &AppState) -> Result<Vec<CategoryCount>> {
    Ok(state.repos().products.categories().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{harness, product_form, seed_product};

    #[tokio::test]
    async fn query_paginates_with_configured_page_size() {
        let h = harness();
        for (slug, cents) in [("red-shirt", 1500), ("blue-shirt", 2500), ("green-shirt", 3500)] {
            seed_product(&h.state, slug, cents, 5).await;
        }
        let params = |page| ListingParams { sort: Some("lowest".into()), page: Some(page), ..Default::default() };

        let first = query_products(&h.state, params(1)).await.unwrap();
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.data[0].slug.as_str(), "red-shirt");

        let beyond = query_products(&h.state, params(7)).await.unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total_pages, 2);
    }

    #[tokio::test]
    async fn malformed_price_filter_is_validation() {
        let h = harness();
        let params = ListingParams { price: Some("cheap".into()), ..Default::default() };
        assert!(matches!(query_products(&h.state, params).await, Err(EcommerceError::Validation(_))));
    }

    #[tokio::test]
    async fn lookups_and_categories() {
        let h = harness();
        let shirt = seed_product(&h.state, "red-shirt", 1500, 5).await;
        let mut form = product_form("canvas-shoes", 9000, 2);
        form.category = "Shoes".into();
        form.is_featured = true;
        let shoes = Product::create(form).unwrap();
        h.state.repos().products.insert_product(&shoes).await.unwrap();

        assert_eq!(product_by_slug(&h.state, "red-shirt").await.unwrap().id, shirt.id);
        assert_eq!(product_by_id(&h.state, shoes.id).await.unwrap().slug.as_str(), "canvas-shoes");
        assert!(matches!(product_by_slug(&h.state, "nope").await, Err(EcommerceError::NotFound("Product"))));

        let featured = featured_products(&h.state).await.unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(latest_products(&h.state).await.unwrap().len(), 2);

        let cats = categories(&h.state).await.unwrap();
        let names: Vec<_> = cats.iter().map(|c| (c.category.as_str(), c.count)).collect();
        assert_eq!(names, vec![("Shirts", 1), ("Shoes", 1)]);
    }
}
