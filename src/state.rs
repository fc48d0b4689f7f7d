//! Application state shared across handlers and services.

use std::sync::Arc;

use crate::catalog::PAGE_SIZE;
use crate::events::EventPublisher;
use crate::payment::PaymentGateways;
use crate::store::Repositories;

/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    repos: Repositories,
    gateways: PaymentGateways,
    events: EventPublisher,
    page_size: u32,
    stripe_webhook_secret: Option<String>,
}

impl AppState {
    pub fn builder(repos: Repositories) -> AppStateBuilder {
        AppStateBuilder {
            repos,
            gateways: PaymentGateways::default(),
            events: EventPublisher::default(),
            page_size: PAGE_SIZE,
            stripe_webhook_secret: None,
        }
    }

    pub fn repos(&self) -> &Repositories { &self.inner.repos }
    pub fn gateways(&self) -> &PaymentGateways { &self.inner.gateways }
    pub fn events(&self) -> &EventPublisher { &self.inner.events }
    pub fn page_size(&self) -> u32 { self.inner.page_size }
    pub fn stripe_webhook_secret(&self) -> Option<&str> { self.inner.stripe_webhook_secret.as_deref() }
}

pub struct AppStateBuilder {
    repos: Repositories,
    gateways: PaymentGateways,
    events: EventPublisher,
    page_size: u32,
    stripe_webhook_secret: Option<String>,
}

impl AppStateBuilder {
    pub fn gateways(mut self, gateways: PaymentGateways) -> Self { self.gateways = gateways; self }
    pub fn events(mut self, events: EventPublisher) -> Self { self.events = events; self }
    pub fn page_size(mut self, page_size: u32) -> Self { self.page_size = page_size.max(1); self }
    pub fn stripe_webhook_secret(mut self, secret: Option<String>) -> Self { self.stripe_webhook_secret = secret; self }

    pub fn build(self) -> AppState {
        AppState {
            inner: Arc::new(AppStateInner {
                repos: self.repos,
                gateways: self.gateways,
                events: self.events,
                page_size: self.page_size,
                stripe_webhook_secret: self.stripe_webhook_secret,
            }),
        }
    }
}
