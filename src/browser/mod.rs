// src/browser/mod.rs
pub mod page;
pub mod session;

use std::time::Duration;

use async_trait::async_trait;

use crate::utils::error::BrowserError;

pub use page::{MarkerSpec, RenderedPage};
pub use session::ChromeSession;

/// Settle delay after every navigation.
pub const PAGE_SETTLE: Duration = Duration::from_secs(3);
/// The listing page renders hundreds of entries and gets longer.
pub const LISTING_SETTLE: Duration = Duration::from_secs(8);

/// Source of fully rendered pages. Pages are fetched one at a time on the
/// caller's task, so the futures need not be `Send`.
#[async_trait(?Send)]
pub trait PageRenderer {
    /// Loads `url`, waits for readiness plus `settle`, and returns the DOM.
    async fn render(&self, url: &str, settle: Duration) -> Result<RenderedPage, BrowserError>;
}
