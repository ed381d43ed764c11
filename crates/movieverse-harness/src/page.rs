//! Page handle: exclusive ownership of one browser session.
//!
//! Each running scenario owns exactly one `PageHandle`. The handle counts
//! navigations in an *epoch*; element references remember the epoch they
//! were resolved in and are stale once it moves on.

use crate::driver::BrowserDriver;
use crate::result::DriverResult;
use uuid::Uuid;

/// Owned browser session for one scenario
pub struct PageHandle {
    id: Uuid,
    driver: Box<dyn BrowserDriver>,
    epoch: u64,
    last_url: Option<String>,
    released: bool,
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .field("last_url", &self.last_url)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl PageHandle {
    /// Take ownership of a driver
    pub fn new(driver: impl BrowserDriver + 'static) -> Self {
        Self::from_boxed(Box::new(driver))
    }

    /// Take ownership of a boxed driver
    #[must_use]
    pub fn from_boxed(driver: Box<dyn BrowserDriver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver,
            epoch: 0,
            last_url: None,
            released: false,
        }
    }

    /// Unique id of this session, used in logs
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Navigation generation; bumps on every navigation
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// URL observed after the last navigation or interaction
    #[must_use]
    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    /// Whether the session was released
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Shared access to the driver
    #[must_use]
    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    /// Exclusive access to the driver
    pub fn driver_mut(&mut self) -> &mut dyn BrowserDriver {
        self.driver.as_mut()
    }

    /// Navigate and start a new epoch
    pub async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.driver.goto(url).await?;
        self.epoch += 1;
        self.last_url = Some(self.driver.current_url().await?);
        tracing::debug!(page = %self.id, epoch = self.epoch, url, "navigated");
        Ok(())
    }

    /// Record the URL after an interaction; a changed URL starts a new epoch.
    ///
    /// Returns whether the interaction navigated.
    pub async fn observe_navigation(&mut self) -> DriverResult<bool> {
        let url = self.driver.current_url().await?;
        if self.last_url.as_deref() == Some(url.as_str()) {
            return Ok(false);
        }
        self.epoch += 1;
        tracing::debug!(page = %self.id, epoch = self.epoch, url = %url, "interaction navigated");
        self.last_url = Some(url);
        Ok(true)
    }

    /// Close the underlying browser context. Idempotent.
    pub async fn release(&mut self) -> DriverResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.driver.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement, MockPage};
    use crate::network::UrlPattern;

    fn driver() -> MockDriver {
        MockDriver::new()
            .page(
                MockPage::new(UrlPattern::Exact("http://localhost:5173/".into())).element(
                    MockElement::new("a")
                        .text("Tendencias")
                        .navigates_to("http://localhost:5173/trending"),
                ),
            )
            .page(MockPage::new(UrlPattern::contains("/trending")))
    }

    #[tokio::test]
    async fn test_navigate_bumps_epoch() {
        let mut page = PageHandle::new(driver());
        assert_eq!(page.epoch(), 0);
        page.navigate("http://localhost:5173/").await.unwrap();
        assert_eq!(page.epoch(), 1);
        assert_eq!(page.last_url(), Some("http://localhost:5173/"));
    }

    #[tokio::test]
    async fn test_interaction_without_url_change_keeps_epoch() {
        let mut page = PageHandle::new(driver());
        page.navigate("http://localhost:5173/").await.unwrap();
        assert!(!page.observe_navigation().await.unwrap());
        assert_eq!(page.epoch(), 1);
    }

    #[tokio::test]
    async fn test_click_that_navigates_bumps_epoch() {
        let mut page = PageHandle::new(driver());
        page.navigate("http://localhost:5173/").await.unwrap();
        let link = page.driver().by_text("Tendencias").await.unwrap();
        page.driver_mut().click(&link[0]).await.unwrap();
        assert!(page.observe_navigation().await.unwrap());
        assert_eq!(page.epoch(), 2);
        assert_eq!(page.last_url(), Some("http://localhost:5173/trending"));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let mut page = PageHandle::new(driver());
        page.release().await.unwrap();
        page.release().await.unwrap();
        assert!(page.is_released());
    }
}
