//! Live search-feed supplier.
//!
//! Issues a faceted people search, optionally refines it by location through
//! the interactive geo filter, then yields candidates page-by-page straight
//! off the results surface. Each candidate keeps its live invite anchor so
//! the workflow can trigger the connect action in place. Advancing past a
//! page's visible candidates clicks "Next"; the stream terminates when no
//! next-page control exists or pages stop producing candidates. Infinite in
//! principle, bounded in practice by the limit consumed downstream.

use super::{SupplyError, TargetSupplier};
use crate::actions;
use crate::core::{Degree, SourceHint, TargetProfile, WaitProfile};
use crate::driver::DriverPort;
use crate::locate::{candidate_controls_strategy, Locator, Role};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Consecutive candidate-less pages tolerated before declaring the feed
/// exhausted; guards against a pagination loop that never yields work.
const MAX_EMPTY_PAGES: u32 = 3;

/// Faceted people-search URL for the given filters. The keyword is
/// lowercased (the platform ignores case but canonicalizes this way) and the
/// network facet is pre-encoded per [`Degree::network_code`].
pub fn search_url(degree: Degree, keyword: &str, location: Option<&str>) -> String {
    let kw = utf8_percent_encode(&keyword.to_lowercase(), NON_ALPHANUMERIC).to_string();
    let mut url = format!(
        "https://www.linkedin.com/search/results/people/?keywords={}&network={}&origin=FACETED_SEARCH",
        kw,
        degree.network_code()
    );
    if let Some(loc) = location.filter(|l| !l.trim().is_empty()) {
        let loc = utf8_percent_encode(loc, NON_ALPHANUMERIC).to_string();
        url.push_str(&format!("&locations={loc}"));
    }
    url
}

/// Title-case each whitespace-separated word (geo suggestions render this way).
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SearchResultSupplier<'a> {
    driver: &'a dyn DriverPort,
    degree: Degree,
    keyword: String,
    location: Option<String>,
    wait: WaitProfile,
    pending: VecDeque<TargetProfile>,
    primed: bool,
    exhausted: bool,
    empty_pages: u32,
}

impl<'a> SearchResultSupplier<'a> {
    pub fn new(
        driver: &'a dyn DriverPort,
        degree: Degree,
        keyword: impl Into<String>,
        location: Option<String>,
        wait: WaitProfile,
    ) -> Self {
        Self {
            driver,
            degree,
            keyword: keyword.into(),
            location,
            wait,
            pending: VecDeque::new(),
            primed: false,
            exhausted: false,
            empty_pages: 0,
        }
    }

    /// Issue the search and apply the optional location refinement. Called
    /// lazily on the first `next_target`; restarting the feed means
    /// re-issuing the search, not resuming mid-page.
    async fn prime(&mut self) -> Result<(), SupplyError> {
        let url = search_url(self.degree, &self.keyword, self.location.as_deref());
        info!("navigating to search feed: {url}");
        self.driver.navigate(&url).await?;

        let locator = Locator::new(self.driver);
        if locator
            .wait_locate(&Role::NavLandmark, self.wait.landmark)
            .await
            .is_err()
        {
            return Err(SupplyError::Source(
                "search surface did not load (landmark absent)".into(),
            ));
        }

        if let Some(location) = self.location.clone() {
            // Refinement failure is not fatal: the unrefined feed still works.
            if let Err(e) = self.refine_location(&location).await {
                warn!("location refinement failed ({e}); continuing unrefined");
            }
        }

        self.primed = true;
        Ok(())
    }

    /// Drive the interactive geo filter: open, type the location, pick the
    /// title-cased suggestion, apply.
    async fn refine_location(&self, location: &str) -> Result<(), SupplyError> {
        info!("refining search by location '{location}'");
        let locator = Locator::new(self.driver);

        let filter = locator
            .wait_locate(&Role::GeoFilterButton, self.wait.control)
            .await
            .map_err(|e| SupplyError::Source(e.to_string()))?;
        actions::activate(self.driver, filter)
            .await
            .map_err(|e| SupplyError::Source(e.to_string()))?;

        let input = locator
            .wait_locate(&Role::GeoLocationInput, self.wait.control)
            .await
            .map_err(|e| SupplyError::Source(e.to_string()))?;
        self.driver.type_text(input, location).await?;
        tokio::time::sleep(self.wait.settle).await;

        let option = locator
            .wait_locate(&Role::GeoOption(title_case(location)), self.wait.control)
            .await
            .map_err(|e| SupplyError::Source(e.to_string()))?;
        actions::activate(self.driver, option)
            .await
            .map_err(|e| SupplyError::Source(e.to_string()))?;

        let apply = locator
            .wait_locate(&Role::GeoApplyButton, self.wait.control)
            .await
            .map_err(|e| SupplyError::Source(e.to_string()))?;
        actions::activate(self.driver, apply)
            .await
            .map_err(|e| SupplyError::Source(e.to_string()))?;
        tokio::time::sleep(self.wait.settle).await;
        Ok(())
    }

    /// Read all candidate rows off the current page into `pending`. Rows
    /// whose identity cannot be resolved by any chain strategy are dropped.
    /// Returns how many candidates were harvested.
    async fn harvest_page(&mut self) -> Result<usize, SupplyError> {
        // Full-height scroll so lazily rendered rows are present.
        self.driver.scroll_to_bottom().await?;
        tokio::time::sleep(self.wait.settle).await;

        let locator = Locator::new(self.driver);
        let anchors = self.driver.query_all(&candidate_controls_strategy()).await?;
        debug!("search feed: {} candidate controls on page", anchors.len());

        let mut harvested = 0;
        for anchor in anchors {
            match locator.candidate_identity(anchor).await {
                Some((address, display_name)) => {
                    self.pending.push_back(TargetProfile {
                        address,
                        display_name,
                        source: SourceHint::SearchResult,
                        invite_anchor: Some(anchor),
                    });
                    harvested += 1;
                }
                None => {
                    debug!("search feed: dropping candidate with unresolvable identity");
                }
            }
        }
        Ok(harvested)
    }

    /// Click the next-page control. `false` when there is no next page.
    async fn advance_page(&mut self) -> Result<bool, SupplyError> {
        let locator = Locator::new(self.driver);
        let Ok(next) = locator.locate(&Role::NextPage).await else {
            return Ok(false);
        };
        if actions::activate(self.driver, next).await.is_err() {
            return Ok(false);
        }
        tokio::time::sleep(self.wait.settle).await;
        Ok(true)
    }
}

#[async_trait]
impl TargetSupplier for SearchResultSupplier<'_> {
    async fn next_target(&mut self) -> Result<Option<TargetProfile>, SupplyError> {
        if self.exhausted {
            return Ok(None);
        }
        if !self.primed {
            self.prime().await?;
            self.harvest_page().await?;
        }

        loop {
            if let Some(target) = self.pending.pop_front() {
                return Ok(Some(target));
            }

            if !self.advance_page().await? {
                info!("search feed exhausted: no next page");
                self.exhausted = true;
                return Ok(None);
            }

            let harvested = self.harvest_page().await?;
            if harvested == 0 {
                self.empty_pages += 1;
                if self.empty_pages >= MAX_EMPTY_PAGES {
                    info!("search feed exhausted: {MAX_EMPTY_PAGES} consecutive empty pages");
                    self.exhausted = true;
                    return Ok(None);
                }
            } else {
                self.empty_pages = 0;
            }
        }
    }
}
