//! Scripted in-memory driver + operator used by the integration tests.
//!
//! `FakeDriver` models just enough of the platform surface to exercise the
//! orchestrator: a login form with optional second-factor challenge, profile
//! detail pages with configurable control layouts, and a paginated search
//! feed of candidate rows. Selector matching is by the distinctive fragment
//! of each strategy string, so the locator's real strategy chains run
//! against it unmodified.

use async_trait::async_trait;
use connect_pilot::driver::{DriverError, DriverPort, ElementHandle, Strategy};
use connect_pilot::operator::Operator;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Page models
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ProfileSim {
    pub name: Option<String>,
    /// Connect lives behind the overflow menu instead of the top bar.
    pub connect_in_overflow: bool,
    /// No connect control under any layout — the attempt must be skipped.
    pub missing_connect: bool,
    /// Only the generic CSS strategy resolves the connect control.
    pub connect_css_only: bool,
    /// The invite control never disappears — submits must read as failures.
    pub sticky_connect: bool,
    /// Direct pointer clicks are intercepted; forces the fallback chain.
    pub block_direct_click: bool,
    /// The "Add a note" control is absent from the modal.
    pub no_add_note: bool,
    /// No submit control at all.
    pub no_send_control: bool,

    connect_present: bool,
    menu_open: bool,
    modal_open: bool,
    note_open: bool,
}

impl ProfileSim {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            connect_in_overflow: false,
            missing_connect: false,
            connect_css_only: false,
            sticky_connect: false,
            block_direct_click: false,
            no_add_note: false,
            no_send_control: false,
            connect_present: true,
            menu_open: false,
            modal_open: false,
            note_open: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CandidateSim {
    pub href: String,
    pub name: String,
    /// Which identity-chain strategy (1-based) resolves this row.
    pub identity_method: u8,
    /// Name only available through the aria-label, not visible text.
    pub aria_only: bool,
    pub sent: bool,
}

impl CandidateSim {
    pub fn new(href: &str, name: &str, identity_method: u8) -> Self {
        Self {
            href: href.to_string(),
            name: name.to_string(),
            identity_method,
            aria_only: false,
            sent: false,
        }
    }
}

/// Location-refinement controls on the search surface.
#[derive(Default, Debug)]
pub struct GeoSim {
    /// Whether the geo filter button exists at all.
    pub enabled: bool,
    /// Suggestion texts offered after typing into the location input.
    pub suggestions: Vec<String>,
    /// Suggestion applied by the apply button, if any.
    pub applied: Option<String>,
    /// Last text typed into the location input.
    pub typed: Option<String>,
    open: bool,
    selected: Option<usize>,
}

#[derive(Default, Debug)]
pub struct LoginSim {
    pub valid_token: Option<String>,
    pub expected_email: Option<String>,
    pub expected_password: Option<String>,
    pub expected_pin: Option<String>,
    pub challenge: bool,
    pub issued_token: Option<String>,
    pub logged_in: bool,

    offered_token: Option<String>,
    challenge_pending: bool,
    typed_email: String,
    typed_password: String,
    typed_pin: String,
    jar: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Node {
    Landmark,
    RateBanner,
    Connect,
    More,
    MenuConnect,
    AddNote,
    NoteInput,
    Send { with_note: bool },
    Heading,
    NextPage,
    GeoFilter,
    GeoInput,
    GeoSuggestion { idx: usize },
    GeoApply,
    CandidateConnect { page: usize, idx: usize },
    Container { page: usize, idx: usize },
    Link { page: usize, idx: usize },
    LoginEmail,
    LoginPassword,
    LoginSubmit,
    PinInput,
    PinSubmit,
}

pub struct FakeState {
    pub current_url: String,
    pub profiles: HashMap<String, ProfileSim>,
    pub pages: Vec<Vec<CandidateSim>>,
    pub page_idx: usize,
    pub rate_limited: bool,
    /// Flip `rate_limited` once this many invitations have gone out.
    pub rate_limit_after_sends: Option<usize>,
    pub geo: GeoSim,
    pub login: LoginSim,

    /// Activation log: `"{channel}:{node:?}"`.
    pub clicks: Vec<String>,
    /// Notes typed into the message box.
    pub notes: Vec<String>,

    sends: usize,
    open_modal_for: Option<(usize, usize)>,
    next_id: u64,
    nodes: HashMap<u64, Node>,
}

pub struct FakeDriver {
    pub state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                current_url: "about:blank".to_string(),
                profiles: HashMap::new(),
                pages: Vec::new(),
                page_idx: 0,
                rate_limited: false,
                rate_limit_after_sends: None,
                geo: GeoSim::default(),
                login: LoginSim::default(),
                clicks: Vec::new(),
                notes: Vec::new(),
                sends: 0,
                open_modal_for: None,
                next_id: 0,
                nodes: HashMap::new(),
            }),
        }
    }

    /// A driver already past authentication.
    pub fn logged_in() -> Self {
        let driver = Self::new();
        driver.state.lock().unwrap().login.logged_in = true;
        driver
    }

    pub fn add_profile(&self, url: &str, sim: ProfileSim) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(url.to_string(), sim);
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn notes(&self) -> Vec<String> {
        self.state.lock().unwrap().notes.clone()
    }
}

impl FakeState {
    fn register(&mut self, node: Node) -> ElementHandle {
        self.next_id += 1;
        self.nodes.insert(self.next_id, node);
        ElementHandle(self.next_id)
    }

    fn on_login_page(&self) -> bool {
        self.current_url.contains("/login")
    }

    fn on_search_page(&self) -> bool {
        self.current_url.contains("/search/results/people")
    }

    fn current_profile(&self) -> Option<&ProfileSim> {
        self.profiles.get(&self.current_url)
    }

    fn current_profile_mut(&mut self) -> Option<&mut ProfileSim> {
        let url = self.current_url.clone();
        self.profiles.get_mut(&url)
    }

    /// Resolve a document-scoped selector against the current page model.
    fn match_document(&self, strategy: &Strategy) -> Option<Node> {
        let sel = strategy.as_str();
        let is_xpath = matches!(strategy, Strategy::XPath(_));

        if sel.contains("No free personalized invitations") {
            return self.rate_limited.then_some(Node::RateBanner);
        }

        if sel.contains("global-nav-typeahead") {
            return (self.login.logged_in && !self.on_login_page()).then_some(Node::Landmark);
        }

        if self.on_login_page() {
            if self.login.challenge_pending {
                if sel.contains("input__email_verification_pin") {
                    return Some(Node::PinInput);
                }
                if sel.contains("email-pin-submit-button") {
                    return Some(Node::PinSubmit);
                }
                return None;
            }
            if sel == "#username" {
                return Some(Node::LoginEmail);
            }
            if sel == "#password" {
                return Some(Node::LoginPassword);
            }
            if sel.contains("@type='submit'") {
                return Some(Node::LoginSubmit);
            }
            return None;
        }

        if self.on_search_page() {
            if sel.contains("aria-label='Next'") {
                return (self.page_idx + 1 < self.pages.len()).then_some(Node::NextPage);
            }
            if sel.contains("searchFilter_geoUrn") {
                return self.geo.enabled.then_some(Node::GeoFilter);
            }
            if sel.contains("Add a location") {
                return self.geo.open.then_some(Node::GeoInput);
            }
            if sel.contains("Apply current filter") {
                return self.geo.open.then_some(Node::GeoApply);
            }
            if sel.starts_with("//*[text()=") {
                if self.geo.open {
                    if let Some(idx) = self
                        .geo
                        .suggestions
                        .iter()
                        .position(|s| sel.contains(s.as_str()))
                    {
                        return Some(Node::GeoSuggestion { idx });
                    }
                }
                return None;
            }
            if self.open_modal_for.is_some() {
                if sel.contains("Add a note") {
                    return Some(Node::AddNote);
                }
                if sel.contains("Send without a note") || sel.contains("Send now") {
                    return Some(Node::Send { with_note: false });
                }
                if sel.contains("Send invitation") {
                    return Some(Node::Send { with_note: true });
                }
                if sel.contains("textarea") {
                    return Some(Node::NoteInput);
                }
            }
            return None;
        }

        if let Some(profile) = self.current_profile() {
            // Invite control under its several shapes.
            let connect_visible =
                profile.connect_present && !profile.connect_in_overflow && !profile.missing_connect;
            if sel.contains("text()='Connect'")
                && !sel.contains("@role='menu'")
                && !sel.ends_with("/..")
            {
                return (connect_visible && !profile.connect_css_only).then_some(Node::Connect);
            }
            if sel.contains("aria-label$='to connect'") && !is_xpath {
                return connect_visible.then_some(Node::Connect);
            }
            if sel.contains("'More'") || sel.contains("More actions") {
                return (profile.connect_in_overflow && profile.connect_present)
                    .then_some(Node::More);
            }
            if sel.contains("@role='menu'") && sel.contains("Connect") {
                return profile.menu_open.then_some(Node::MenuConnect);
            }
            if sel.contains("Add a note") {
                return (profile.modal_open && !profile.no_add_note).then_some(Node::AddNote);
            }
            if sel.contains("textarea") {
                return profile.note_open.then_some(Node::NoteInput);
            }
            if sel.contains("Send invitation") {
                return (profile.note_open && !profile.no_send_control)
                    .then_some(Node::Send { with_note: true });
            }
            if sel.contains("Send without a note") || sel.contains("Send now") {
                return (profile.modal_open && !profile.no_send_control)
                    .then_some(Node::Send { with_note: false });
            }
            if sel.contains("h1") {
                return profile.name.is_some().then_some(Node::Heading);
            }
        }

        None
    }

    fn candidate(&self, page: usize, idx: usize) -> Option<&CandidateSim> {
        self.pages.get(page).and_then(|p| p.get(idx))
    }

    fn node_attached(&self, node: Node) -> bool {
        match node {
            Node::CandidateConnect { page, idx } => {
                page == self.page_idx
                    && self.candidate(page, idx).map(|c| !c.sent).unwrap_or(false)
            }
            Node::Connect => self
                .current_profile()
                .map(|p| p.connect_present)
                .unwrap_or(false),
            _ => true,
        }
    }

    fn submit_invitation(&mut self) {
        self.sends += 1;
        if let Some(limit) = self.rate_limit_after_sends {
            if self.sends >= limit {
                self.rate_limited = true;
            }
        }
    }

    fn click_node(&mut self, node: Node, channel: &str) -> Result<(), DriverError> {
        // Direct-channel interception on configured profiles.
        if channel == "direct" {
            if let (Node::Connect, Some(profile)) = (node, self.current_profile()) {
                if profile.block_direct_click {
                    return Err(DriverError::NotInteractable(
                        "click point intercepted".into(),
                    ));
                }
            }
        }
        self.clicks.push(format!("{channel}:{node:?}"));

        match node {
            Node::Connect | Node::MenuConnect => {
                if let Some(p) = self.current_profile_mut() {
                    p.modal_open = true;
                }
            }
            Node::More => {
                if let Some(p) = self.current_profile_mut() {
                    p.menu_open = true;
                }
            }
            Node::AddNote => {
                if let Some(p) = self.current_profile_mut() {
                    p.note_open = true;
                }
            }
            Node::Send { .. } => {
                if self.on_search_page() {
                    if let Some((page, idx)) = self.open_modal_for.take() {
                        if let Some(c) = self
                            .pages
                            .get_mut(page)
                            .and_then(|p| p.get_mut(idx))
                        {
                            c.sent = true;
                        }
                        self.submit_invitation();
                    }
                } else {
                    let sticky = self
                        .current_profile()
                        .map(|p| p.sticky_connect)
                        .unwrap_or(false);
                    if let Some(p) = self.current_profile_mut() {
                        p.modal_open = false;
                        p.note_open = false;
                        if !sticky {
                            p.connect_present = false;
                        }
                    }
                    self.submit_invitation();
                }
            }
            Node::CandidateConnect { page, idx } => {
                if self.candidate(page, idx).map(|c| !c.sent).unwrap_or(false) {
                    self.open_modal_for = Some((page, idx));
                }
            }
            Node::NextPage => {
                self.page_idx += 1;
                self.nodes.clear();
            }
            Node::GeoFilter => {
                self.geo.open = true;
            }
            Node::GeoSuggestion { idx } => {
                self.geo.selected = Some(idx);
            }
            Node::GeoApply => {
                if let Some(idx) = self.geo.selected {
                    self.geo.applied = self.geo.suggestions.get(idx).cloned();
                }
                self.geo.open = false;
                // Applying the filter re-renders the feed.
                self.nodes.clear();
            }
            Node::LoginSubmit => {
                let ok = self.login.expected_email.as_deref() == Some(self.login.typed_email.as_str())
                    && self.login.expected_password.as_deref()
                        == Some(self.login.typed_password.as_str());
                if ok {
                    if self.login.challenge {
                        self.login.challenge_pending = true;
                    } else {
                        self.login.logged_in = true;
                        self.login.jar = self.login.issued_token.clone();
                        self.current_url = "https://www.linkedin.com/feed/".to_string();
                    }
                }
            }
            Node::PinSubmit => {
                if self.login.expected_pin.as_deref() == Some(self.login.typed_pin.as_str()) {
                    self.login.challenge_pending = false;
                    self.login.logged_in = true;
                    self.login.jar = self.login.issued_token.clone();
                    self.current_url = "https://www.linkedin.com/feed/".to_string();
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DriverPort impl
// ---------------------------------------------------------------------------

#[async_trait]
impl DriverPort for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.current_url = url.to_string();
        state.nodes.clear();
        state.open_modal_for = None;
        for profile in state.profiles.values_mut() {
            profile.menu_open = false;
            profile.modal_open = false;
            profile.note_open = false;
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.nodes.clear();
        if state.login.offered_token.is_some()
            && state.login.offered_token == state.login.valid_token
        {
            state.login.logged_in = true;
            state.login.jar = state.login.offered_token.clone();
        }
        Ok(())
    }

    async fn query(&self, strategy: &Strategy) -> Result<Option<ElementHandle>, DriverError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .match_document(strategy)
            .map(|node| state.register(node)))
    }

    async fn query_within(
        &self,
        scope: ElementHandle,
        strategy: &Strategy,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let mut state = self.state.lock().unwrap();
        let Some(&scope_node) = state.nodes.get(&scope.0) else {
            return Err(DriverError::Stale);
        };
        let sel = strategy.as_str().to_string();

        let resolved = match scope_node {
            Node::CandidateConnect { page, idx } => {
                let method = if sel.contains("entity-result')") {
                    1
                } else if sel.contains("ancestor::li") {
                    2
                } else {
                    3
                };
                state
                    .candidate(page, idx)
                    .filter(|c| c.identity_method == method)
                    .map(|_| Node::Container { page, idx })
            }
            Node::Container { page, idx } => {
                state.candidate(page, idx).map(|_| Node::Link { page, idx })
            }
            _ => None,
        };
        Ok(resolved.map(|node| state.register(node)))
    }

    async fn query_all(&self, strategy: &Strategy) -> Result<Vec<ElementHandle>, DriverError> {
        let mut state = self.state.lock().unwrap();
        if !state.on_search_page() || !strategy.as_str().ends_with("/..") {
            return Ok(state
                .match_document(strategy)
                .map(|node| vec![state.register(node)])
                .unwrap_or_default());
        }
        let page = state.page_idx;
        let count = state.pages.get(page).map(|p| p.len()).unwrap_or(0);
        let mut handles = Vec::new();
        for idx in 0..count {
            if state.candidate(page, idx).map(|c| !c.sent).unwrap_or(false) {
                handles.push(state.register(Node::CandidateConnect { page, idx }));
            }
        }
        Ok(handles)
    }

    async fn text(&self, el: ElementHandle) -> Result<Option<String>, DriverError> {
        let state = self.state.lock().unwrap();
        let Some(&node) = state.nodes.get(&el.0) else {
            return Err(DriverError::Stale);
        };
        Ok(match node {
            Node::Link { page, idx } => state
                .candidate(page, idx)
                .filter(|c| !c.aria_only)
                .map(|c| c.name.clone()),
            Node::Heading => state.current_profile().and_then(|p| p.name.clone()),
            _ => None,
        })
    }

    async fn attribute(
        &self,
        el: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let state = self.state.lock().unwrap();
        let Some(&node) = state.nodes.get(&el.0) else {
            return Err(DriverError::Stale);
        };
        Ok(match (node, name) {
            (Node::Link { page, idx }, "href") => {
                state.candidate(page, idx).map(|c| c.href.clone())
            }
            (Node::Link { page, idx }, "aria-label") => state
                .candidate(page, idx)
                .filter(|c| c.aria_only)
                .map(|c| c.name.clone()),
            _ => None,
        })
    }

    async fn is_attached(&self, el: ElementHandle) -> Result<bool, DriverError> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(&el.0) {
            Some(&node) => Ok(state.node_attached(node)),
            None => Ok(false),
        }
    }

    async fn click(&self, el: ElementHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        let Some(&node) = state.nodes.get(&el.0) else {
            return Err(DriverError::Stale);
        };
        state.click_node(node, "direct")
    }

    async fn click_forced(&self, el: ElementHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        let Some(&node) = state.nodes.get(&el.0) else {
            return Err(DriverError::Stale);
        };
        state.click_node(node, "forced")
    }

    async fn hover_click(
        &self,
        el: ElementHandle,
        _pause: Duration,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        let Some(&node) = state.nodes.get(&el.0) else {
            return Err(DriverError::Stale);
        };
        state.click_node(node, "hover")
    }

    async fn type_text(&self, el: ElementHandle, text: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        let Some(&node) = state.nodes.get(&el.0) else {
            return Err(DriverError::Stale);
        };
        match node {
            Node::LoginEmail => state.login.typed_email = text.to_string(),
            Node::LoginPassword => state.login.typed_password = text.to_string(),
            Node::PinInput => state.login.typed_pin = text.to_string(),
            Node::GeoInput => state.geo.typed = Some(text.to_string()),
            Node::NoteInput => state.notes.push(text.to_string()),
            _ => {}
        }
        Ok(())
    }

    async fn get_cookie(&self, name: &str) -> Result<Option<String>, DriverError> {
        let state = self.state.lock().unwrap();
        if name == "li_at" {
            Ok(state.login.jar.clone())
        } else {
            Ok(None)
        }
    }

    async fn set_cookie(
        &self,
        name: &str,
        value: &str,
        _domain: &str,
    ) -> Result<(), DriverError> {
        if name == "li_at" {
            self.state.lock().unwrap().login.offered_token = Some(value.to_string());
        }
        Ok(())
    }

    async fn scroll_into_view(&self, _el: ElementHandle) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scroll_by(&self, _x: i64, _y: i64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn page_contains(&self, needle: &str) -> Result<bool, DriverError> {
        let state = self.state.lock().unwrap();
        if needle == "Enter the code" {
            return Ok(state.login.challenge_pending);
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Operator double
// ---------------------------------------------------------------------------

pub struct FakeOperator {
    answers: Mutex<VecDeque<String>>,
}

impl FakeOperator {
    pub fn with_answers(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|s| s.to_string()).collect()),
        }
    }
}

impl Operator for FakeOperator {
    fn prompt(&self, _message: &str) -> std::io::Result<String> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| std::io::Error::other("operator out of scripted answers"))
    }
}

/// Short bounded waits so negative paths do not stall the test suite.
pub fn fast_waits() -> connect_pilot::WaitProfile {
    connect_pilot::WaitProfile {
        landmark: Duration::from_millis(400),
        control: Duration::from_millis(300),
        settle: Duration::from_millis(10),
    }
}
