//! Authentication gate.
//!
//! Establishes an authenticated session before any target is processed.
//! Cookie path first: inject the cached session token, refresh, and verify
//! the post-login landmark within a bounded wait. A cookie failure is
//! recoverable — it falls back to credential login, with the second-factor
//! challenge routed through the operator port. Only exhausting both paths is
//! fatal to the run. A successful credential login persists the freshly
//! issued token back to the config store for future runs.

use crate::core::{ConfigStore, WaitProfile};
use crate::driver::{DriverError, DriverPort};
use crate::locate::{Locator, Role};
use crate::operator::Operator;
use thiserror::Error;
use tracing::{info, warn};

pub const BASE_URL: &str = "https://www.linkedin.com";
pub const LOGIN_URL: &str = "https://www.linkedin.com/login";

/// Session-token cookie name on the platform.
pub const SESSION_COOKIE: &str = "li_at";
const COOKIE_DOMAIN: &str = ".linkedin.com";

/// Text marker of the second-factor challenge page.
const CHALLENGE_MARKER: &str = "Enter the code";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credentials available for fallback login (configure email/password)")]
    MissingCredentials,

    #[error("credential login did not reach the authenticated surface: {0}")]
    LoginFailed(String),

    #[error("second-factor challenge failed: {0}")]
    ChallengeFailed(String),

    #[error("browser error during authentication: {0}")]
    Driver(#[from] DriverError),

    #[error("operator interaction failed: {0}")]
    Operator(#[from] std::io::Error),
}

/// Establish an authenticated session, trying the cached token first and
/// falling back to credential login. Fatal only when both paths fail.
pub async fn authenticate(
    driver: &dyn DriverPort,
    store: &mut ConfigStore,
    operator: &dyn Operator,
    cached_token: Option<&str>,
    wait: &WaitProfile,
) -> Result<(), AuthError> {
    if let Some(token) = cached_token {
        info!("attempting login with cached session token");
        match login_with_token(driver, token, wait).await {
            Ok(()) => {
                info!("logged in with cached token");
                return Ok(());
            }
            Err(e) => {
                warn!("token login failed ({e}); falling back to credentials");
            }
        }
    }

    login_with_credentials(driver, store, operator, wait).await
}

/// Cookie path: apply the token to a fresh session and verify the landmark.
async fn login_with_token(
    driver: &dyn DriverPort,
    token: &str,
    wait: &WaitProfile,
) -> Result<(), AuthError> {
    driver.navigate(BASE_URL).await?;
    driver.set_cookie(SESSION_COOKIE, token, COOKIE_DOMAIN).await?;
    driver.refresh().await?;

    let locator = Locator::new(driver);
    locator
        .wait_locate(&Role::NavLandmark, wait.landmark)
        .await
        .map_err(|_| AuthError::LoginFailed("landmark absent after cookie login".into()))?;
    Ok(())
}

/// Credential path: submit identifier/secret, handle the optional
/// second-factor challenge, verify the landmark, persist the fresh token.
async fn login_with_credentials(
    driver: &dyn DriverPort,
    store: &mut ConfigStore,
    operator: &dyn Operator,
    wait: &WaitProfile,
) -> Result<(), AuthError> {
    let email = store.email().ok_or(AuthError::MissingCredentials)?;
    let password = store.password().ok_or(AuthError::MissingCredentials)?;

    info!("logging in with credentials");
    driver.navigate(LOGIN_URL).await?;

    let locator = Locator::new(driver);
    let user_field = locator
        .wait_locate(&Role::LoginIdentifier, wait.landmark)
        .await
        .map_err(|e| AuthError::LoginFailed(format!("login form not reachable: {e}")))?;
    let pass_field = locator
        .locate(&Role::LoginSecret)
        .await
        .map_err(|e| AuthError::LoginFailed(format!("password field missing: {e}")))?;

    driver.type_text(user_field, &email).await?;
    driver.type_text(pass_field, &password).await?;

    let submit = locator
        .locate(&Role::LoginSubmit)
        .await
        .map_err(|e| AuthError::LoginFailed(format!("submit control missing: {e}")))?;
    driver.click_forced(submit).await?;

    // Wait for either the authenticated surface or the challenge page.
    let outcome = wait_landmark_or_challenge(driver, &locator, wait).await?;
    if outcome == PostLogin::Challenge {
        info!("second-factor challenge detected");
        solve_challenge(driver, &locator, operator, wait).await?;
        locator
            .wait_locate(&Role::NavLandmark, wait.landmark)
            .await
            .map_err(|_| {
                AuthError::ChallengeFailed("landmark absent after challenge".into())
            })?;
    }

    info!("logged in with credentials");

    // Persist the freshly issued token so the next run can take the cookie
    // path. A storage failure is logged, not fatal — the session is live.
    match driver.get_cookie(SESSION_COOKIE).await {
        Ok(Some(token)) => {
            store.set_session_token(token);
            if let Err(e) = store.persist() {
                warn!("could not persist refreshed session token: {e}");
            }
        }
        Ok(None) => warn!("no session cookie present after credential login"),
        Err(e) => warn!("could not read session cookie: {e}"),
    }

    Ok(())
}

#[derive(PartialEq, Eq)]
enum PostLogin {
    Landmark,
    Challenge,
}

async fn wait_landmark_or_challenge(
    driver: &dyn DriverPort,
    locator: &Locator<'_>,
    wait: &WaitProfile,
) -> Result<PostLogin, AuthError> {
    let start = tokio::time::Instant::now();
    loop {
        if locator.present(&Role::NavLandmark).await {
            return Ok(PostLogin::Landmark);
        }
        if locator.present(&Role::ChallengePinInput).await
            || driver.page_contains(CHALLENGE_MARKER).await.unwrap_or(false)
        {
            return Ok(PostLogin::Challenge);
        }
        if start.elapsed() >= wait.landmark {
            return Err(AuthError::LoginFailed(
                "neither landmark nor challenge appeared after submit".into(),
            ));
        }
        tokio::time::sleep(crate::driver::WAIT_POLL).await;
    }
}

async fn solve_challenge(
    driver: &dyn DriverPort,
    locator: &Locator<'_>,
    operator: &dyn Operator,
    wait: &WaitProfile,
) -> Result<(), AuthError> {
    let code = operator.prompt("Enter the verification code sent to your email:")?;

    let pin_field = locator
        .wait_locate(&Role::ChallengePinInput, wait.control)
        .await
        .map_err(|e| AuthError::ChallengeFailed(format!("pin input missing: {e}")))?;
    driver.type_text(pin_field, &code).await?;

    let submit = locator
        .locate(&Role::ChallengePinSubmit)
        .await
        .map_err(|e| AuthError::ChallengeFailed(format!("pin submit missing: {e}")))?;
    driver.click_forced(submit).await?;
    Ok(())
}
