//! Builtin scenario catalogue for the session contract.
//!
//! One scenario per contract property. Scenarios assume the runner's
//! isolation ritual: mocks reset with healthy `/auth` and `/doAction` stubs
//! before the first step, a fresh token per scenario, and a cleanup LOGOUT
//! for anything that logged in.

use sessioncheck_core::SessionOp;

use crate::mock::{ACTION_PATH, AUTH_PATH, StubRule};
use crate::scenario::{Expect, KeySpec, Scenario, SendStep, TokenSpec};

// Malformed tokens.
const SHORT_TOKEN: &str = "SHORTTOKEN123";
const TOKEN_LEN_31: &str = "A12345678901234567890123456789Z";
const TOKEN_LEN_33: &str = "A1234567890123456789012345678901Z";
const OVERSIZED_TOKEN: &str = "A823456789012345678901234567890BEXTRA";
const SPECIAL_CHARS_TOKEN: &str = "INVALID!@#TOKEN12345678901234567";
const MALFORMED_TOKEN: &str = "INVALID!@#TOKEN123";

// Well-formed boundary tokens: length 32, `[A-Za-z0-9]` only.
const LETTER_BOUNDED_TOKEN: &str = "A123456789012345678901234567890Z";
const DIGIT_BOUNDED_TOKEN: &str = "11234567890123456789012345678901";
const ALTERNATING_TOKEN: &str = "A1B2C3D4E5F6G7H8I9J0K1L2M3N4O5P6";
const ALL_DIGITS_TOKEN: &str = "12345678901234567890123456789012";

fn login() -> SendStep {
    SendStep::op(SessionOp::Login)
}

fn action() -> SendStep {
    SendStep::op(SessionOp::Action)
}

fn logout() -> SendStep {
    SendStep::op(SessionOp::Logout)
}

/// The full contract suite.
#[must_use]
pub fn builtin_suite() -> Vec<Scenario> {
    let mut scenarios = vec![
        // ── LOGIN ──
        Scenario::new("login with well-formed token succeeds").send(login()),
        Scenario::new("repeated login conflicts without dropping the session")
            .send(login())
            .send(login())
            // 409 must leave the session intact: logout still works
            .send(logout()),
        Scenario::new("login after logout succeeds")
            .send(login())
            .send(logout())
            .send(login()),
        Scenario::new("login with wrong api key is rejected")
            .send(login().with_key(KeySpec::Wrong)),
        Scenario::new("login with empty api key is rejected")
            .send(login().with_key(KeySpec::Empty)),
        Scenario::new("login without api key header is rejected")
            .send(login().with_key(KeySpec::Absent)),
        Scenario::new("login with auth upstream down fails")
            .stub(StubRule::degraded(AUTH_PATH, 500))
            .send(login()),
    ];

    // Token format boundary, negative side.
    for (name, token) in [
        ("login with short token is rejected", SHORT_TOKEN),
        ("login with 31 character token is rejected", TOKEN_LEN_31),
        ("login with 33 character token is rejected", TOKEN_LEN_33),
        ("login with oversized token is rejected", OVERSIZED_TOKEN),
        (
            "login with special characters is rejected",
            SPECIAL_CHARS_TOKEN,
        ),
    ] {
        scenarios
            .push(Scenario::new(name).send(login().with_token(TokenSpec::Literal(token))));
    }

    // Token format boundary, positive side.
    for (name, token) in [
        ("login accepts letter-bounded token", LETTER_BOUNDED_TOKEN),
        ("login accepts digit-bounded token", DIGIT_BOUNDED_TOKEN),
        (
            "login accepts alternating letters and digits",
            ALTERNATING_TOKEN,
        ),
        ("login accepts an all-digit token", ALL_DIGITS_TOKEN),
    ] {
        scenarios
            .push(Scenario::new(name).send(login().with_token(TokenSpec::Literal(token))));
    }

    scenarios.extend([
        // ── ACTION ──
        Scenario::new("action after login succeeds")
            .send(login())
            .send(action()),
        Scenario::new("action without login is rejected").send(action()),
        Scenario::new("action after logout is rejected")
            .send(login())
            .send(logout())
            .send(action()),
        Scenario::new("action with malformed token is rejected")
            .send(action().with_token(TokenSpec::Literal(MALFORMED_TOKEN))),
        Scenario::new("repeated action succeeds")
            .send(login())
            .send(action())
            .send(action()),
        // Fresh token, never logged in: the SUT consults /auth before its
        // session store, so the upstream failure still propagates.
        Scenario::new("action with auth upstream down fails")
            .stub(StubRule::degraded(AUTH_PATH, 500))
            .send(action()),
        Scenario::new("action with action upstream down fails")
            .send(login())
            .stub(StubRule::degraded(ACTION_PATH, 500))
            .send(action()),
        // ── LOGOUT ──
        Scenario::new("logout after login succeeds")
            .send(login())
            .send(logout()),
        Scenario::new("logout without login is an idempotent success").send(logout()),
        Scenario::new("repeated logout returns an identical outcome")
            .send(login())
            .send(logout().labeled("first-logout"))
            .send(logout().with_expect(Expect::IdenticalTo("first-logout"))),
        Scenario::new("logout with auth upstream down fails")
            .stub(StubRule::degraded(AUTH_PATH, 500))
            .send(logout()),
        // ── request validation ──
        Scenario::new("request without token is rejected")
            .send(login().with_token(TokenSpec::Missing)),
        Scenario::new("request without action is rejected")
            .send(SendStep::missing_action(Expect::Status(vec![400]))),
        Scenario::new("credential gating precedes token validation").send(
            login()
                .with_token(TokenSpec::Literal(MALFORMED_TOKEN))
                .with_key(KeySpec::Wrong),
        ),
    ]);

    scenarios
}
