// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access guard tests: settle waiting, backstop, outcomes.

use prep_portal::auth::{Access, AccessGuard, AccessRequirement, RecoveryAction, LOGIN_PATH};
use prep_portal::error::AppError;
use prep_portal::models::Role;
use std::time::Duration;
use tokio::time::Instant;

mod common;
use common::{profile, settled, Harness, Reply};

#[tokio::test(start_paused = true)]
async fn test_backstop_turns_endless_loading_into_connection_issue() {
    let h = Harness::new();
    h.authority.script_session(Reply::Never);
    let ctx = h.mounted();

    let guard = AccessGuard::with_default_backstop(ctx.subscribe());
    let start = Instant::now();
    let access = guard.check(&AccessRequirement::Any).await;

    assert!(start.elapsed() >= Duration::from_secs(15));
    assert_eq!(
        access,
        Access::ConnectionIssue {
            actions: vec![RecoveryAction::Reload, RecoveryAction::Relogin],
        }
    );
    assert!(ctx.loading());
}

#[tokio::test(start_paused = true)]
async fn test_guard_waits_for_slow_settle() {
    let h = Harness::signed_in("u1");
    let (tx, reply) = Reply::later();
    h.profiles.script_fetch("u1", reply);
    let ctx = h.mounted();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = tx.send(Ok(profile("u1", Role::Teacher)));
    });

    let guard = AccessGuard::with_default_backstop(ctx.subscribe());
    let start = Instant::now();
    let access = guard.check(&AccessRequirement::AtLeast(Role::Teacher)).await;

    assert!(access.is_granted());
    assert!(start.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
async fn test_anonymous_is_sent_to_login() {
    let h = Harness::new();
    let ctx = h.mounted();

    let access = AccessGuard::with_default_backstop(ctx.subscribe())
        .check(&AccessRequirement::Any)
        .await;

    assert_eq!(
        access,
        Access::RedirectToLogin {
            login_path: LOGIN_PATH
        }
    );
}

#[tokio::test]
async fn test_insufficient_role_is_denied() {
    let h = Harness::signed_in("u1");
    h.profiles.insert(profile("u1", Role::Student));
    let ctx = h.mounted();

    let access = AccessGuard::with_default_backstop(ctx.subscribe())
        .check(&AccessRequirement::AtLeast(Role::Teacher))
        .await;

    assert_eq!(
        access,
        Access::Denied {
            required: "teacher".to_string(),
            current: Some(Role::Student),
        }
    );
}

#[tokio::test]
async fn test_fallback_student_passes_student_gates() {
    let h = Harness::signed_in("u1");
    h.profiles
        .script_create(Reply::Now(Err(AppError::ProfileCreateConflict("u1".to_string()))));
    let ctx = h.mounted();
    let guard = AccessGuard::with_default_backstop(ctx.subscribe());

    assert!(guard
        .check(&AccessRequirement::OneOf(vec![Role::Student]))
        .await
        .is_granted());
    assert!(guard
        .check(&AccessRequirement::AtLeast(Role::Student))
        .await
        .is_granted());
    assert!(!guard
        .check(&AccessRequirement::AtLeast(Role::Teacher))
        .await
        .is_granted());
}

#[tokio::test]
async fn test_unmounted_context_reports_connection_issue() {
    let h = Harness::signed_in("u1");
    h.profiles.insert(profile("u1", Role::Admin));
    let ctx = h.mounted();
    settled(&ctx).await;
    ctx.unmount();

    let access = AccessGuard::with_default_backstop(ctx.subscribe())
        .check(&AccessRequirement::Any)
        .await;

    assert!(matches!(access, Access::ConnectionIssue { .. }));
}
