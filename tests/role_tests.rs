// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role hierarchy tests against a settled auth context.

use prep_portal::auth::AuthContext;
use prep_portal::models::Role;

mod common;
use common::{profile, settled, Harness};

async fn settled_with(role: Role) -> AuthContext {
    let h = Harness::signed_in("u1");
    h.profiles.insert(profile("u1", role));
    let ctx = h.mounted();
    settled(&ctx).await;
    ctx
}

#[tokio::test]
async fn test_has_role_is_hierarchical() {
    // (held, required, expected)
    let cases = [
        (Role::Admin, Role::Admin, true),
        (Role::Admin, Role::Teacher, true),
        (Role::Admin, Role::Student, true),
        (Role::Teacher, Role::Admin, false),
        (Role::Teacher, Role::Teacher, true),
        (Role::Teacher, Role::Student, true),
        (Role::Student, Role::Admin, false),
        (Role::Student, Role::Teacher, false),
        (Role::Student, Role::Student, true),
    ];

    for (held, required, expected) in cases {
        let ctx = settled_with(held).await;
        assert_eq!(
            ctx.has_role(required),
            expected,
            "{} checking {}",
            held,
            required
        );
        ctx.unmount();
    }
}

#[tokio::test]
async fn test_permissions_follow_role() {
    let ctx = settled_with(Role::Admin).await;
    let p = ctx.permissions();
    assert!(p.can_access_admin && p.can_access_teacher && p.can_access_student);
    assert!(p.is_admin);
    assert_eq!(p.role, Role::Admin);

    let ctx = settled_with(Role::Student).await;
    let p = ctx.permissions();
    assert!(!p.can_access_admin && !p.can_access_teacher && p.can_access_student);
    assert!(p.is_student);
}

#[test]
fn test_redirect_path_for_each_role() {
    assert_eq!(AuthContext::redirect_path_for(Role::Admin), "/admin");
    assert_eq!(AuthContext::redirect_path_for(Role::Teacher), "/teacher");
    assert_eq!(AuthContext::redirect_path_for(Role::Student), "/student");
}
